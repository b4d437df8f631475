//! Reading and writing nested properties of [`Value`] graphs.
//!
//! Parameter objects, output-parameter holders and mapped result objects are
//! all `Value`s. [`MetaObject`] navigates them with property paths understood
//! by [`PropertyTokenizer`](crate::property::PropertyTokenizer):
//!
//! - `name` reads a field of an `Object`,
//! - `items[2]` reads element 2 of the `Array` held in field `items`,
//! - `attrs[color]` reads key `color` of the `Object` held in field `attrs`,
//! - `[0]` indexes the value itself.
//!
//! Reading through a NULL intermediate yields NULL. Writing creates missing
//! intermediate objects.

use crate::error::{Error, PropertyError, Result};
use crate::property::PropertyTokenizer;
use crate::value::Value;

/// Property access by path.
pub trait MetaObject {
    /// Read the value at `path`.
    fn get_value(&self, path: &str) -> Result<Value>;

    /// Assign `value` at `path`.
    fn set_value(&mut self, path: &str, value: Value) -> Result<()>;

    /// Whether `path` can be read.
    fn has_property(&self, path: &str) -> bool {
        self.get_value(path).is_ok()
    }
}

impl MetaObject for Value {
    fn get_value(&self, path: &str) -> Result<Value> {
        let token = PropertyTokenizer::new(path);
        let head = read_segment(self, &token, path)?;
        match token.children() {
            None => Ok(head.clone()),
            Some(_) if head.is_null() => Ok(Value::Null),
            Some(rest) => head.get_value(rest),
        }
    }

    fn set_value(&mut self, path: &str, value: Value) -> Result<()> {
        let token = PropertyTokenizer::new(path);
        match token.children() {
            None => write_segment(self, &token, path, value),
            Some(rest) => {
                let child = child_for_write(self, &token, path)?;
                child.set_value(rest, value)
            }
        }
    }
}

fn no_property(path: &str, what: &str) -> Error {
    Error::Property(PropertyError::resolution(path, what))
}

fn read_named<'v>(target: &'v Value, name: &str, path: &str) -> Result<&'v Value> {
    if name.is_empty() {
        return Ok(target);
    }
    match target {
        Value::Object(fields) => fields.get(name).ok_or_else(|| {
            no_property(path, &format!("There is no getter for property named '{name}'"))
        }),
        other => Err(no_property(
            path,
            &format!("Cannot read property '{name}' of a {} value", other.type_name()),
        )),
    }
}

fn read_indexed<'v>(collection: &'v Value, index: &str, path: &str) -> Result<&'v Value> {
    static NULL: Value = Value::Null;
    match collection {
        Value::Array(items) => {
            let i: usize = index
                .parse()
                .map_err(|_| no_property(path, &format!("Invalid list index '{index}'")))?;
            items.get(i).ok_or_else(|| {
                no_property(
                    path,
                    &format!("Index {i} out of range for list of {}", items.len()),
                )
            })
        }
        Value::Object(fields) => Ok(fields.get(index).unwrap_or(&NULL)),
        other => Err(no_property(
            path,
            &format!("Cannot index into a {} value", other.type_name()),
        )),
    }
}

fn read_segment<'v>(
    target: &'v Value,
    token: &PropertyTokenizer<'_>,
    path: &str,
) -> Result<&'v Value> {
    let named = read_named(target, token.name(), path)?;
    match token.index() {
        Some(index) => read_indexed(named, index, path),
        None => Ok(named),
    }
}

fn named_for_write<'v>(target: &'v mut Value, name: &str, path: &str) -> Result<&'v mut Value> {
    if name.is_empty() {
        return Ok(target);
    }
    match target {
        Value::Object(fields) => Ok(fields.entry(name.to_string()).or_insert(Value::Null)),
        other => Err(no_property(
            path,
            &format!("Cannot set property '{name}' on a {} value", other.type_name()),
        )),
    }
}

fn indexed_for_write<'v>(
    collection: &'v mut Value,
    index: &str,
    path: &str,
) -> Result<&'v mut Value> {
    match collection {
        Value::Array(items) => {
            let len = items.len();
            let i: usize = index
                .parse()
                .map_err(|_| no_property(path, &format!("Invalid list index '{index}'")))?;
            items.get_mut(i).ok_or_else(|| {
                no_property(path, &format!("Index {i} out of range for list of {len}"))
            })
        }
        Value::Object(fields) => Ok(fields.entry(index.to_string()).or_insert(Value::Null)),
        other => Err(no_property(
            path,
            &format!("Cannot index into a {} value", other.type_name()),
        )),
    }
}

fn child_for_write<'v>(
    target: &'v mut Value,
    token: &PropertyTokenizer<'_>,
    path: &str,
) -> Result<&'v mut Value> {
    let named = named_for_write(target, token.name(), path)?;
    let child = match token.index() {
        Some(index) => indexed_for_write(named, index, path)?,
        None => named,
    };
    if child.is_null() {
        *child = Value::Object(std::collections::BTreeMap::new());
    }
    Ok(child)
}

fn write_segment(
    target: &mut Value,
    token: &PropertyTokenizer<'_>,
    path: &str,
    value: Value,
) -> Result<()> {
    let slot = match token.index() {
        Some(index) => {
            let named = named_for_write(target, token.name(), path)?;
            indexed_for_write(named, index, path)?
        }
        None if token.name().is_empty() => {
            return Err(no_property(path, "Empty property name"));
        }
        None => named_for_write(target, token.name(), path)?,
    };
    *slot = value;
    Ok(())
}
