//! Property path tokenizing and accessor-name translation.
//!
//! Paths look like `author.posts[0].title`: segments are separated by `.`,
//! and a segment may carry an index in brackets (`posts[0]`, `tags[name]`).

/// The head segment of a property path plus the unparsed remainder.
///
/// Iterating a tokenizer yields the tokenizer for each following segment:
/// `PropertyTokenizer::new("a.b[1].c")` has head `a` and iterates `b[1]`
/// then `c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyTokenizer<'a> {
    name: &'a str,
    indexed_name: &'a str,
    index: Option<&'a str>,
    children: Option<&'a str>,
}

impl<'a> PropertyTokenizer<'a> {
    /// Split `full_name` into its head segment and remainder.
    pub fn new(full_name: &'a str) -> Self {
        let (head, children) = match full_name.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (full_name, None),
        };
        let (name, index) = match head.find('[') {
            Some(open) => {
                let inner = &head[open + 1..];
                let inner = inner.strip_suffix(']').unwrap_or(inner);
                (&head[..open], Some(inner))
            }
            None => (head, None),
        };
        Self {
            name,
            indexed_name: head,
            index,
            children,
        }
    }

    /// Property name of the head segment, without any index.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Head segment including its index, e.g. `posts[0]`.
    pub fn indexed_name(&self) -> &'a str {
        self.indexed_name
    }

    /// The bracketed index of the head segment, if any.
    pub fn index(&self) -> Option<&'a str> {
        self.index
    }

    /// Everything after the first `.`, if anything.
    pub fn children(&self) -> Option<&'a str> {
        self.children
    }

    /// Whether the head segment is the final (leaf) segment.
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

impl<'a> Iterator for PropertyTokenizer<'a> {
    type Item = PropertyTokenizer<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = PropertyTokenizer::new(self.children?);
        *self = next.clone();
        Some(next)
    }
}

/// Translation between accessor method names and property names.
pub mod namer {
    use std::sync::OnceLock;

    use regex::Regex;

    use crate::error::{Error, PropertyError, Result};

    fn accessor_pattern() -> &'static Regex {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        PATTERN.get_or_init(|| {
            Regex::new(r"^(?:is|get|set)(\w+)$").unwrap_or_else(|e| unreachable!("{e}"))
        })
    }

    /// Turn an accessor name into the property it reads or writes.
    ///
    /// `getName` → `name`, `isActive` → `active`, `setX` → `x`. A name
    /// whose second letter is upper case keeps its first letter as-is
    /// (`getURL` → `URL`).
    pub fn method_to_property(name: &str) -> Result<String> {
        let captures = accessor_pattern().captures(name).ok_or_else(|| {
            Error::Property(PropertyError::malformed(
                name,
                "Error parsing property name. Didn't start with 'is', 'get' or 'set'",
            ))
        })?;
        let property = captures.get(1).map_or("", |m| m.as_str());

        let mut chars = property.chars();
        let Some(first) = chars.next() else {
            return Ok(String::new());
        };
        let second_upper = chars.next().is_some_and(char::is_uppercase);
        if second_upper {
            Ok(property.to_string())
        } else {
            let mut out = first.to_lowercase().collect::<String>();
            out.push_str(&property[first.len_utf8()..]);
            Ok(out)
        }
    }

    /// Whether `name` looks like a getter or a setter.
    pub fn is_property(name: &str) -> bool {
        is_getter(name) || is_setter(name)
    }

    /// Whether `name` looks like a getter (`getX` or `isX`).
    pub fn is_getter(name: &str) -> bool {
        (name.starts_with("get") && name.len() > 3) || (name.starts_with("is") && name.len() > 2)
    }

    /// Whether `name` looks like a setter (`setX`).
    pub fn is_setter(name: &str) -> bool {
        name.starts_with("set") && name.len() > 3
    }
}
