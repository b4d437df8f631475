//! Mapped result objects and streaming result consumers.

use std::sync::{Arc, PoisonError, RwLock};

use crate::error::Result;
use crate::reflection::MetaObject;
use crate::value::Value;

/// A mapped result object with shared identity.
///
/// Cloning a `ResultObject` clones the handle, not the object: a list served
/// from the session cache holds the very objects the first execution
/// produced, and a property assigned later (by a deferred load) is visible
/// through every handle.
#[derive(Debug, Clone)]
pub struct ResultObject(Arc<RwLock<Value>>);

impl ResultObject {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(Arc::new(RwLock::new(value.into())))
    }

    /// A copy of the object's current state.
    pub fn snapshot(&self) -> Value {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Read the property at `path`.
    pub fn property(&self, path: &str) -> Result<Value> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get_value(path)
    }

    /// Assign the property at `path`.
    pub fn set_property(&self, path: &str, value: Value) -> Result<()> {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set_value(path, value)
    }

    /// Whether both handles point at the same object.
    pub fn ptr_eq(&self, other: &ResultObject) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for ResultObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.snapshot() == other.snapshot()
    }
}

impl From<Value> for ResultObject {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

/// A lazily-produced sequence of mapped result objects.
pub type Cursor<'a> = Box<dyn Iterator<Item = Result<ResultObject>> + 'a>;

/// Per-row state handed to a [`ResultHandler`].
#[derive(Debug)]
pub struct ResultContext<'a> {
    object: &'a ResultObject,
    count: usize,
    stopped: bool,
}

impl<'a> ResultContext<'a> {
    /// `count` is the 1-based position of `object` in the result set.
    pub fn new(object: &'a ResultObject, count: usize) -> Self {
        Self {
            object,
            count,
            stopped: false,
        }
    }

    pub fn result_object(&self) -> &'a ResultObject {
        self.object
    }

    pub fn result_count(&self) -> usize {
        self.count
    }

    /// Ask the producer to stop delivering rows.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

/// Receives mapped rows one at a time instead of a materialized list.
pub trait ResultHandler {
    fn handle_result(&mut self, context: &mut ResultContext<'_>);
}

impl<F> ResultHandler for F
where
    F: FnMut(&mut ResultContext<'_>),
{
    fn handle_result(&mut self, context: &mut ResultContext<'_>) {
        self(context);
    }
}
