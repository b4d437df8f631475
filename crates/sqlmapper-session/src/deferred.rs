//! Deferred population of object-graph properties.
//!
//! When mapping a row needs the result of a nested query whose key is still
//! in flight further up the call stack (a circular reference), the mapper
//! cannot wait for it. It records a [`DeferredLoad`] instead, and the session
//! resolves every recorded load once the outermost query completes and the
//! nested result is guaranteed to be in the cache.

use std::collections::VecDeque;

use sqlmapper_core::{Error, ExecutorError, ExecutorErrorKind, ResultObject, Result, Value};

use crate::cache_key::CacheKey;
use crate::local_cache::{LocalCache, Lookup};

/// The shape of the property a deferred load assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetShape {
    /// A single object; the cached list must hold exactly one row.
    Single,
    /// A collection; receives every cached row.
    Collection,
}

/// Turns a cached result list into the value a property expects.
#[derive(Debug, Clone, Copy)]
pub struct ResultExtractor;

impl ResultExtractor {
    pub fn extract(list: &[ResultObject], shape: TargetShape) -> Result<Value> {
        match shape {
            TargetShape::Collection => Ok(Value::Array(
                list.iter().map(ResultObject::snapshot).collect(),
            )),
            TargetShape::Single => match list {
                [only] => Ok(only.snapshot()),
                _ => Err(Error::Executor(ExecutorError {
                    kind: ExecutorErrorKind::TooManyResults,
                    message: format!("Expected one row but the cached result has {}", list.len()),
                })),
            },
        }
    }
}

/// One pending assignment of a cached result onto an object property.
#[derive(Debug, Clone)]
pub struct DeferredLoad {
    target: ResultObject,
    property: String,
    key: CacheKey,
    shape: TargetShape,
}

impl DeferredLoad {
    pub fn new(
        target: ResultObject,
        property: impl Into<String>,
        key: CacheKey,
        shape: TargetShape,
    ) -> Self {
        Self {
            target,
            property: property.into(),
            key,
            shape,
        }
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Whether `cache` holds a completed result for this load's key.
    pub fn can_load(&self, cache: &LocalCache<Vec<ResultObject>>) -> bool {
        matches!(cache.lookup(&self.key), Lookup::Value(_))
    }

    /// Assign the cached result to the target property.
    pub fn load(&self, cache: &LocalCache<Vec<ResultObject>>) -> Result<()> {
        let Lookup::Value(list) = cache.lookup(&self.key) else {
            return Err(Error::Executor(ExecutorError {
                kind: ExecutorErrorKind::Unresolved,
                message: format!(
                    "No cached result for deferred property '{}' (key {})",
                    self.property, self.key
                ),
            }));
        };
        let value = ResultExtractor::extract(list, self.shape)?;
        tracing::trace!(
            target: "sqlmapper::deferred",
            property = %self.property,
            "assigning deferred property"
        );
        self.target.set_property(&self.property, value)
    }
}

/// Pending loads in the order they were recorded.
#[derive(Debug, Default)]
pub struct DeferredLoadQueue {
    pending: VecDeque<DeferredLoad>,
}

impl DeferredLoadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, load: DeferredLoad) {
        self.pending.push_back(load);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove and return every pending load, oldest first.
    pub fn take_all(&mut self) -> VecDeque<DeferredLoad> {
        std::mem::take(&mut self.pending)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
