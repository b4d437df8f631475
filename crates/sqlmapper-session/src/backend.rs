//! The statement-execution capability a session delegates to.
//!
//! A [`Backend`] prepares statements, binds parameters, runs them against
//! the data source and maps rows to [`ResultObject`]s. The session only
//! decides *whether* to call it. Every call receives the owning
//! [`Executor`], so result mapping can run nested queries (and record
//! deferred loads) through the same session while the outer call is still
//! on the stack.

use serde::{Deserialize, Serialize};
use sqlmapper_core::{
    BoundSql, Cursor, MappedStatement, Result, ResultHandler, ResultObject, RowBounds, Value,
};

use crate::executor::Executor;

/// Which backend variant a session runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutorType {
    /// A fresh statement per execution
    #[default]
    Simple,
    /// Prepared statements reused by SQL text
    Reuse,
    /// Updates accumulated and sent on flush
    Batch,
}

impl ExecutorType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ExecutorType::Simple => "SIMPLE",
            ExecutorType::Reuse => "REUSE",
            ExecutorType::Batch => "BATCH",
        }
    }
}

/// Outcome of one batched statement, reported by [`Backend::flush`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub statement_id: String,
    pub sql: String,
    pub parameters: Vec<Value>,
    pub update_counts: Vec<u64>,
}

impl BatchResult {
    pub fn new(statement_id: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            statement_id: statement_id.into(),
            sql: sql.into(),
            parameters: Vec::new(),
            update_counts: Vec::new(),
        }
    }

    /// Record one parameter set and the row count it produced.
    pub fn add(&mut self, parameter: Value, update_count: u64) {
        self.parameters.push(parameter);
        self.update_counts.push(update_count);
    }
}

/// Statement execution against the data source.
///
/// Errors are returned as-is to the caller of the session operation that
/// triggered them.
pub trait Backend {
    fn kind(&self) -> ExecutorType;

    /// Run a query and map its rows.
    ///
    /// With a `handler`, rows are delivered to it one by one and the
    /// returned list may be empty. Callable statements write their output
    /// parameters into `parameter`.
    fn query(
        &self,
        session: &Executor,
        statement: &MappedStatement,
        parameter: &mut Value,
        bounds: RowBounds,
        handler: Option<&mut dyn ResultHandler>,
        bound_sql: &BoundSql,
    ) -> Result<Vec<ResultObject>>;

    /// Run a query and stream its rows.
    fn query_cursor<'a>(
        &'a self,
        session: &'a Executor,
        statement: &MappedStatement,
        parameter: &Value,
        bounds: RowBounds,
        bound_sql: &BoundSql,
    ) -> Result<Cursor<'a>>;

    /// Run an insert, update or delete and return the affected row count.
    fn update(
        &self,
        session: &Executor,
        statement: &MappedStatement,
        parameter: &mut Value,
    ) -> Result<u64>;

    /// Send pending batched work; with `rollback`, discard it instead.
    fn flush(&self, rollback: bool) -> Result<Vec<BatchResult>>;
}

/// Creates the backend for a new session.
pub trait BackendFactory {
    fn create(&self, kind: ExecutorType) -> Box<dyn Backend>;
}

impl<F> BackendFactory for F
where
    F: Fn(ExecutorType) -> Box<dyn Backend>,
{
    fn create(&self, kind: ExecutorType) -> Box<dyn Backend> {
        self(kind)
    }
}
