//! In-memory backend and transaction that record what the session asks of them.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use sqlmapper_core::{
    BackendError, BackendErrorKind, BoundSql, Cursor, Error, MappedStatement, ParameterMapping,
    Result, ResultContext, ResultHandler, ResultObject, RowBounds, SqlCommandType,
    StaticSqlSource, Transaction, TransactionError, TransactionErrorKind, Value,
};
use sqlmapper_session::{Backend, BatchResult, Configuration, Executor, ExecutorType};

type Route = Rc<dyn Fn(&Executor, &mut Value) -> Result<Vec<ResultObject>>>;

#[derive(Default)]
struct BackendLog {
    routes: RefCell<HashMap<String, Route>>,
    queries: RefCell<HashMap<String, usize>>,
    cursors: Cell<usize>,
    updates: Cell<usize>,
    flushes: RefCell<Vec<bool>>,
    fail_updates: Cell<bool>,
    fail_flushes: Cell<bool>,
}

/// A backend whose query results come from per-statement closures.
///
/// Clones share the same routes and counters, so a test keeps one handle
/// while the session owns another.
#[derive(Clone)]
pub struct ScriptedBackend {
    kind: ExecutorType,
    log: Rc<BackendLog>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::of_kind(ExecutorType::Simple)
    }

    pub fn of_kind(kind: ExecutorType) -> Self {
        Self {
            kind,
            log: Rc::new(BackendLog::default()),
        }
    }

    /// Answer queries of `statement_id` with `route`.
    pub fn route<F>(&self, statement_id: &str, route: F)
    where
        F: Fn(&Executor, &mut Value) -> Result<Vec<ResultObject>> + 'static,
    {
        self.log
            .routes
            .borrow_mut()
            .insert(statement_id.to_string(), Rc::new(route));
    }

    /// Number of times the backend executed `statement_id` as a query.
    pub fn query_count(&self, statement_id: &str) -> usize {
        self.log
            .queries
            .borrow()
            .get(statement_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn cursor_count(&self) -> usize {
        self.log.cursors.get()
    }

    pub fn update_count(&self) -> usize {
        self.log.updates.get()
    }

    /// The `rollback` flag of every flush, in order.
    pub fn flushes(&self) -> Vec<bool> {
        self.log.flushes.borrow().clone()
    }

    pub fn fail_updates(&self) {
        self.log.fail_updates.set(true);
    }

    pub fn fail_flushes(&self) {
        self.log.fail_flushes.set(true);
    }

    fn run(
        &self,
        session: &Executor,
        statement: &MappedStatement,
        parameter: &mut Value,
    ) -> Result<Vec<ResultObject>> {
        *self
            .log
            .queries
            .borrow_mut()
            .entry(statement.id().to_string())
            .or_insert(0) += 1;

        let route = self.log.routes.borrow().get(statement.id()).cloned();
        match route {
            Some(route) => route(session, parameter),
            None => Err(Error::Backend(BackendError::new(
                BackendErrorKind::Database,
                format!("no route for statement '{}'", statement.id()),
            ))),
        }
    }
}

impl Backend for ScriptedBackend {
    fn kind(&self) -> ExecutorType {
        self.kind
    }

    fn query(
        &self,
        session: &Executor,
        statement: &MappedStatement,
        parameter: &mut Value,
        _bounds: RowBounds,
        handler: Option<&mut dyn ResultHandler>,
        _bound_sql: &BoundSql,
    ) -> Result<Vec<ResultObject>> {
        let rows = self.run(session, statement, parameter)?;
        let Some(handler) = handler else {
            return Ok(rows);
        };
        for (i, row) in rows.iter().enumerate() {
            let mut context = ResultContext::new(row, i + 1);
            handler.handle_result(&mut context);
            if context.is_stopped() {
                break;
            }
        }
        Ok(Vec::new())
    }

    fn query_cursor<'a>(
        &'a self,
        session: &'a Executor,
        statement: &MappedStatement,
        parameter: &Value,
        _bounds: RowBounds,
        _bound_sql: &BoundSql,
    ) -> Result<Cursor<'a>> {
        self.log.cursors.set(self.log.cursors.get() + 1);
        let mut parameter = parameter.clone();
        let rows = self.run(session, statement, &mut parameter)?;
        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    fn update(
        &self,
        _session: &Executor,
        statement: &MappedStatement,
        _parameter: &mut Value,
    ) -> Result<u64> {
        self.log.updates.set(self.log.updates.get() + 1);
        if self.log.fail_updates.get() {
            return Err(Error::Backend(
                BackendError::new(BackendErrorKind::Database, "deadlock detected")
                    .with_sqlstate("40P01")
                    .with_sql(format!("-- {}", statement.id())),
            ));
        }
        Ok(1)
    }

    fn flush(&self, rollback: bool) -> Result<Vec<BatchResult>> {
        self.log.flushes.borrow_mut().push(rollback);
        if self.log.fail_flushes.get() {
            return Err(Error::Backend(BackendError::new(
                BackendErrorKind::Batch,
                "batch flush failed",
            )));
        }
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct TransactionLog {
    events: RefCell<Vec<&'static str>>,
    fail_commit: Cell<bool>,
    fail_rollback: Cell<bool>,
    fail_close: Cell<bool>,
    timeout: Cell<Option<Duration>>,
}

/// A transaction that records lifecycle calls.
#[derive(Clone, Default)]
pub struct RecordingTransaction {
    log: Rc<TransactionLog>,
}

impl RecordingTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.log.events.borrow().clone()
    }

    pub fn fail_commit(&self) {
        self.log.fail_commit.set(true);
    }

    pub fn fail_rollback(&self) {
        self.log.fail_rollback.set(true);
    }

    pub fn fail_close(&self) {
        self.log.fail_close.set(true);
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.log.timeout.set(Some(timeout));
    }

    fn record(&self, event: &'static str, fail: bool, kind: TransactionErrorKind) -> Result<()> {
        self.log.events.borrow_mut().push(event);
        if fail {
            return Err(Error::Transaction(TransactionError {
                kind,
                message: format!("{event} failed"),
                source: None,
            }));
        }
        Ok(())
    }
}

impl Transaction for RecordingTransaction {
    fn commit(&mut self) -> Result<()> {
        self.record("commit", self.log.fail_commit.get(), TransactionErrorKind::Commit)
    }

    fn rollback(&mut self) -> Result<()> {
        self.record(
            "rollback",
            self.log.fail_rollback.get(),
            TransactionErrorKind::Rollback,
        )
    }

    fn close(&mut self) -> Result<()> {
        self.record("close", self.log.fail_close.get(), TransactionErrorKind::Close)
    }

    fn timeout(&self) -> Result<Option<Duration>> {
        Ok(self.log.timeout.get())
    }
}

/// A select whose SQL binds the given properties in order.
pub fn select(id: &str, sql: &str, properties: &[&str]) -> MappedStatement {
    statement(id, SqlCommandType::Select, sql, properties)
}

pub fn statement(
    id: &str,
    command_type: SqlCommandType,
    sql: &str,
    properties: &[&str],
) -> MappedStatement {
    let mappings = properties.iter().map(|p| ParameterMapping::new(*p)).collect();
    MappedStatement::new(id, command_type, StaticSqlSource::new(sql, mappings))
        .resource("mappers/test.xml")
}

/// A session over `backend` and `transaction`.
pub fn open(
    config: Configuration,
    backend: &ScriptedBackend,
    transaction: &RecordingTransaction,
) -> Executor {
    Executor::new(
        Arc::new(config),
        Box::new(transaction.clone()),
        Box::new(backend.clone()),
    )
}

pub fn row<const N: usize>(fields: [(&str, Value); N]) -> ResultObject {
    ResultObject::new(Value::object(fields))
}

pub fn snapshots(rows: &[ResultObject]) -> Vec<Value> {
    rows.iter().map(ResultObject::snapshot).collect()
}
