//! The per-session statement executor.
//!
//! An [`Executor`] sits between callers issuing mapped statements and a
//! [`Backend`] that actually talks to the data source. It owns:
//!
//! - the **local cache** of query results, keyed by [`CacheKey`], which also
//!   marks keys whose execution is in flight,
//! - the **output-parameter cache** for callable statements,
//! - the **deferred-load queue** for properties whose nested query is still
//!   in flight further up the call stack,
//! - the session's [`Transaction`] and its open/closed state.
//!
//! # Re-entrancy
//!
//! Result mapping runs inside [`Backend::query`] and may issue nested queries
//! through the same executor (a blog row loading its author, an author
//! loading their posts). Every operation therefore takes `&self`: state sits
//! behind `RefCell`/`Cell`, and no borrow is held across a backend call. A
//! nesting-depth counter identifies the outermost call, the only point where
//! deferred loads are drained and statement-scoped entries are discarded.
//!
//! An executor is meant for one call stack at a time and is neither `Send`
//! nor `Sync`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use sqlmapper_core::{
    BoundSql, Cursor, Error, ErrorContext, ExecutorError, Frame, MappedStatement, MetaObject,
    Result, ResultHandler, ResultObject, RowBounds, Transaction, TransactionError,
    TransactionErrorKind, Value, effective_timeout,
};

use crate::backend::{Backend, BackendFactory, BatchResult, ExecutorType};
use crate::cache_key::CacheKey;
use crate::config::{Configuration, LocalCacheScope};
use crate::deferred::{DeferredLoad, DeferredLoadQueue, TargetShape};
use crate::local_cache::{LocalCache, Lookup};

const EXECUTOR_CLOSED: &str = "Executor was closed.";

fn closed(message: &str) -> Error {
    Error::Executor(ExecutorError::closed(message))
}

/// Open a session whose backend is the configured default variant.
pub fn open_executor(
    config: Arc<Configuration>,
    transaction: Box<dyn Transaction>,
    factory: &dyn BackendFactory,
) -> Executor {
    let backend = factory.create(config.default_executor_type);
    Executor::new(config, transaction, backend)
}

/// Everything a session discards when it closes.
#[derive(Debug)]
struct SessionState {
    local_cache: LocalCache<Vec<ResultObject>>,
    output_parameter_cache: LocalCache<Value>,
    deferred_loads: DeferredLoadQueue,
}

impl SessionState {
    fn new() -> Self {
        Self {
            local_cache: LocalCache::new("LocalCache"),
            output_parameter_cache: LocalCache::new("LocalOutputParameterCache"),
            deferred_loads: DeferredLoadQueue::new(),
        }
    }
}

/// Increments the nesting depth for as long as it lives.
struct DepthGuard<'a> {
    depth: &'a Cell<usize>,
}

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self { depth }
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}

/// One session's query cache, deferred loads and transaction lifecycle.
pub struct Executor {
    config: Arc<Configuration>,
    backend: Box<dyn Backend>,
    transaction: RefCell<Option<Box<dyn Transaction>>>,
    state: RefCell<Option<SessionState>>,
    depth: Cell<usize>,
    closed: Cell<bool>,
    diagnostics: ErrorContext,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("kind", &self.backend.kind())
            .field("local_cache_scope", &self.config.local_cache_scope)
            .field("depth", &self.depth.get())
            .field("closed", &self.closed.get())
            .finish_non_exhaustive()
    }
}

impl Executor {
    pub fn new(
        config: Arc<Configuration>,
        transaction: Box<dyn Transaction>,
        backend: Box<dyn Backend>,
    ) -> Self {
        tracing::debug!(
            target: "sqlmapper::executor",
            kind = backend.kind().as_str(),
            "opening session"
        );
        Self {
            config,
            backend,
            transaction: RefCell::new(Some(transaction)),
            state: RefCell::new(Some(SessionState::new())),
            depth: Cell::new(0),
            closed: Cell::new(false),
            diagnostics: ErrorContext::new(),
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    pub fn backend_kind(&self) -> ExecutorType {
        self.backend.kind()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Number of queries currently on this session's call stack.
    pub fn nesting_depth(&self) -> usize {
        self.depth.get()
    }

    /// Diagnostic frames describing what the session is doing.
    pub fn diagnostics(&self) -> &ErrorContext {
        &self.diagnostics
    }

    fn ensure_open(&self, message: &str) -> Result<()> {
        if self.closed.get() {
            return Err(closed(message));
        }
        Ok(())
    }

    /// Run `f` on the open session state.
    fn with_state<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> Result<R> {
        let mut guard = self.state.borrow_mut();
        let state = guard.as_mut().ok_or_else(|| closed(EXECUTOR_CLOSED))?;
        Ok(f(state))
    }

    /// Run `f` against the transactional resource.
    ///
    /// The transaction is checked out for the duration of `f`. A nested
    /// call that needs it (`commit`, `rollback`, `statement_timeout` or
    /// `with_transaction` itself) fails with
    /// [`TransactionErrorKind::Unavailable`] instead of running.
    pub fn with_transaction<R>(&self, f: impl FnOnce(&mut dyn Transaction) -> R) -> Result<R> {
        self.ensure_open(EXECUTOR_CLOSED)?;
        let mut transaction = self.transaction.borrow_mut().take().ok_or_else(|| {
            Error::Transaction(TransactionError {
                kind: TransactionErrorKind::Unavailable,
                message: "Transaction is already in use".to_string(),
                source: None,
            })
        })?;
        let out = f(transaction.as_mut());
        if self.closed.get() {
            // `f` closed the session while the transaction was checked out.
            if let Err(e) = transaction.close() {
                tracing::warn!(
                    target: "sqlmapper::executor",
                    error = %e,
                    "Unexpected exception on closing transaction"
                );
            }
        } else {
            *self.transaction.borrow_mut() = Some(transaction);
        }
        Ok(out)
    }

    /// The timeout a backend should apply to `statement`.
    ///
    /// The statement's own timeout, or the configured default, lowered to
    /// the transaction's remaining time when that is shorter.
    pub fn statement_timeout(&self, statement: &MappedStatement) -> Result<Option<Duration>> {
        let declared = statement
            .timeout_seconds()
            .or(self.config.default_statement_timeout)
            .map(|secs| Duration::from_secs(u64::from(secs)));
        let remaining = self.with_transaction(|tx| tx.timeout())??;
        Ok(effective_timeout(declared, remaining))
    }

    /// Build the cache key for running `statement` with `parameter`.
    ///
    /// Components, in order: statement id, offset, limit, SQL text, the
    /// value of every non-OUT parameter mapping, and the environment id when
    /// one is configured.
    pub fn create_cache_key(
        &self,
        statement: &MappedStatement,
        parameter: &Value,
        bounds: RowBounds,
        bound_sql: &BoundSql,
    ) -> Result<CacheKey> {
        self.ensure_open(EXECUTOR_CLOSED)?;

        let mut values = Vec::with_capacity(bound_sql.parameter_mappings().len());
        for mapping in bound_sql.parameter_mappings() {
            if !mapping.is_input() {
                continue;
            }
            let property = mapping.property();
            let value = if bound_sql.has_additional_parameter(property) {
                bound_sql.additional_parameter(property)?
            } else if parameter.is_null() {
                Value::Null
            } else if parameter.is_scalar() {
                parameter.clone()
            } else {
                parameter.get_value(property)?
            };
            values.push(value);
        }

        Ok(CacheKey::for_statement(
            statement.id(),
            bounds,
            bound_sql.sql(),
            values,
            self.config.environment_id(),
        ))
    }

    /// Whether `key` holds a result or is being computed right now.
    ///
    /// Result mapping checks this before running a nested query: a key
    /// that is already in flight means a circular reference, and the
    /// property should go through [`Executor::defer_load`] instead.
    pub fn is_cached(&self, key: &CacheKey) -> bool {
        self.state
            .borrow()
            .as_ref()
            .is_some_and(|state| state.local_cache.contains(key))
    }

    /// Run a query, serving it from the local cache when possible.
    pub fn query(
        &self,
        statement: &MappedStatement,
        parameter: &mut Value,
        bounds: RowBounds,
        handler: Option<&mut dyn ResultHandler>,
    ) -> Result<Vec<ResultObject>> {
        let bound_sql = statement.bound_sql(parameter);
        let key = self.create_cache_key(statement, parameter, bounds, &bound_sql)?;
        self.query_with_key(statement, parameter, bounds, handler, &key, &bound_sql)
    }

    /// Run a query under a precomputed key and bound SQL.
    ///
    /// Without a `handler` a completed entry for `key` is returned as-is.
    /// Otherwise the key is marked in flight, the backend runs, and its
    /// result replaces the marker. When this is the outermost query,
    /// pending deferred loads are resolved afterwards and, under
    /// [`LocalCacheScope::Statement`], the caches are cleared.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(statement = statement.id(), depth = self.depth.get())
    )]
    pub fn query_with_key(
        &self,
        statement: &MappedStatement,
        parameter: &mut Value,
        bounds: RowBounds,
        handler: Option<&mut dyn ResultHandler>,
        key: &CacheKey,
        bound_sql: &BoundSql,
    ) -> Result<Vec<ResultObject>> {
        let _scope = self.diagnostics.enter(
            Frame::new()
                .resource(statement.resource_name())
                .activity("executing a query")
                .object(statement.id()),
        );
        self.ensure_open(EXECUTOR_CLOSED)?;

        if self.depth.get() == 0 && statement.is_flush_cache_required() {
            self.clear_local_cache();
        }

        let outcome = {
            let _depth = DepthGuard::enter(&self.depth);
            self.query_local_or_backend(statement, parameter, bounds, handler, key, bound_sql)
        };

        if self.depth.get() > 0 {
            return outcome;
        }

        let list = match outcome {
            Ok(list) => list,
            Err(e) => {
                self.discard_deferred_loads();
                return Err(e);
            }
        };

        let drained = self.drain_deferred_loads();
        if self.config.local_cache_scope == LocalCacheScope::Statement {
            self.clear_local_cache();
        }
        drained?;
        Ok(list)
    }

    fn query_local_or_backend(
        &self,
        statement: &MappedStatement,
        parameter: &mut Value,
        bounds: RowBounds,
        handler: Option<&mut dyn ResultHandler>,
        key: &CacheKey,
        bound_sql: &BoundSql,
    ) -> Result<Vec<ResultObject>> {
        if handler.is_none() {
            let cached = self.with_state(|state| match state.local_cache.lookup(key) {
                Lookup::Value(list) => Some(list.clone()),
                Lookup::InFlight => {
                    tracing::trace!(target: "sqlmapper::cache", %key, "key in flight");
                    None
                }
                Lookup::Absent => None,
            })?;
            if let Some(list) = cached {
                tracing::trace!(
                    target: "sqlmapper::cache",
                    %key,
                    rows = list.len(),
                    "local cache hit"
                );
                self.restore_output_parameters(statement, parameter, key, bound_sql)?;
                return Ok(list);
            }
        }
        self.query_from_backend(statement, parameter, bounds, handler, key, bound_sql)
    }

    /// Copy cached output parameters of a callable statement onto `parameter`.
    fn restore_output_parameters(
        &self,
        statement: &MappedStatement,
        parameter: &mut Value,
        key: &CacheKey,
        bound_sql: &BoundSql,
    ) -> Result<()> {
        if !statement.is_callable() || parameter.is_null() {
            return Ok(());
        }
        let cached = self.with_state(|state| state.output_parameter_cache.get(key).cloned())?;
        let Some(cached) = cached else {
            return Ok(());
        };
        for mapping in bound_sql.parameter_mappings() {
            if mapping.is_output() {
                let value = cached.get_value(mapping.property())?;
                parameter.set_value(mapping.property(), value)?;
            }
        }
        Ok(())
    }

    fn query_from_backend(
        &self,
        statement: &MappedStatement,
        parameter: &mut Value,
        bounds: RowBounds,
        handler: Option<&mut dyn ResultHandler>,
        key: &CacheKey,
        bound_sql: &BoundSql,
    ) -> Result<Vec<ResultObject>> {
        tracing::trace!(target: "sqlmapper::cache", %key, "local cache miss");
        self.with_state(|state| state.local_cache.put_in_flight(key.clone()))?;
        self.diagnostics.annotate_sql(bound_sql.sql());

        let result = self
            .backend
            .query(self, statement, parameter, bounds, handler, bound_sql);

        let mut guard = self.state.borrow_mut();
        if let Some(state) = guard.as_mut() {
            state.local_cache.remove(key);
        }
        let list = match result {
            Ok(list) => list,
            Err(e) => {
                tracing::debug!(
                    target: "sqlmapper::executor",
                    error = %e,
                    context = %self.diagnostics.describe(),
                    "query failed"
                );
                return Err(e);
            }
        };

        let state = guard.as_mut().ok_or_else(|| closed(EXECUTOR_CLOSED))?;
        state.local_cache.put(key.clone(), list.clone());
        if statement.is_callable() {
            state
                .output_parameter_cache
                .put(key.clone(), parameter.clone());
        }
        Ok(list)
    }

    fn drain_deferred_loads(&self) -> Result<()> {
        let pending = self.with_state(|state| state.deferred_loads.take_all())?;
        if pending.is_empty() {
            return Ok(());
        }
        tracing::trace!(
            target: "sqlmapper::deferred",
            count = pending.len(),
            "resolving deferred loads"
        );
        self.with_state(|state| {
            pending
                .iter()
                .try_for_each(|load| load.load(&state.local_cache))
        })?
    }

    fn discard_deferred_loads(&self) {
        if let Some(state) = self.state.borrow_mut().as_mut() {
            if !state.deferred_loads.is_empty() {
                tracing::debug!(
                    target: "sqlmapper::deferred",
                    count = state.deferred_loads.len(),
                    "discarding deferred loads after failed query"
                );
            }
            state.deferred_loads.clear();
        }
    }

    /// Assign the result cached under `key` to `property` of `target`.
    ///
    /// Happens immediately when the result is already cached; otherwise it
    /// is queued until the outermost query completes.
    pub fn defer_load(
        &self,
        target: &ResultObject,
        property: &str,
        key: CacheKey,
        shape: TargetShape,
    ) -> Result<()> {
        self.ensure_open(EXECUTOR_CLOSED)?;
        let load = DeferredLoad::new(target.clone(), property, key, shape);
        self.with_state(|state| {
            if load.can_load(&state.local_cache) {
                load.load(&state.local_cache)
            } else {
                tracing::trace!(
                    target: "sqlmapper::deferred",
                    property,
                    key = %load.key(),
                    "deferring load"
                );
                state.deferred_loads.push(load);
                Ok(())
            }
        })?
    }

    /// Run a query as a stream. The local cache is not consulted.
    #[tracing::instrument(level = "debug", skip_all, fields(statement = statement.id()))]
    pub fn query_cursor(
        &self,
        statement: &MappedStatement,
        parameter: &Value,
        bounds: RowBounds,
    ) -> Result<Cursor<'_>> {
        let _scope = self.diagnostics.enter(
            Frame::new()
                .resource(statement.resource_name())
                .activity("executing a cursor query")
                .object(statement.id()),
        );
        self.ensure_open(EXECUTOR_CLOSED)?;
        let bound_sql = statement.bound_sql(parameter);
        self.diagnostics.annotate_sql(bound_sql.sql());
        self.backend
            .query_cursor(self, statement, parameter, bounds, &bound_sql)
    }

    /// Run an insert, update or delete. Clears both local caches first.
    #[tracing::instrument(level = "debug", skip_all, fields(statement = statement.id()))]
    pub fn update(&self, statement: &MappedStatement, parameter: &mut Value) -> Result<u64> {
        let _scope = self.diagnostics.enter(
            Frame::new()
                .resource(statement.resource_name())
                .activity("executing an update")
                .object(statement.id()),
        );
        self.ensure_open(EXECUTOR_CLOSED)?;
        self.clear_local_cache();
        self.backend
            .update(self, statement, parameter)
            .inspect_err(|e| {
                tracing::debug!(
                    target: "sqlmapper::executor",
                    error = %e,
                    context = %self.diagnostics.describe(),
                    "update failed"
                );
            })
    }

    /// Send pending batched statements.
    pub fn flush_statements(&self) -> Result<Vec<BatchResult>> {
        self.flush_statements_with(false)
    }

    /// Send pending batched statements, or discard them with `rollback`.
    pub fn flush_statements_with(&self, rollback: bool) -> Result<Vec<BatchResult>> {
        self.ensure_open(EXECUTOR_CLOSED)?;
        self.backend.flush(rollback)
    }

    /// Empty both local caches. Does nothing once the session is closed.
    pub fn clear_local_cache(&self) {
        if self.closed.get() {
            return;
        }
        if let Some(state) = self.state.borrow_mut().as_mut() {
            tracing::debug!(
                target: "sqlmapper::cache",
                entries = state.local_cache.len(),
                "clearing local cache"
            );
            state.local_cache.clear();
            state.output_parameter_cache.clear();
        }
    }

    /// Clear the caches, flush pending statements and, when `required`,
    /// commit the transaction.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn commit(&self, required: bool) -> Result<()> {
        self.ensure_open("Cannot commit, transaction is already closed")?;
        self.clear_local_cache();
        self.flush_statements()?;
        if required {
            self.with_transaction(|tx| tx.commit())??;
        }
        Ok(())
    }

    /// Clear the caches, discard pending statements and, when `required`,
    /// roll the transaction back.
    ///
    /// The transaction is rolled back even when discarding fails; a
    /// rollback failure takes precedence over a discard failure.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn rollback(&self, required: bool) -> Result<()> {
        self.ensure_open("Cannot rollback, transaction is already closed")?;
        self.clear_local_cache();
        let discarded = self.flush_statements_with(true);
        if required {
            self.with_transaction(|tx| tx.rollback())??;
        }
        discarded.map(|_| ())
    }

    /// Close the session. Failures while rolling back or releasing the
    /// transaction are logged, not returned. Closing twice is a no-op.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn close(&self, force_rollback: bool) {
        if self.closed.get() {
            return;
        }
        if let Err(e) = self.rollback(force_rollback) {
            tracing::warn!(
                target: "sqlmapper::executor",
                error = %e,
                "Unexpected exception on closing transaction"
            );
        }
        if let Some(mut transaction) = self.transaction.borrow_mut().take() {
            if let Err(e) = transaction.close() {
                tracing::warn!(
                    target: "sqlmapper::executor",
                    error = %e,
                    "Unexpected exception on closing transaction"
                );
            }
        }
        self.state.borrow_mut().take();
        self.closed.set(true);
    }
}
