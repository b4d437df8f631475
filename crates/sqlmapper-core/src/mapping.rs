//! Mapped statement descriptors.
//!
//! A [`MappedStatement`] is the parsed form of one mapper statement: its
//! identity, where it was declared, how it executes, and a [`SqlSource`] that
//! turns a parameter object into [`BoundSql`] (final SQL text plus the ordered
//! parameter bindings). Parsing mapper files is out of scope here; callers
//! build statements directly or through their own loader.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::property::{PropertyTokenizer, namer};
use crate::reflection::MetaObject;
use crate::value::Value;

/// How a statement is sent to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatementType {
    /// Plain statement, SQL executed as-is
    Statement,
    /// Prepared statement with bound parameters
    #[default]
    Prepared,
    /// Stored procedure or function call with output parameters
    Callable,
}

/// What kind of SQL command the statement runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlCommandType {
    Select,
    Insert,
    Update,
    Delete,
    Flush,
}

/// Direction of a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterMode {
    #[default]
    In,
    Out,
    InOut,
}

/// One `?` placeholder binding, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterMapping {
    property: String,
    mode: ParameterMode,
}

impl ParameterMapping {
    /// An input binding for `property`.
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            mode: ParameterMode::In,
        }
    }

    /// A binding for the property an accessor method reads, e.g. `getUserId`.
    pub fn from_accessor(method: &str) -> Result<Self> {
        Ok(Self::new(namer::method_to_property(method)?))
    }

    /// Set the parameter direction.
    #[must_use]
    pub fn mode(mut self, mode: ParameterMode) -> Self {
        self.mode = mode;
        self
    }

    /// Property path the value is read from (and written back to for OUT modes).
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Parameter direction.
    pub fn parameter_mode(&self) -> ParameterMode {
        self.mode
    }

    /// Whether the database reads this parameter.
    pub fn is_input(&self) -> bool {
        self.mode != ParameterMode::Out
    }

    /// Whether the database writes this parameter.
    pub fn is_output(&self) -> bool {
        self.mode != ParameterMode::In
    }
}

/// SQL text bound for one parameter object.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundSql {
    sql: String,
    parameter_mappings: Vec<ParameterMapping>,
    additional_parameters: Value,
}

impl BoundSql {
    pub fn new(sql: impl Into<String>, parameter_mappings: Vec<ParameterMapping>) -> Self {
        Self {
            sql: sql.into(),
            parameter_mappings,
            additional_parameters: Value::object(std::iter::empty::<(String, Value)>()),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameter_mappings(&self) -> &[ParameterMapping] {
        &self.parameter_mappings
    }

    /// Whether a request-scoped value was supplied for the head segment of `path`.
    pub fn has_additional_parameter(&self, path: &str) -> bool {
        let head = PropertyTokenizer::new(path).name();
        self.additional_parameters
            .as_object()
            .is_some_and(|fields| fields.contains_key(head))
    }

    /// Read a request-scoped value by full path.
    pub fn additional_parameter(&self, path: &str) -> Result<Value> {
        self.additional_parameters.get_value(path)
    }

    /// Supply a request-scoped value (e.g. a loop variable of dynamic SQL).
    pub fn set_additional_parameter(&mut self, path: &str, value: Value) -> Result<()> {
        self.additional_parameters.set_value(path, value)
    }
}

/// Produces [`BoundSql`] for a parameter object.
pub trait SqlSource: fmt::Debug + Send + Sync {
    fn bound_sql(&self, parameter: &Value) -> BoundSql;
}

/// A SQL source whose text and bindings never depend on the parameter.
#[derive(Debug, Clone)]
pub struct StaticSqlSource {
    sql: String,
    parameter_mappings: Vec<ParameterMapping>,
}

impl StaticSqlSource {
    pub fn new(sql: impl Into<String>, parameter_mappings: Vec<ParameterMapping>) -> Self {
        Self {
            sql: sql.into(),
            parameter_mappings,
        }
    }
}

impl SqlSource for StaticSqlSource {
    fn bound_sql(&self, _parameter: &Value) -> BoundSql {
        BoundSql::new(self.sql.clone(), self.parameter_mappings.clone())
    }
}

/// Pagination window applied to a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBounds {
    pub offset: u32,
    pub limit: u32,
}

impl RowBounds {
    pub const NO_ROW_OFFSET: u32 = 0;
    pub const NO_ROW_LIMIT: u32 = 2_147_483_647;

    pub const fn new(offset: u32, limit: u32) -> Self {
        Self { offset, limit }
    }
}

impl Default for RowBounds {
    fn default() -> Self {
        Self::new(Self::NO_ROW_OFFSET, Self::NO_ROW_LIMIT)
    }
}

/// A parsed mapper statement.
#[derive(Debug, Clone)]
pub struct MappedStatement {
    id: String,
    resource: String,
    statement_type: StatementType,
    command_type: SqlCommandType,
    flush_cache_required: bool,
    timeout: Option<u32>,
    fetch_size: Option<u32>,
    sql_source: Arc<dyn SqlSource>,
}

impl MappedStatement {
    /// Create a statement. Selects default to keeping the local cache;
    /// every other command type defaults to flushing it.
    pub fn new(
        id: impl Into<String>,
        command_type: SqlCommandType,
        sql_source: impl SqlSource + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            resource: String::new(),
            statement_type: StatementType::default(),
            command_type,
            flush_cache_required: command_type != SqlCommandType::Select,
            timeout: None,
            fetch_size: None,
            sql_source: Arc::new(sql_source),
        }
    }

    /// Set the mapper resource this statement was declared in.
    #[must_use]
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    #[must_use]
    pub fn statement_type(mut self, statement_type: StatementType) -> Self {
        self.statement_type = statement_type;
        self
    }

    /// Force clearing the local cache before the statement runs.
    #[must_use]
    pub fn flush_cache(mut self, required: bool) -> Self {
        self.flush_cache_required = required;
        self
    }

    /// Statement timeout in seconds.
    #[must_use]
    pub fn timeout(mut self, seconds: u32) -> Self {
        self.timeout = Some(seconds);
        self
    }

    #[must_use]
    pub fn fetch_size(mut self, rows: u32) -> Self {
        self.fetch_size = Some(rows);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn resource_name(&self) -> &str {
        &self.resource
    }

    pub fn kind(&self) -> StatementType {
        self.statement_type
    }

    pub fn command_type(&self) -> SqlCommandType {
        self.command_type
    }

    pub fn is_callable(&self) -> bool {
        self.statement_type == StatementType::Callable
    }

    pub fn is_flush_cache_required(&self) -> bool {
        self.flush_cache_required
    }

    pub fn timeout_seconds(&self) -> Option<u32> {
        self.timeout
    }

    pub fn fetch_size_rows(&self) -> Option<u32> {
        self.fetch_size
    }

    /// Bind SQL for `parameter`.
    pub fn bound_sql(&self, parameter: &Value) -> BoundSql {
        self.sql_source.bound_sql(parameter)
    }
}
