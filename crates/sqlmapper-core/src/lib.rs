//! Core types and collaborator contracts for SQLMapper Rust.
//!
//! This crate holds everything a session executor consumes but does not own:
//!
//! - `Value` for parameters, result rows and the object graphs they form
//! - `MetaObject` for reading and writing properties by path
//! - `MappedStatement` / `BoundSql` statement descriptors
//! - `Transaction` for the transactional resource
//! - `ErrorContext` for operator-facing failure annotations
//! - `Error` / `Result` shared by every SQLMapper crate

pub mod database_id;
pub mod error;
pub mod error_context;
pub mod mapping;
pub mod property;
pub mod reflection;
pub mod result;
pub mod transaction;
pub mod value;

pub use database_id::{DataSource, DatabaseIdProvider, VendorDatabaseIdProvider};
pub use error::{
    BackendError, BackendErrorKind, ConfigError, Error, ExecutorError, ExecutorErrorKind,
    PropertyError, PropertyErrorKind, Result, TransactionError, TransactionErrorKind,
};
pub use error_context::{ErrorContext, ErrorScope, Frame};
pub use mapping::{
    BoundSql, MappedStatement, ParameterMapping, ParameterMode, RowBounds, SqlCommandType,
    SqlSource, StatementType, StaticSqlSource,
};
pub use property::PropertyTokenizer;
pub use reflection::MetaObject;
pub use result::{Cursor, ResultContext, ResultHandler, ResultObject};
pub use transaction::{Transaction, effective_timeout};
pub use value::Value;
