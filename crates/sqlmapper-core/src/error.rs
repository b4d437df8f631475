//! Error types for SQLMapper operations.

use std::fmt;

/// The primary error type for all SQLMapper operations.
#[derive(Debug)]
pub enum Error {
    /// Executor state errors (closed session, unresolved deferred loads)
    Executor(ExecutorError),
    /// Failures raised by a query/update backend, passed through unchanged
    Backend(BackendError),
    /// Property navigation and accessor-name errors
    Property(PropertyError),
    /// Transactional resource errors
    Transaction(TransactionError),
    /// Configuration errors
    Config(ConfigError),
}

#[derive(Debug)]
pub struct ExecutorError {
    pub kind: ExecutorErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorErrorKind {
    /// Operation invoked on a closed session
    Closed,
    /// A single value was expected but the cached list held more (or fewer) rows
    TooManyResults,
    /// A deferred load was drained while its key held no value
    Unresolved,
}

#[derive(Debug)]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
    pub sql: Option<String>,
    pub sqlstate: Option<String>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Could not obtain or use the underlying connection
    Connection,
    /// Statement execution failed in the database
    Database,
    /// Statement exceeded its timeout
    Timeout,
    /// Pending batch statements could not be flushed
    Batch,
    /// Result rows could not be mapped
    Mapping,
}

#[derive(Debug)]
pub struct PropertyError {
    pub kind: PropertyErrorKind,
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyErrorKind {
    /// The property does not exist or cannot be read/written on the object
    Resolution,
    /// The accessor or property name has an unrecognized shape
    MalformedPath,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// Commit failed
    Commit,
    /// Rollback failed
    Rollback,
    /// Releasing the resource failed
    Close,
    /// The resource is checked out by an operation already in progress
    Unavailable,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ExecutorError {
    /// A "session closed" error carrying the given message.
    pub fn closed(message: impl Into<String>) -> Self {
        Self {
            kind: ExecutorErrorKind::Closed,
            message: message.into(),
        }
    }
}

impl BackendError {
    /// Create a backend error of the given kind.
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            sql: None,
            sqlstate: None,
            source: None,
        }
    }

    /// Attach the SQL text that was being executed.
    #[must_use]
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Attach a SQLSTATE code.
    #[must_use]
    pub fn with_sqlstate(mut self, sqlstate: impl Into<String>) -> Self {
        self.sqlstate = Some(sqlstate.into());
        self
    }
}

impl PropertyError {
    /// The property at `path` could not be resolved.
    pub fn resolution(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: PropertyErrorKind::Resolution,
            path: path.into(),
            message: message.into(),
        }
    }

    /// The name at `path` is not a recognizable accessor or property.
    pub fn malformed(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: PropertyErrorKind::MalformedPath,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl Error {
    /// Was this raised because the session had already been closed?
    pub fn is_session_closed(&self) -> bool {
        matches!(
            self,
            Error::Executor(ExecutorError {
                kind: ExecutorErrorKind::Closed,
                ..
            })
        )
    }

    /// Did this originate in the query/update backend?
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Error::Backend(_))
    }

    /// Is this a property resolution or accessor-name failure?
    pub fn is_property_error(&self) -> bool {
        matches!(self, Error::Property(_))
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Backend(b) => b.sql.as_deref(),
            _ => None,
        }
    }

    /// Get SQLSTATE if available
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Backend(b) => b.sqlstate.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Executor(e) => write!(f, "Executor error: {}", e.message),
            Error::Backend(e) => {
                if let Some(sqlstate) = &e.sqlstate {
                    write!(f, "Backend error (SQLSTATE {}): {}", sqlstate, e.message)
                } else {
                    write!(f, "Backend error: {}", e.message)
                }
            }
            Error::Property(e) => write!(f, "Property error on '{}': {}", e.path, e.message),
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Backend(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Transaction(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sqlstate) = &self.sqlstate {
            write!(f, "{} (SQLSTATE {})", self.message, sqlstate)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl fmt::Display for PropertyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.path)
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<ExecutorError> for Error {
    fn from(err: ExecutorError) -> Self {
        Error::Executor(err)
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        Error::Backend(err)
    }
}

impl From<PropertyError> for Error {
    fn from(err: PropertyError) -> Self {
        Error::Property(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(ConfigError {
            message: format!("invalid configuration: {err}"),
            source: Some(Box::new(err)),
        })
    }
}

/// Result type alias for SQLMapper operations.
pub type Result<T> = std::result::Result<T, Error>;
