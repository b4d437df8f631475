//! Call-scoped diagnostic annotations.
//!
//! An [`ErrorContext`] is a stack of [`Frame`]s describing what the session
//! is doing (which mapper resource, which activity, which statement). Frames
//! are pushed with [`ErrorContext::enter`] and popped when the returned
//! [`ErrorScope`] guard drops, so unwinding through `?` or a panic never
//! leaves a stale frame behind.
//!
//! The context never alters an error. It only renders a description for
//! operator-facing logs:
//!
//! ```
//! use sqlmapper_core::error_context::{ErrorContext, Frame};
//!
//! let ctx = ErrorContext::new();
//! {
//!     let _scope = ctx.enter(
//!         Frame::new()
//!             .resource("mappers/user.xml")
//!             .activity("executing a query")
//!             .object("getUser"),
//!     );
//!     assert!(ctx.describe().contains("The error may involve getUser"));
//! }
//! assert_eq!(ctx.depth(), 0);
//! ```

use std::cell::RefCell;
use std::fmt;

/// One level of diagnostic annotation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub resource: Option<String>,
    pub activity: Option<String>,
    pub object: Option<String>,
    pub message: Option<String>,
    pub sql: Option<String>,
}

impl Frame {
    /// An empty frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// The mapper resource the statement came from.
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// What the session is doing, e.g. "executing a query".
    pub fn activity(mut self, activity: impl Into<String>) -> Self {
        self.activity = Some(activity.into());
        self
    }

    /// The object under operation, usually a statement id.
    pub fn object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    /// A free-form message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The SQL being executed.
    pub fn sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(message) = &self.message {
            write!(f, "\n### {message}")?;
        }
        if let Some(resource) = &self.resource {
            write!(f, "\n### The error may exist in {resource}")?;
        }
        if let Some(object) = &self.object {
            write!(f, "\n### The error may involve {object}")?;
        }
        if let Some(activity) = &self.activity {
            write!(f, "\n### The error occurred while {activity}")?;
        }
        if let Some(sql) = &self.sql {
            let flat: String = sql
                .chars()
                .map(|c| if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c })
                .collect();
            write!(f, "\n### SQL: {}", flat.trim())?;
        }
        Ok(())
    }
}

/// A stack of diagnostic frames owned by one session.
#[derive(Debug, Default)]
pub struct ErrorContext {
    frames: RefCell<Vec<Frame>>,
}

impl ErrorContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `frame`; it is popped when the returned guard drops.
    #[must_use = "the frame is popped as soon as the scope guard is dropped"]
    pub fn enter(&self, frame: Frame) -> ErrorScope<'_> {
        let mut frames = self.frames.borrow_mut();
        frames.push(frame);
        ErrorScope {
            ctx: self,
            depth: frames.len(),
        }
    }

    /// Number of frames currently pushed.
    pub fn depth(&self) -> usize {
        self.frames.borrow().len()
    }

    /// A copy of the innermost frame.
    pub fn current(&self) -> Option<Frame> {
        self.frames.borrow().last().cloned()
    }

    /// Record the SQL being executed on the innermost frame.
    pub fn annotate_sql(&self, sql: &str) {
        if let Some(top) = self.frames.borrow_mut().last_mut() {
            top.sql = Some(sql.to_string());
        }
    }

    /// Render the innermost frame.
    pub fn describe(&self) -> String {
        self.current().map(|f| f.to_string()).unwrap_or_default()
    }

    /// Render the innermost frame followed by a `### Cause:` line.
    pub fn describe_with_cause(&self, cause: &dyn fmt::Display) -> String {
        format!("{}\n### Cause: {}", self.describe(), cause)
    }

    fn truncate(&self, len: usize) {
        self.frames.borrow_mut().truncate(len);
    }
}

/// Guard returned by [`ErrorContext::enter`].
#[derive(Debug)]
pub struct ErrorScope<'a> {
    ctx: &'a ErrorContext,
    depth: usize,
}

impl Drop for ErrorScope<'_> {
    fn drop(&mut self) {
        self.ctx.truncate(self.depth - 1);
    }
}
