//! Per-session statement execution for SQLMapper Rust.
//!
//! An [`Executor`] is one session's view of the database. It caches query
//! results for the life of the session (or of one top-level statement),
//! guarantees that a query already running on the session's call stack is
//! never started again for the same key, and resolves circular object-graph
//! references once the outermost query completes.
//!
//! # Example
//!
//! ```ignore
//! let config = Arc::new(Configuration::new().environment("dev"));
//! let session = open_executor(config, Box::new(transaction), &factory);
//!
//! let mut param = Value::object([("id", 42_i64)]);
//! let first = session.query(&get_user, &mut param, RowBounds::default(), None)?;
//! let again = session.query(&get_user, &mut param, RowBounds::default(), None)?;
//! assert!(first[0].ptr_eq(&again[0])); // served from the local cache
//!
//! session.update(&touch_user, &mut param)?; // clears the local cache
//! session.commit(true)?;
//! session.close(false);
//! ```

pub mod backend;
pub mod cache_key;
pub mod config;
pub mod deferred;
pub mod executor;
pub mod local_cache;

pub use backend::{Backend, BackendFactory, BatchResult, ExecutorType};
pub use cache_key::CacheKey;
pub use config::{Configuration, Environment, LocalCacheScope};
pub use deferred::{DeferredLoad, DeferredLoadQueue, ResultExtractor, TargetShape};
pub use executor::{Executor, open_executor};
pub use local_cache::{CacheEntry, LocalCache, Lookup};
