//! The transactional resource a session commits, rolls back and releases.
//!
//! Acquiring and pooling connections happens behind this trait; the session
//! only drives the transaction's lifecycle and reads its remaining timeout.

use std::time::Duration;

use crate::error::Result;

/// A unit of transactional work held by one session.
pub trait Transaction {
    /// Commit pending work.
    fn commit(&mut self) -> Result<()>;

    /// Roll back pending work.
    fn rollback(&mut self) -> Result<()>;

    /// Release the resource. Called once, when the session closes.
    fn close(&mut self) -> Result<()>;

    /// Time left before the transaction times out, if it has a deadline.
    fn timeout(&self) -> Result<Option<Duration>>;
}

/// Combine a statement timeout with the transaction's remaining time.
///
/// The transaction deadline wins whenever it is shorter than the statement's
/// own timeout, or when the statement has none.
pub fn effective_timeout(
    statement: Option<Duration>,
    transaction: Option<Duration>,
) -> Option<Duration> {
    match (statement, transaction) {
        (None, tx) => tx,
        (Some(stmt), None) => Some(stmt),
        (Some(stmt), Some(tx)) if stmt.is_zero() || tx < stmt => Some(tx),
        (Some(stmt), Some(_)) => Some(stmt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_deadline_caps_statement_timeout() {
        let secs = Duration::from_secs;
        assert_eq!(effective_timeout(None, None), None);
        assert_eq!(effective_timeout(Some(secs(30)), None), Some(secs(30)));
        assert_eq!(effective_timeout(None, Some(secs(5))), Some(secs(5)));
        assert_eq!(effective_timeout(Some(secs(30)), Some(secs(5))), Some(secs(5)));
        assert_eq!(effective_timeout(Some(secs(3)), Some(secs(5))), Some(secs(3)));
        assert_eq!(
            effective_timeout(Some(Duration::ZERO), Some(secs(5))),
            Some(secs(5))
        );
    }
}
