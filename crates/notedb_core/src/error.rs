//! Error types for the note store.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be opened. Fatal for anything that depends on it.
    #[error("cannot open store: {message}")]
    Open {
        /// Description of the failure.
        message: String,
    },

    /// A single event was rejected.
    #[error("event rejected: {message}")]
    Ingest {
        /// Why the event was rejected.
        message: String,
    },

    /// The store was being closed, or the engine refused a read
    /// transaction.
    #[error("store busy, try again")]
    Busy,

    /// Every reader slot is taken.
    #[error("all {max} reader slots are in use")]
    ReadersFull {
        /// Configured reader slot count.
        max: usize,
    },

    /// A filter or search was malformed, or the query failed.
    #[error("query failed: {message}")]
    Query {
        /// Description of the failure.
        message: String,
    },

    /// The requested note or profile does not exist.
    #[error("not found")]
    NotFound,

    /// The store has been closed.
    #[error("store is closed")]
    Closed,

    /// The shared slot has not been opened yet.
    #[error("store is not open")]
    NotOpen,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Creates an open error.
    pub fn open(message: impl Into<String>) -> Self {
        Self::Open {
            message: message.into(),
        }
    }

    /// Creates an ingest error.
    pub fn ingest(message: impl Into<String>) -> Self {
        Self::Ingest {
            message: message.into(),
        }
    }

    /// Creates a query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Returns true for lock contention that a retry may clear.
    ///
    /// Callers should present these as "temporarily unavailable".
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Busy | Self::ReadersFull { .. })
    }

    /// Returns true if this is [`StoreError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(StoreError::Busy.is_transient());
        assert!(StoreError::ReadersFull { max: 4 }.is_transient());
        assert!(!StoreError::NotFound.is_transient());
        assert!(!StoreError::query("bad filter").is_transient());
    }

    #[test]
    fn messages_render() {
        assert_eq!(
            StoreError::ingest("missing id").to_string(),
            "event rejected: missing id"
        );
        assert_eq!(
            StoreError::ReadersFull { max: 2 }.to_string(),
            "all 2 reader slots are in use"
        );
    }
}
