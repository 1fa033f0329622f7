use camino::Utf8PathBuf;
use rusqlite::Error as SqliteError;
use thiserror::Error;

/// Errors raised by the MBTiles store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database file could not be opened or created.
    #[error("failed to open MBTiles store at {path}")]
    Open {
        /// Location of the store.
        path: Utf8PathBuf,
        /// Error reported by SQLite.
        #[source]
        source: SqliteError,
    },
    /// A schema statement failed.
    #[error("failed to execute schema step '{step}'")]
    Schema {
        /// Name of the failing step.
        step: &'static str,
        /// Error reported by SQLite.
        #[source]
        source: SqliteError,
    },
    /// A query or write failed.
    #[error("failed to {operation}")]
    Sqlite {
        /// Name of the failing operation.
        operation: &'static str,
        /// Error reported by SQLite.
        #[source]
        source: SqliteError,
    },
    /// A stored integer does not fit the domain type.
    #[error("{what} value {value} is out of range")]
    OutOfRange {
        /// Which value overflowed.
        what: &'static str,
        /// The offending value.
        value: i128,
    },
}
