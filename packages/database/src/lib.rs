#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Statistics store for per-unit attribute values.
//!
//! [`store::StatisticsStore`] is the interface importers and the
//! conversion orchestrator share. [`statistics_db::DuckDbStore`] implements
//! it on a local `DuckDB` file at `data/statistics.duckdb`.

pub mod paths;
pub mod statistics_db;
pub mod store;

pub use statistics_db::DuckDbStore;
pub use store::StatisticsStore;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Filesystem error while preparing the database location.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store refused a write.
    #[error("Write rejected: {message}")]
    Rejected {
        /// Description of what was refused.
        message: String,
    },

    /// Stored data could not be read back into its type.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// Transaction calls out of order.
    #[error("Transaction error: {message}")]
    Transaction {
        /// Description of what went wrong.
        message: String,
    },
}
