//! # Syncstore - contact-sync persistence
//!
//! Embedded SQLite tables backing a contact-synchronization client.
//!
//! Syncstore provides:
//! - A provenance log mapping each local contact to the sources that contributed it
//! - A presence cache holding one availability record per external network
//! - A thin storage handle over `rusqlite` that the table modules share
//!
//! Each table module owns its schema and is the only code that queries its
//! table. Modules are stateless: every operation takes the handle explicitly.

pub mod storage;
pub mod provenance;
pub mod presence;
pub mod stats;
pub mod config;
pub mod output;
pub mod ui;

// Re-exports for convenient access
pub use config::{JournalMode, StoreConfig};
pub use presence::{BatchFailure, BatchReport, PresenceRecord, UpsertOutcome};
pub use provenance::ProvenanceRecord;
pub use stats::DbStats;
pub use storage::SqliteHandle;

/// Result type alias for Syncstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Syncstore operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The caller handed over a handle that cannot serve the request.
    /// Raised before any statement reaches the engine.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Schema error on {table}: {source}")]
    Schema {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::Precondition(_))
    }

    pub fn is_schema(&self) -> bool {
        matches!(self, Error::Schema { .. })
    }

    /// Reclassify an engine failure raised while creating `table`.
    pub(crate) fn into_schema(self, table: &'static str) -> Self {
        match self {
            Error::Storage(source) => Error::Schema { table, source },
            other => other,
        }
    }
}

/// Create every table owned by this crate.
pub fn create_all_schemas(handle: &SqliteHandle) -> Result<()> {
    provenance::create_schema(handle)?;
    presence::create_schema(handle)?;
    Ok(())
}
