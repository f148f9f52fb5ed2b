//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - ContactSources(SourceId, LocalContactId, Source)
//! - MePresenceCache(id, UserId, NetworkId, Status)
//!
//! The handle here knows nothing about either table; the `provenance` and
//! `presence` modules build their statements on top of it.

pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteHandle;
