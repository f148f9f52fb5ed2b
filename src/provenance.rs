//! Provenance log - which sources contributed each local contact
//!
//! Append-mostly: sources are added one row at a time and removed only in
//! bulk per contact. The same `(contact, source)` pair may be recorded any
//! number of times; nothing here deduplicates.

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use crate::Result;
use crate::storage::SqliteHandle;
use crate::storage::schema::{
    self, CONTACT_SOURCES_TABLE, LOCAL_CONTACT_ID, SOURCE,
};

/// One source attribution for a contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    /// Assigned by the engine
    pub source_id: i64,
    /// Contact owned elsewhere; never checked for existence
    pub local_contact_id: i64,
    pub source: String,
}

/// Create the contact sources table and its index if missing
pub fn create_schema(handle: &SqliteHandle) -> Result<()> {
    handle.ensure_writable()?;
    for stmt in schema::contact_sources_statements() {
        handle
            .execute_batch(stmt)
            .map_err(|e| e.into_schema(CONTACT_SOURCES_TABLE))?;
    }
    tracing::info!(table = CONTACT_SOURCES_TABLE, "schema ready");
    Ok(())
}

/// Record that `source` contributed to a contact. Returns the new `SourceId`.
pub fn add_source(handle: &SqliteHandle, local_contact_id: i64, source: &str) -> Result<i64> {
    let source_id = handle.insert(
        CONTACT_SOURCES_TABLE,
        &[
            (LOCAL_CONTACT_ID, Value::Integer(local_contact_id)),
            (SOURCE, Value::Text(source.to_string())),
        ],
    )?;
    tracing::debug!(local_contact_id, source, source_id, "added contact source");
    Ok(source_id)
}

/// Remove every source for a contact. A contact with none is not an error.
pub fn delete_all_sources(handle: &SqliteHandle, local_contact_id: i64) -> Result<usize> {
    let deleted = handle.delete(CONTACT_SOURCES_TABLE, (LOCAL_CONTACT_ID, Value::Integer(local_contact_id)))?;
    tracing::debug!(local_contact_id, deleted, "deleted contact sources");
    Ok(deleted)
}

/// Fill `out` with the contact's sources in insertion order.
///
/// `out` is cleared before the read starts. If the read fails part way,
/// whatever was appended up to that point is left in place. Rows whose
/// source is NULL are skipped. Returns the number of sources appended.
pub fn fetch_sources_into(
    handle: &SqliteHandle,
    local_contact_id: i64,
    out: &mut Vec<String>,
) -> Result<usize> {
    out.clear();
    let mut skipped = 0usize;
    handle.for_each_row(
        "SELECT Source FROM ContactSources WHERE LocalContactId = ?1 ORDER BY SourceId",
        [local_contact_id],
        |row| {
            match row.get::<_, Option<String>>(0)? {
                Some(source) => out.push(source),
                None => skipped += 1,
            }
            Ok(())
        },
    )?;

    if skipped > 0 {
        tracing::warn!(local_contact_id, skipped, "skipped contact sources with no label");
    }
    Ok(out.len())
}

/// All sources recorded for a contact, in insertion order
pub fn fetch_sources(handle: &SqliteHandle, local_contact_id: i64) -> Result<Vec<String>> {
    let mut sources = Vec::new();
    fetch_sources_into(handle, local_contact_id, &mut sources)?;
    Ok(sources)
}

/// Full rows for a contact, in insertion order
pub fn fetch_records(handle: &SqliteHandle, local_contact_id: i64) -> Result<Vec<ProvenanceRecord>> {
    handle.query_map(
        "SELECT SourceId, LocalContactId, Source FROM ContactSources
         WHERE LocalContactId = ?1 AND Source IS NOT NULL
         ORDER BY SourceId",
        [local_contact_id],
        row_to_record,
    )
}

/// Number of sources recorded for a contact, duplicates included
pub fn count_sources(handle: &SqliteHandle, local_contact_id: i64) -> Result<usize> {
    handle.count(
        "SELECT COUNT(*) FROM ContactSources WHERE LocalContactId = ?1 AND Source IS NOT NULL",
        [local_contact_id],
    )
}

/// Contacts that carry `source` at least once, ascending
pub fn contacts_with_source(handle: &SqliteHandle, source: &str) -> Result<Vec<i64>> {
    handle.query_map(
        "SELECT DISTINCT LocalContactId FROM ContactSources WHERE Source = ?1 ORDER BY LocalContactId",
        [source],
        |row| row.get(0),
    )
}

/// Count all rows in the log
pub fn count_all(handle: &SqliteHandle) -> Result<usize> {
    handle.count("SELECT COUNT(*) FROM ContactSources", [])
}

/// Number of distinct contacts with at least one row
pub fn count_contacts(handle: &SqliteHandle) -> Result<usize> {
    handle.count("SELECT COUNT(DISTINCT LocalContactId) FROM ContactSources", [])
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<ProvenanceRecord> {
    Ok(ProvenanceRecord {
        source_id: row.get(0)?,
        local_contact_id: row.get(1)?,
        source: row.get(2)?,
    })
}
