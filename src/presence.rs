//! Presence cache - last known availability of the current user per network
//!
//! Built for "read everything at startup, write through on every change".
//! Each network has at most one row: a unique index on `NetworkId` backs the
//! update-then-insert upsert, and both statements of an upsert run inside one
//! savepoint so no other writer can slip a row in between them.
//!
//! There is no delete path: rows for a network live from its
//! first upsert onwards.

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use crate::{Error, Result};
use crate::storage::SqliteHandle;
use crate::storage::schema::{
    COLLAPSE_PRESENCE_DUPLICATES, CREATE_ME_PRESENCE_TABLE, CREATE_PRESENCE_NETWORK_INDEX,
    DELETE_PRESENCE_WITHOUT_NETWORK, ME_PRESENCE_TABLE, NETWORK_ID, STATUS, USER_ID,
};

/// Presence of `user_id` on one external network
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub user_id: String,
    pub network_id: i64,
    /// Availability code; the enumeration belongs to the caller
    pub status_id: i64,
}

impl PresenceRecord {
    pub fn new(user_id: impl Into<String>, network_id: i64, status_id: i64) -> Self {
        Self {
            user_id: user_id.into(),
            network_id,
            status_id,
        }
    }
}

/// What an upsert did to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "action")]
pub enum UpsertOutcome {
    /// First write for this network
    Inserted { row_id: i64 },
    /// Existing row replaced in place
    Updated,
}

impl UpsertOutcome {
    pub fn is_insert(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted { .. })
    }
}

/// A record from a batch that could not be written
#[derive(Debug)]
pub struct BatchFailure {
    /// Position in the input slice
    pub index: usize,
    pub network_id: i64,
    pub error: Error,
}

/// Per-element result of [`upsert_many`]
#[derive(Debug, Default)]
pub struct BatchReport {
    /// `(input index, outcome)` for every record written
    pub applied: Vec<(usize, UpsertOutcome)>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    /// True when every record in the batch was written
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.applied.len() + self.failed.len()
    }

    pub fn inserted(&self) -> usize {
        self.applied.iter().filter(|(_, outcome)| outcome.is_insert()).count()
    }

    pub fn updated(&self) -> usize {
        self.applied.len() - self.inserted()
    }

    /// Input positions that failed, ascending
    pub fn failed_indices(&self) -> Vec<usize> {
        self.failed.iter().map(|f| f.index).collect()
    }
}

/// Create the presence cache table and its unique network index if missing.
///
/// Tables created before the index existed may hold several rows for one
/// network; those collapse to the most recently inserted row first. Rows
/// with a NULL network are dropped.
pub fn create_schema(handle: &SqliteHandle) -> Result<()> {
    handle.ensure_writable()?;

    handle
        .with_savepoint("presence_schema", |h| {
            h.execute_batch(CREATE_ME_PRESENCE_TABLE)?;
            let orphaned = h.execute(DELETE_PRESENCE_WITHOUT_NETWORK, [])?;
            if orphaned > 0 {
                tracing::warn!(orphaned, "dropped presence rows without a network");
            }
            let collapsed = h.execute(COLLAPSE_PRESENCE_DUPLICATES, [])?;
            if collapsed > 0 {
                tracing::info!(collapsed, "collapsed duplicate presence rows");
            }
            h.execute_batch(CREATE_PRESENCE_NETWORK_INDEX)
        })
        .map_err(|e| e.into_schema(ME_PRESENCE_TABLE))?;

    tracing::info!(table = ME_PRESENCE_TABLE, "schema ready");
    Ok(())
}

/// Every cached record, in row order. An empty table yields an empty vector.
pub fn load_all(handle: &SqliteHandle) -> Result<Vec<PresenceRecord>> {
    handle.query_map(
        "SELECT UserId, NetworkId, Status FROM MePresenceCache ORDER BY id",
        [],
        row_to_record,
    )
}

/// The cached record for one network
pub fn get(handle: &SqliteHandle, network_id: i64) -> Result<Option<PresenceRecord>> {
    handle.query_opt(
        "SELECT UserId, NetworkId, Status FROM MePresenceCache WHERE NetworkId = ?1",
        [network_id],
        row_to_record,
    )
}

pub fn count(handle: &SqliteHandle) -> Result<usize> {
    handle.count("SELECT COUNT(*) FROM MePresenceCache", [])
}

/// Write `record`, replacing the row for its network or creating one.
pub fn upsert_one(handle: &SqliteHandle, record: &PresenceRecord) -> Result<UpsertOutcome> {
    handle.ensure_writable()?;

    let outcome = handle.with_savepoint("presence_upsert", |h| {
        let updated = h.update(
            ME_PRESENCE_TABLE,
            &[
                (USER_ID, Value::Text(record.user_id.clone())),
                (STATUS, Value::Integer(record.status_id)),
            ],
            (NETWORK_ID, Value::Integer(record.network_id)),
        )?;
        if updated > 0 {
            return Ok(UpsertOutcome::Updated);
        }

        let row_id = h.insert(
            ME_PRESENCE_TABLE,
            &[
                (USER_ID, Value::Text(record.user_id.clone())),
                (NETWORK_ID, Value::Integer(record.network_id)),
                (STATUS, Value::Integer(record.status_id)),
            ],
        )?;
        Ok(UpsertOutcome::Inserted { row_id })
    })?;

    tracing::debug!(
        network_id = record.network_id,
        status_id = record.status_id,
        ?outcome,
        "upserted presence"
    );
    Ok(outcome)
}

/// Upsert each record in input order.
///
/// `None` and an empty slice write nothing. Records are independent: a
/// failure is recorded in the report and the next record is still attempted,
/// and records already written stay written. Only an unusable handle fails
/// the call as a whole.
pub fn upsert_many(handle: &SqliteHandle, records: Option<&[PresenceRecord]>) -> Result<BatchReport> {
    let mut report = BatchReport::default();
    let records = match records {
        Some(records) if !records.is_empty() => records,
        _ => return Ok(report),
    };
    handle.ensure_writable()?;

    for (index, record) in records.iter().enumerate() {
        match upsert_one(handle, record) {
            Ok(outcome) => report.applied.push((index, outcome)),
            Err(error) => {
                tracing::warn!(index, network_id = record.network_id, %error, "presence upsert failed");
                report.failed.push(BatchFailure {
                    index,
                    network_id: record.network_id,
                    error,
                });
            }
        }
    }

    tracing::debug!(
        attempted = report.attempted(),
        failed = report.failed.len(),
        "presence batch applied"
    );
    Ok(report)
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<PresenceRecord> {
    Ok(PresenceRecord {
        user_id: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
        network_id: row.get(1)?,
        status_id: row.get::<_, Option<i64>>(2)?.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> SqliteHandle {
        let handle = SqliteHandle::open_in_memory().unwrap();
        create_schema(&handle).unwrap();
        handle
    }

    #[test]
    fn test_empty_cache_loads_empty() {
        let handle = handle();
        assert!(load_all(&handle).unwrap().is_empty());
        assert!(get(&handle, 7).unwrap().is_none());
    }

    #[test]
    fn test_first_upsert_inserts() {
        let handle = handle();
        let record = PresenceRecord::new("u1", 7, 2);

        let outcome = upsert_one(&handle, &record).unwrap();
        assert!(outcome.is_insert());
        assert_eq!(load_all(&handle).unwrap(), vec![record.clone()]);
        assert_eq!(get(&handle, 7).unwrap(), Some(record));
    }

    #[test]
    fn test_second_upsert_replaces_in_place() {
        let handle = handle();

        upsert_one(&handle, &PresenceRecord::new("u1", 7, 2)).unwrap();
        let outcome = upsert_one(&handle, &PresenceRecord::new("u1", 7, 5)).unwrap();

        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(load_all(&handle).unwrap(), vec![PresenceRecord::new("u1", 7, 5)]);
        assert_eq!(count(&handle).unwrap(), 1);
    }

    #[test]
    fn test_upsert_replaces_user_too() {
        let handle = handle();
        upsert_one(&handle, &PresenceRecord::new("u1", 7, 2)).unwrap();
        upsert_one(&handle, &PresenceRecord::new("u2", 7, 2)).unwrap();

        assert_eq!(load_all(&handle).unwrap(), vec![PresenceRecord::new("u2", 7, 2)]);
    }

    #[test]
    fn test_networks_are_independent() {
        let handle = handle();
        upsert_one(&handle, &PresenceRecord::new("u1", 7, 2)).unwrap();
        upsert_one(&handle, &PresenceRecord::new("u1", 8, 1)).unwrap();
        upsert_one(&handle, &PresenceRecord::new("u1", 7, 3)).unwrap();

        assert_eq!(
            load_all(&handle).unwrap(),
            vec![PresenceRecord::new("u1", 7, 3), PresenceRecord::new("u1", 8, 1)]
        );
    }

    #[test]
    fn test_upsert_many_absent_or_empty_is_noop() {
        let handle = handle();

        let report = upsert_many(&handle, None).unwrap();
        assert_eq!(report.attempted(), 0);
        assert!(report.is_complete());

        let report = upsert_many(&handle, Some(&[][..])).unwrap();
        assert_eq!(report.attempted(), 0);
        assert_eq!(count(&handle).unwrap(), 0);
    }

    #[test]
    fn test_upsert_many_in_order() {
        let handle = handle();
        let records = vec![
            PresenceRecord::new("u1", 1, 1),
            PresenceRecord::new("u1", 2, 1),
            PresenceRecord::new("u1", 1, 4),
        ];

        let report = upsert_many(&handle, Some(records.as_slice())).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.inserted(), 2);
        assert_eq!(report.updated(), 1);
        assert_eq!(report.applied[2], (2, UpsertOutcome::Updated));
        assert_eq!(
            load_all(&handle).unwrap(),
            vec![PresenceRecord::new("u1", 1, 4), PresenceRecord::new("u1", 2, 1)]
        );
    }

    #[test]
    fn test_upsert_many_continues_past_failure() {
        let handle = handle();
        handle
            .execute_batch(
                "CREATE TRIGGER reject_network BEFORE INSERT ON MePresenceCache
                 WHEN NEW.NetworkId = 99
                 BEGIN SELECT RAISE(ABORT, 'network rejected'); END",
            )
            .unwrap();

        let records = vec![
            PresenceRecord::new("u1", 1, 1),
            PresenceRecord::new("u1", 99, 1),
            PresenceRecord::new("u1", 2, 1),
        ];
        let report = upsert_many(&handle, Some(records.as_slice())).unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.failed_indices(), vec![1]);
        assert_eq!(report.failed[0].network_id, 99);
        assert!(matches!(report.failed[0].error, Error::Storage(_)));
        assert_eq!(count(&handle).unwrap(), 2);
        assert!(get(&handle, 99).unwrap().is_none());
    }

    #[test]
    fn test_closed_handle_is_precondition() {
        let mut handle = handle();
        handle.close().unwrap();

        assert!(create_schema(&handle).unwrap_err().is_precondition());
        assert!(upsert_one(&handle, &PresenceRecord::new("u1", 7, 2)).unwrap_err().is_precondition());
        assert!(load_all(&handle).unwrap_err().is_precondition());

        let records = [PresenceRecord::new("u1", 7, 2)];
        assert!(upsert_many(&handle, Some(&records[..])).unwrap_err().is_precondition());
        // Nothing to write means nothing to check
        assert!(upsert_many(&handle, None).unwrap().is_complete());
    }

    #[test]
    fn test_schema_collapses_legacy_duplicates() {
        let handle = SqliteHandle::open_in_memory().unwrap();
        handle.execute_batch(CREATE_ME_PRESENCE_TABLE).unwrap();
        for (user, network, status) in [("u1", 7, 1), ("u1", 8, 1), ("u2", 7, 3)] {
            handle
                .execute(
                    "INSERT INTO MePresenceCache (UserId, NetworkId, Status) VALUES (?1, ?2, ?3)",
                    rusqlite::params![user, network, status],
                )
                .unwrap();
        }

        create_schema(&handle).unwrap();

        assert_eq!(
            load_all(&handle).unwrap(),
            vec![PresenceRecord::new("u1", 8, 1), PresenceRecord::new("u2", 7, 3)]
        );
        let err = handle
            .execute(
                "INSERT INTO MePresenceCache (UserId, NetworkId, Status) VALUES ('u3', 7, 0)",
                [],
            )
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn test_schema_drops_legacy_rows_without_network() {
        let handle = SqliteHandle::open_in_memory().unwrap();
        handle
            .execute_batch(
                "CREATE TABLE MePresenceCache (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    UserId TEXT,
                    NetworkId INTEGER,
                    Status INTEGER
                )",
            )
            .unwrap();
        handle
            .execute_batch(
                "INSERT INTO MePresenceCache (UserId, NetworkId, Status) VALUES ('u1', NULL, 1);
                 INSERT INTO MePresenceCache (UserId, NetworkId, Status) VALUES ('u1', NULL, 3);
                 INSERT INTO MePresenceCache (UserId, NetworkId, Status) VALUES ('u1', 7, 2);",
            )
            .unwrap();

        create_schema(&handle).unwrap();

        assert_eq!(load_all(&handle).unwrap(), vec![PresenceRecord::new("u1", 7, 2)]);
        assert_eq!(count(&handle).unwrap(), 1);
    }

    #[test]
    fn test_create_schema_is_idempotent() {
        let handle = handle();
        upsert_one(&handle, &PresenceRecord::new("u1", 7, 2)).unwrap();
        create_schema(&handle).unwrap();
        assert_eq!(count(&handle).unwrap(), 1);
    }
}
