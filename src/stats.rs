//! Row counts across the tables this crate owns

use serde::Serialize;
use crate::storage::SqliteHandle;
use crate::{presence, provenance, Result};

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbStats {
    pub contact_sources: usize,
    pub contacts: usize,
    pub presence_networks: usize,
}

/// Gather statistics. Both tables must exist.
pub fn collect(handle: &SqliteHandle) -> Result<DbStats> {
    Ok(DbStats {
        contact_sources: provenance::count_all(handle)?,
        contacts: provenance::count_contacts(handle)?,
        presence_networks: presence::count(handle)?,
    })
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Contact sources: {}", self.contact_sources)?;
        writeln!(f, "  Contacts: {}", self.contacts)?;
        writeln!(f, "  Presence networks: {}", self.presence_networks)
    }
}
