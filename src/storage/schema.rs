//! Database schema definitions

// ========== ContactSources ==========

pub const CONTACT_SOURCES_TABLE: &str = "ContactSources";
pub const LOCAL_CONTACT_ID: &str = "LocalContactId";
pub const SOURCE: &str = "Source";

/// SQL to create the contact sources table.
/// `Source` stays nullable so rows written by older clients still load.
pub const CREATE_CONTACT_SOURCES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS ContactSources (
    SourceId INTEGER PRIMARY KEY AUTOINCREMENT,
    LocalContactId INTEGER NOT NULL,
    Source TEXT
)
"#;

pub const CREATE_CONTACT_SOURCES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_contact_sources_contact ON ContactSources(LocalContactId)";

// ========== MePresenceCache ==========

pub const ME_PRESENCE_TABLE: &str = "MePresenceCache";
pub const USER_ID: &str = "UserId";
pub const NETWORK_ID: &str = "NetworkId";
pub const STATUS: &str = "Status";

/// SQL to create the presence cache table
pub const CREATE_ME_PRESENCE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS MePresenceCache (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    UserId TEXT,
    NetworkId INTEGER NOT NULL,
    Status INTEGER
)
"#;

/// Rows with no network cannot be keyed; older nullable tables may hold some.
pub const DELETE_PRESENCE_WITHOUT_NETWORK: &str =
    "DELETE FROM MePresenceCache WHERE NetworkId IS NULL";

/// Keeps the newest row per network. Tables created before the unique
/// index existed may carry duplicates that would block it.
pub const COLLAPSE_PRESENCE_DUPLICATES: &str = r#"
DELETE FROM MePresenceCache
WHERE id NOT IN (SELECT MAX(id) FROM MePresenceCache GROUP BY NetworkId)
"#;

pub const CREATE_PRESENCE_NETWORK_INDEX: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_me_presence_network ON MePresenceCache(NetworkId)";

/// Contact sources schema statements, in execution order
pub fn contact_sources_statements() -> Vec<&'static str> {
    vec![CREATE_CONTACT_SOURCES_TABLE, CREATE_CONTACT_SOURCES_INDEX]
}
