//! `SQLite` schema definitions for romhacks.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the entries table.
///
/// ROM hacks and ports share this table; `kind` tells them apart. List
/// columns (`features`, `screenshots`, `mod_links`) and
/// `platform_instructions` hold JSON text.
pub const CREATE_ENTRIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS entries (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    title TEXT NOT NULL,
    console TEXT NOT NULL DEFAULT '',
    version TEXT,
    release_date TEXT,
    author TEXT,
    description TEXT,
    features TEXT NOT NULL DEFAULT '[]',
    image_url TEXT,
    screenshots TEXT NOT NULL DEFAULT '[]',
    download_link TEXT,
    base_game TEXT,
    version_region TEXT,
    original_platform TEXT,
    base_region TEXT,
    base_revision TEXT,
    base_header TEXT,
    base_checksum_crc32 TEXT,
    base_checksum_md5 TEXT,
    base_checksum_sha1 TEXT,
    patch_format TEXT,
    patch_output_ext TEXT,
    dev_stage TEXT,
    popular INTEGER NOT NULL DEFAULT 0,
    online_play INTEGER NOT NULL DEFAULT 0,
    instruction INTEGER NOT NULL DEFAULT 0,
    instruction_text TEXT,
    platform_instructions TEXT,
    social_links TEXT,
    support_forum_url TEXT,
    discord_url TEXT,
    reddit_url TEXT,
    troubleshooting_url TEXT,
    rom_checker_url TEXT,
    wiki_url TEXT,
    game_series TEXT,
    mod_links TEXT,
    mod_instructions TEXT,
    created_at TEXT NOT NULL
)
";

/// SQL statement to create an index on kind for the list pages.
pub const CREATE_ENTRIES_KIND_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_entries_kind ON entries(kind, popular)
";

/// SQL statement to create the submissions table.
pub const CREATE_SUBMISSIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS submissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL DEFAULT 'romhack',
    title TEXT NOT NULL,
    base_game TEXT,
    console TEXT,
    author TEXT,
    release_date TEXT,
    version TEXT,
    description TEXT,
    features TEXT,
    download_link TEXT,
    patch_format TEXT,
    patch_page_url TEXT,
    project_link TEXT,
    base_region TEXT,
    base_revision TEXT,
    base_checksum_crc32 TEXT,
    base_checksum_md5 TEXT,
    base_checksum_sha1 TEXT,
    image_url TEXT,
    screenshots TEXT,
    dev_stage TEXT,
    online_play INTEGER NOT NULL DEFAULT 0,
    email TEXT,
    notes TEXT,
    platform_instructions TEXT,
    submitted_at TEXT NOT NULL,
    status TEXT DEFAULT 'new',
    admin_notes TEXT,
    ip_hash TEXT,
    user_agent_hash TEXT,
    published_entry_id TEXT
)
";

/// SQL statement to create the feedback table.
pub const CREATE_FEEDBACK_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS feedback (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    type TEXT NOT NULL,
    title TEXT,
    url TEXT,
    description TEXT NOT NULL,
    email TEXT,
    submitted_at TEXT NOT NULL,
    status TEXT DEFAULT 'new',
    admin_notes TEXT,
    ip_hash TEXT
)
";

/// SQL statement to create the all-time downloads table.
///
/// One row per entry and hashed client IP.
pub const CREATE_DOWNLOADS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS downloads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id TEXT NOT NULL,
    ip_hash TEXT NOT NULL,
    downloaded_at TEXT NOT NULL,
    UNIQUE(entry_id, ip_hash)
)
";

/// SQL statement to create the monthly downloads table.
///
/// One row per entry, hashed client IP and calendar month.
pub const CREATE_MONTHLY_DOWNLOADS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS monthly_downloads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id TEXT NOT NULL,
    ip_hash TEXT NOT NULL,
    year_month TEXT NOT NULL,
    downloaded_at TEXT NOT NULL,
    UNIQUE(entry_id, ip_hash, year_month)
)
";

/// SQL statement to create an index on `year_month` for monthly queries.
pub const CREATE_MONTHLY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_monthly_downloads_year_month ON monthly_downloads(year_month)
";

/// SQL statement to create the archive of past months' top entries.
pub const CREATE_POPULAR_HISTORY_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS monthly_popular_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    year_month TEXT NOT NULL,
    entry_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    download_count INTEGER NOT NULL,
    rank INTEGER NOT NULL,
    archived_at TEXT NOT NULL,
    UNIQUE(year_month, entry_id, kind)
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_ENTRIES_TABLE,
    CREATE_ENTRIES_KIND_INDEX,
    CREATE_SUBMISSIONS_TABLE,
    CREATE_FEEDBACK_TABLE,
    CREATE_DOWNLOADS_TABLE,
    CREATE_MONTHLY_DOWNLOADS_TABLE,
    CREATE_MONTHLY_INDEX,
    CREATE_POPULAR_HISTORY_TABLE,
    CREATE_METADATA_TABLE,
];

/// Tables every database must have, with a column each must carry.
pub const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    ("entries", &["id", "kind", "title", "console", "game_series", "platform_instructions"]),
    (
        "submissions",
        &["id", "title", "status", "admin_notes", "ip_hash", "published_entry_id"],
    ),
    ("feedback", &["id", "type", "description", "status"]),
    ("downloads", &["entry_id", "ip_hash"]),
    ("monthly_downloads", &["entry_id", "ip_hash", "year_month"]),
    (
        "monthly_popular_history",
        &["year_month", "entry_id", "kind", "download_count", "rank"],
    ),
    ("metadata", &["key", "value"]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.is_empty());
        }
    }

    #[test]
    fn test_download_tables_are_unique_per_client() {
        assert!(CREATE_DOWNLOADS_TABLE.contains("UNIQUE(entry_id, ip_hash)"));
        assert!(CREATE_MONTHLY_DOWNLOADS_TABLE.contains("UNIQUE(entry_id, ip_hash, year_month)"));
        assert!(CREATE_POPULAR_HISTORY_TABLE.contains("UNIQUE(year_month, entry_id, kind)"));
    }

    #[test]
    fn test_required_columns_exist_in_create_statements() {
        let joined = SCHEMA_STATEMENTS.join("\n");
        for (table, columns) in REQUIRED_COLUMNS {
            assert!(joined.contains(&format!("CREATE TABLE IF NOT EXISTS {table} (")));
            for column in *columns {
                assert!(joined.contains(column), "{table}.{column} missing");
            }
        }
    }
}
