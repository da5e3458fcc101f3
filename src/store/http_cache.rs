use rusqlite::{Connection, OptionalExtension, Result, params};

/// Cached response row. Timestamps are UTC milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub request: String,
    pub status: u16,
    pub body: String,
    pub expires_at: i64,
    pub created_at: i64,
}

impl CacheEntry {
    pub fn is_fresh(&self, now_millis: i64) -> bool {
        now_millis < self.expires_at
    }
}

/// Initializes the http_cache table in the SQLite database.
pub fn create_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS http_cache (
            key TEXT PRIMARY KEY,
            request TEXT NOT NULL,
            status INTEGER NOT NULL,
            body TEXT NOT NULL,
            expires_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_http_cache_expires_at ON http_cache (expires_at);",
        [],
    )?;
    Ok(())
}

/// Looks up an entry by key, expired or not.
pub fn get_entry(conn: &Connection, key: &str) -> Result<Option<CacheEntry>> {
    conn.query_row(
        "SELECT key, request, status, body, expires_at, created_at
         FROM http_cache WHERE key = ?1",
        params![key],
        |row| {
            Ok(CacheEntry {
                key: row.get(0)?,
                request: row.get(1)?,
                status: row.get(2)?,
                body: row.get(3)?,
                expires_at: row.get(4)?,
                created_at: row.get(5)?,
            })
        },
    )
    .optional()
}

/// Saves an entry, replacing any previous one under the same key.
pub fn save_entry(conn: &Connection, entry: &CacheEntry) -> Result<()> {
    conn.execute(
        "REPLACE INTO http_cache (key, request, status, body, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.key,
            entry.request,
            entry.status,
            entry.body,
            entry.expires_at,
            entry.created_at,
        ],
    )?;
    Ok(())
}

/// Deletes entries that expired at or before `now_millis`. Returns the number removed.
pub fn purge_expired(conn: &Connection, now_millis: i64) -> Result<usize> {
    conn.execute(
        "DELETE FROM http_cache WHERE expires_at <= ?1",
        params![now_millis],
    )
}

/// Deletes every entry. Returns the number removed.
pub fn clear(conn: &Connection) -> Result<usize> {
    conn.execute("DELETE FROM http_cache", [])
}
