/// Database row types. These map directly to SQLite rows.

#[derive(Debug, Clone)]
pub struct CursorRow {
    pub user_id: String,
    pub channel_id: String,
    pub last_read_ts: String,
    pub last_read_micros: i64,
    pub created_at: String,
    pub updated_at: String,
}
