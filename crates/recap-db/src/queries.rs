use crate::Database;
use crate::models::CursorRow;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use recap_types::MessageTs;
use rusqlite::Connection;
use tracing::debug;

/// How far back an unread check looks when the user has no cursor yet.
pub const DEFAULT_LOOKBACK_HOURS: i64 = 2;

impl Database {
    // -- Read cursors --

    pub fn get_cursor(&self, user_id: &str, channel_id: &str) -> Result<Option<CursorRow>> {
        self.with_conn(|conn| query_cursor(conn, user_id, channel_id))
    }

    /// Stored last-read marker, or `now - 2h` when the user has none.
    pub fn last_read_or_default(
        &self,
        user_id: &str,
        channel_id: &str,
        now: DateTime<Utc>,
    ) -> Result<MessageTs> {
        let fallback = MessageTs::from_datetime(now - Duration::hours(DEFAULT_LOOKBACK_HOURS));

        let Some(row) = self.get_cursor(user_id, channel_id)? else {
            return Ok(fallback);
        };

        Ok(MessageTs::from_micros(row.last_read_micros))
    }

    /// Move the cursor forward to `ts`.
    ///
    /// Creates the row when absent. An existing row is only overwritten when
    /// `ts` is strictly newer, so the stored cursor never goes backwards no
    /// matter how concurrent pipelines interleave. Returns whether the row changed.
    pub fn advance_cursor(&self, user_id: &str, channel_id: &str, ts: MessageTs) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT INTO read_cursors (user_id, channel_id, last_read_ts, last_read_micros)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id, channel_id) DO UPDATE SET
                     last_read_ts = excluded.last_read_ts,
                     last_read_micros = excluded.last_read_micros,
                     updated_at = datetime('now')
                 WHERE excluded.last_read_micros > read_cursors.last_read_micros",
                rusqlite::params![user_id, channel_id, ts.to_string(), ts.as_micros()],
            )?;

            if changed == 0 {
                debug!(
                    "Cursor for {}/{} not advanced: {} is not newer",
                    user_id, channel_id, ts
                );
            }
            Ok(changed > 0)
        })
    }
}

fn query_cursor(conn: &Connection, user_id: &str, channel_id: &str) -> Result<Option<CursorRow>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, channel_id, last_read_ts, last_read_micros, created_at, updated_at
         FROM read_cursors
         WHERE user_id = ?1 AND channel_id = ?2",
    )?;

    let row = stmt
        .query_row([user_id, channel_id], |row| {
            Ok(CursorRow {
                user_id: row.get(0)?,
                channel_id: row.get(1)?,
                last_read_ts: row.get(2)?,
                last_read_micros: row.get(3)?,
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
