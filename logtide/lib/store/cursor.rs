use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{migrate::Migrator, sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use tokio::fs;

use crate::{models::Cursor, LogtideError, LogtideResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Migrator for the cursor database
pub static CURSOR_DB_MIGRATOR: Migrator = sqlx::migrate!("lib/store/migrations/cursor");

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Durable per-(host, container) cursor state, backed by SQLite.
///
/// Survives process restarts so a restart never re-ingests the full log
/// history of a long-running container. Advancing is monotonic: a cursor
/// strictly earlier than the stored one is rejected with a warning.
#[derive(Debug, Clone)]
pub struct CursorStore {
    pool: Pool<Sqlite>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl CursorStore {
    /// Opens the cursor store at the given path, creating the database and
    /// running migrations if needed.
    pub async fn open(db_path: impl AsRef<Path>) -> LogtideResult<Self> {
        let pool = init_db(db_path, &CURSOR_DB_MIGRATOR).await?;
        Ok(Self { pool })
    }

    /// Wraps an existing pool. The caller is responsible for migrations.
    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Returns the stored cursor for the pair, or `None` if the container has
    /// never been ingested.
    pub async fn get(&self, host: &str, container_id: &str) -> LogtideResult<Option<Cursor>> {
        let row = sqlx::query(
            r#"
            SELECT ts, line_count FROM cursors
            WHERE host = ? AND container_id = ?
            "#,
        )
        .bind(host)
        .bind(container_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let ts: String = row.get("ts");
            let line_count: i64 = row.get("line_count");
            let timestamp = parse_stored_timestamp(&ts)?;
            Ok(Cursor::at(timestamp, line_count as u32))
        })
        .transpose()
    }

    /// Advances the cursor for the pair. Returns `true` if the new position
    /// was stored.
    ///
    /// A `cursor` strictly earlier than the stored one is a no-op returning
    /// `false`; this protects against a misbehaving transport replaying old
    /// data. Callers serialize advances per pair (the collector's
    /// single-flight guard), so read-then-write here does not race.
    pub async fn advance(
        &self,
        host: &str,
        container_id: &str,
        cursor: Cursor,
    ) -> LogtideResult<bool> {
        if let Some(stored) = self.get(host, container_id).await? {
            if cursor < stored {
                tracing::warn!(
                    host = %host,
                    container_id = %container_id,
                    stored = %stored,
                    rejected = %cursor,
                    "rejecting out-of-order cursor advance"
                );
                return Ok(false);
            }
        }

        sqlx::query(
            r#"
            INSERT INTO cursors (host, container_id, ts, line_count, modified_at)
            VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT (host, container_id) DO UPDATE SET
                ts = excluded.ts,
                line_count = excluded.line_count,
                modified_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(host)
        .bind(container_id)
        .bind(format_stored_timestamp(&cursor.timestamp))
        .bind(cursor.line_count as i64)
        .execute(&self.pool)
        .await?;

        Ok(true)
    }

    /// Returns the distinct hosts that currently have stored cursors.
    pub async fn hosts(&self) -> LogtideResult<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT host FROM cursors ORDER BY host")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("host")).collect())
    }

    /// Removes all cursors belonging to a host. Called when a host is removed
    /// from the configuration. Returns how many pairs were deleted.
    pub async fn remove_host(&self, host: &str) -> LogtideResult<u64> {
        let result = sqlx::query("DELETE FROM cursors WHERE host = ?")
            .bind(host)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Initializes a new SQLite database if it doesn't already exist at the specified path.
///
/// ## Arguments
///
/// * `db_path` - Path where the SQLite database file should be created
/// * `migrator` - SQLx migrator containing database schema migrations to run
pub async fn init_db(
    db_path: impl AsRef<Path>,
    migrator: &Migrator,
) -> LogtideResult<Pool<Sqlite>> {
    let db_path = db_path.as_ref();

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    // Create an empty database file if it doesn't exist
    if !db_path.exists() {
        fs::File::create(&db_path).await?;
    }

    // Create database connection pool
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&format!("sqlite://{}?mode=rwc", db_path.display()))
        .await?;

    // Run migrations
    migrator.run(&pool).await?;

    Ok(pool)
}

/// Formats a timestamp for storage, at microsecond precision so values
/// round-trip exactly against parsed docker timestamps.
fn format_stored_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_stored_timestamp(value: &str) -> LogtideResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(LogtideError::custom)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::tempdir;

    use super::*;

    fn ts(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, secs).unwrap()
    }

    #[tokio::test]
    async fn test_advance_then_get_round_trips() -> LogtideResult<()> {
        let temp_dir = tempdir()?;
        let store = CursorStore::open(temp_dir.path().join("cursors.db")).await?;

        let cursor = Cursor::at(ts(0) + chrono::Duration::microseconds(123456), 2);
        assert!(store.advance("local", "abc", cursor).await?);

        let stored = store.get("local", "abc").await?;
        assert_eq!(stored, Some(cursor));

        assert_eq!(store.get("local", "other").await?, None);

        Ok(())
    }

    #[tokio::test]
    async fn test_advance_is_monotonic() -> LogtideResult<()> {
        let temp_dir = tempdir()?;
        let store = CursorStore::open(temp_dir.path().join("cursors.db")).await?;

        assert!(store.advance("local", "abc", Cursor::at(ts(10), 3)).await?);

        // Strictly earlier timestamp: rejected.
        assert!(!store.advance("local", "abc", Cursor::at(ts(5), 0)).await?);
        // Same timestamp, lower line count: rejected.
        assert!(!store.advance("local", "abc", Cursor::at(ts(10), 1)).await?);
        assert_eq!(store.get("local", "abc").await?, Some(Cursor::at(ts(10), 3)));

        // Same timestamp, higher line count: accepted.
        assert!(store.advance("local", "abc", Cursor::at(ts(10), 7)).await?);
        // Later timestamp: accepted.
        assert!(store.advance("local", "abc", Cursor::at(ts(11), 0)).await?);
        assert_eq!(store.get("local", "abc").await?, Some(Cursor::at(ts(11), 0)));

        Ok(())
    }

    #[tokio::test]
    async fn test_cursors_survive_reopen() -> LogtideResult<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("cursors.db");

        {
            let store = CursorStore::open(&db_path).await?;
            store.advance("prod-1", "abc", Cursor::at(ts(42), 1)).await?;
        }

        let store = CursorStore::open(&db_path).await?;
        assert_eq!(
            store.get("prod-1", "abc").await?,
            Some(Cursor::at(ts(42), 1))
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_remove_host_drops_all_pairs() -> LogtideResult<()> {
        let temp_dir = tempdir()?;
        let store = CursorStore::open(temp_dir.path().join("cursors.db")).await?;

        store.advance("prod-1", "abc", Cursor::at(ts(1), 0)).await?;
        store.advance("prod-1", "def", Cursor::at(ts(2), 0)).await?;
        store.advance("prod-2", "ghi", Cursor::at(ts(3), 0)).await?;
        assert_eq!(store.hosts().await?, vec!["prod-1", "prod-2"]);

        assert_eq!(store.remove_host("prod-1").await?, 2);
        assert_eq!(store.get("prod-1", "abc").await?, None);
        assert_eq!(store.get("prod-2", "ghi").await?, Some(Cursor::at(ts(3), 0)));
        assert_eq!(store.hosts().await?, vec!["prod-2"]);

        Ok(())
    }
}
