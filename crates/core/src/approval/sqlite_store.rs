//! SQLite-backed approval store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    ApprovalFilter, ApprovalStatus, ApprovalStore, PendingApproval, StatusUpdate, StoreError,
};

const SELECT_COLUMNS: &str =
    "SELECT id, status, snapshot, created_at, updated_at, resolved_by, publish_url FROM approvals";

/// SQLite-backed approval store.
pub struct SqliteApprovalStore {
    conn: Mutex<Connection>,
}

/// A row as read from the database, before decoding.
struct RawRecord {
    id: String,
    status: String,
    snapshot: String,
    created_at: String,
    updated_at: String,
    resolved_by: Option<String>,
    publish_url: Option<String>,
}

impl RawRecord {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            status: row.get(1)?,
            snapshot: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
            resolved_by: row.get(5)?,
            publish_url: row.get(6)?,
        })
    }

    fn decode(self) -> Result<PendingApproval, StoreError> {
        let status: ApprovalStatus = self.status.parse().map_err(StoreError::Serialization)?;
        Ok(PendingApproval {
            snapshot: serde_json::from_str(&self.snapshot)?,
            status,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            resolved_by: self.resolved_by,
            publish_url: self.publish_url,
            id: self.id,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("bad timestamp '{}': {}", value, e)))
}

impl SqliteApprovalStore {
    /// Create a new SQLite approval store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite approval store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            PRAGMA busy_timeout = 5000;

            CREATE TABLE IF NOT EXISTS approvals (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                snapshot TEXT NOT NULL,
                source TEXT NOT NULL,
                url TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                resolved_by TEXT,
                publish_url TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_approvals_status ON approvals(status);
            CREATE INDEX IF NOT EXISTS idx_approvals_created_at ON approvals(created_at);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
    }

    fn get_with(conn: &Connection, id: &str) -> Result<Option<PendingApproval>, StoreError> {
        let sql = format!("{} WHERE id = ?", SELECT_COLUMNS);
        conn.query_row(&sql, params![id], RawRecord::from_row)
            .optional()?
            .map(RawRecord::decode)
            .transpose()
    }

    fn build_where_clause(filter: &ApprovalFilter) -> (String, Vec<String>) {
        let mut conditions = Vec::new();
        let mut args = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            args.push(status.as_str().to_string());
        }
        if let Some(after) = filter.created_after {
            conditions.push("created_at > ?");
            args.push(after.to_rfc3339());
        }

        if conditions.is_empty() {
            (String::new(), args)
        } else {
            (format!("WHERE {}", conditions.join(" AND ")), args)
        }
    }
}

impl ApprovalStore for SqliteApprovalStore {
    fn get(&self, id: &str) -> Result<Option<PendingApproval>, StoreError> {
        let conn = self.lock()?;
        Self::get_with(&conn, id)
    }

    fn upsert(&self, record: &PendingApproval) -> Result<PendingApproval, StoreError> {
        let conn = self.lock()?;
        let snapshot = serde_json::to_string(&record.snapshot)?;

        // Only pending rows are refreshed; terminal rows are an audit trail.
        conn.execute(
            r#"
            INSERT INTO approvals (id, status, snapshot, source, url, created_at, updated_at, resolved_by, publish_url)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                snapshot = excluded.snapshot,
                updated_at = excluded.updated_at
            WHERE approvals.status = 'pending'
            "#,
            params![
                record.id,
                record.status.as_str(),
                snapshot,
                record.snapshot.source,
                record.snapshot.url,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
                record.resolved_by,
                record.publish_url,
            ],
        )?;

        Self::get_with(&conn, &record.id)?.ok_or_else(|| StoreError::NotFound(record.id.clone()))
    }

    fn set_status(&self, id: &str, update: &StatusUpdate) -> Result<PendingApproval, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let current = Self::get_with(&tx, id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if current.status == update.status {
            return Ok(current);
        }
        if !current.status.can_transition_to(update.status) {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                current: current.status,
                requested: update.status,
            });
        }

        let now = Utc::now();
        tx.execute(
            "UPDATE approvals SET status = ?, resolved_by = ?, publish_url = ?, updated_at = ? WHERE id = ? AND status = 'pending'",
            params![
                update.status.as_str(),
                update.resolved_by,
                update.publish_url,
                now.to_rfc3339(),
                id,
            ],
        )?;
        tx.commit()?;

        Ok(PendingApproval {
            status: update.status,
            resolved_by: update.resolved_by.clone(),
            publish_url: update.publish_url.clone(),
            updated_at: now,
            ..current
        })
    }

    fn list(&self, filter: &ApprovalFilter) -> Result<Vec<PendingApproval>, StoreError> {
        let conn = self.lock()?;
        let (where_clause, args) = Self::build_where_clause(filter);

        let sql = format!(
            "{} {} ORDER BY created_at DESC LIMIT {} OFFSET {}",
            SELECT_COLUMNS,
            where_clause,
            filter.limit.max(0),
            filter.offset.max(0)
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), RawRecord::from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.decode()?);
        }
        Ok(records)
    }

    fn count(&self, filter: &ApprovalFilter) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        let (where_clause, args) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM approvals {}", where_clause);
        let count = conn.query_row(&sql, rusqlite::params_from_iter(args), |row| row.get(0))?;
        Ok(count)
    }
}
