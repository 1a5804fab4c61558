//! SQLite store
//!
//! Rows carry their key columns plus a JSON `body`. Transactions are
//! `BEGIN IMMEDIATE`, so the check-for-lock and insert-lock steps of a
//! checkout cannot interleave with another writer; the unique index on
//! `artifact_locks (artifact_type, artifact_id)` backs this up.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use eam_artifact::{ArtifactId, ArtifactKind, ArtifactRecord, ArtifactRef, InitiativeId, UserId};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::{Store, StoreTx};
use crate::audit::AuditEvent;
use crate::conflict::{Conflict, ConflictId};
use crate::error::{StoreError, VcError};
use crate::initiative::{Initiative, Participant};
use crate::lock::Lock;
use crate::version::{BaselineEntry, ShadowVersion};

/// Current schema version for migrations
pub(crate) const SCHEMA_VERSION: i32 = 1;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS artifact_locks (
    artifact_type   TEXT    NOT NULL,
    artifact_id     INTEGER NOT NULL,
    initiative_id   TEXT    NOT NULL,
    locked_by       INTEGER NOT NULL,
    lock_expiry_ms  INTEGER NOT NULL,
    body            TEXT    NOT NULL,
    UNIQUE (artifact_type, artifact_id)
);
CREATE INDEX IF NOT EXISTS idx_locks_initiative ON artifact_locks (initiative_id);

CREATE TABLE IF NOT EXISTS artifacts (
    artifact_type   TEXT    NOT NULL,
    artifact_id     INTEGER NOT NULL,
    body            TEXT    NOT NULL,
    PRIMARY KEY (artifact_type, artifact_id)
);

CREATE TABLE IF NOT EXISTS artifact_revisions (
    artifact_type   TEXT    NOT NULL,
    artifact_id     INTEGER NOT NULL,
    revision        INTEGER NOT NULL,
    body            TEXT    NOT NULL,
    PRIMARY KEY (artifact_type, artifact_id, revision)
);

CREATE TABLE IF NOT EXISTS artifact_sequences (
    artifact_type   TEXT    PRIMARY KEY,
    last_id         INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS shadow_versions (
    artifact_type   TEXT    NOT NULL,
    artifact_id     INTEGER NOT NULL,
    initiative_id   TEXT    NOT NULL,
    body            TEXT    NOT NULL,
    PRIMARY KEY (artifact_type, artifact_id, initiative_id)
);
CREATE INDEX IF NOT EXISTS idx_shadows_initiative ON shadow_versions (initiative_id);

CREATE TABLE IF NOT EXISTS initiatives (
    initiative_id   TEXT    PRIMARY KEY,
    body            TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS initiative_participants (
    initiative_id   TEXT    NOT NULL,
    user_id         INTEGER NOT NULL,
    body            TEXT    NOT NULL,
    PRIMARY KEY (initiative_id, user_id)
);

CREATE TABLE IF NOT EXISTS conflicts (
    conflict_id     TEXT    PRIMARY KEY,
    initiative_id   TEXT    NOT NULL,
    artifact_type   TEXT    NOT NULL,
    artifact_id     INTEGER NOT NULL,
    body            TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_conflicts_initiative ON conflicts (initiative_id);

CREATE TABLE IF NOT EXISTS audit_events (
    sequence        INTEGER PRIMARY KEY,
    artifact_type   TEXT,
    artifact_id     INTEGER,
    body            TEXT    NOT NULL
);
";

/// SQLite-backed store
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`
    ///
    /// # Errors
    /// Returns error if the file cannot be opened or the schema created
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        info!("Opening SQLite database at {:?}", path);
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    ///
    /// # Errors
    /// Returns error if the schema cannot be created
    pub fn open_in_memory() -> Result<Self, StoreError> {
        debug!("Opening in-memory SQLite database");
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl Store for SqliteStore {
    fn transaction<R, F>(&self, f: F) -> Result<R, VcError>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<R, VcError>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = f(&mut SqliteTx { conn: &tx })?;
        tx.commit()?;
        Ok(result)
    }
}

/// Initialize the database schema
fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    let current = schema_version(conn)?;
    if current == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        conn.execute_batch(SCHEMA)?;
        conn.execute("DELETE FROM schema_version", [])?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [SCHEMA_VERSION],
        )?;
    } else if current > SCHEMA_VERSION {
        return Err(StoreError::Database(format!(
            "database schema v{current} is newer than supported v{SCHEMA_VERSION}"
        )));
    } else {
        debug!("Database schema is up to date (v{})", current);
    }
    Ok(())
}

/// Current schema version (0 if not initialized)
fn schema_version(conn: &Connection) -> Result<i32, StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;
    let version = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()?;
    Ok(version.unwrap_or(0))
}

fn encode<T: Serialize>(table: &'static str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Corrupt {
        table,
        message: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(table: &'static str, body: &str) -> Result<T, StoreError> {
    serde_json::from_str(body).map_err(|e| StoreError::Corrupt {
        table,
        message: e.to_string(),
    })
}

fn to_i64(table: &'static str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Corrupt {
        table,
        message: format!("{value} does not fit in INTEGER"),
    })
}

struct SqliteTx<'a> {
    conn: &'a Connection,
}

impl SqliteTx<'_> {
    fn one<T: DeserializeOwned>(
        &self,
        table: &'static str,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Option<T>, StoreError> {
        self.conn
            .query_row(sql, params, |row| row.get::<_, String>(0))
            .optional()?
            .map(|body| decode(table, &body))
            .transpose()
    }

    fn many<T: DeserializeOwned>(
        &self,
        table: &'static str,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<T>, StoreError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, |row| row.get::<_, String>(0))?;
        rows.map(|row| decode(table, &row?)).collect()
    }
}

impl StoreTx for SqliteTx<'_> {
    fn lock(&mut self, artifact: &ArtifactRef) -> Result<Option<Lock>, StoreError> {
        self.one(
            "artifact_locks",
            "SELECT body FROM artifact_locks WHERE artifact_type = ?1 AND artifact_id = ?2",
            params![artifact.kind.as_str(), artifact.id.0],
        )
    }

    fn insert_lock(&mut self, lock: &Lock) -> Result<(), StoreError> {
        let body = encode("artifact_locks", lock)?;
        let inserted = self.conn.execute(
            "INSERT INTO artifact_locks
                 (artifact_type, artifact_id, initiative_id, locked_by, lock_expiry_ms, body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                lock.artifact.kind.as_str(),
                lock.artifact.id.0,
                lock.initiative_id.as_str(),
                lock.locked_by.0,
                lock.lock_expiry.timestamp_millis(),
                body
            ],
        );
        match inserted {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::LockExists(lock.artifact))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete_lock(&mut self, artifact: &ArtifactRef) -> Result<bool, StoreError> {
        let n = self.conn.execute(
            "DELETE FROM artifact_locks WHERE artifact_type = ?1 AND artifact_id = ?2",
            params![artifact.kind.as_str(), artifact.id.0],
        )?;
        Ok(n > 0)
    }

    fn locks(&mut self, initiative: Option<&InitiativeId>) -> Result<Vec<Lock>, StoreError> {
        match initiative {
            Some(id) => self.many(
                "artifact_locks",
                "SELECT body FROM artifact_locks WHERE initiative_id = ?1
                 ORDER BY artifact_type, artifact_id",
                params![id.as_str()],
            ),
            None => self.many(
                "artifact_locks",
                "SELECT body FROM artifact_locks ORDER BY artifact_type, artifact_id",
                [],
            ),
        }
    }

    fn delete_expired_locks(&mut self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        // The millisecond column only narrows the scan; rows sharing `now`'s
        // millisecond are decided on the full-precision expiry.
        let candidates: Vec<Lock> = self.many(
            "artifact_locks",
            "SELECT body FROM artifact_locks WHERE lock_expiry_ms <= ?1",
            params![now.timestamp_millis()],
        )?;
        let mut deleted = 0;
        for lock in candidates.iter().filter(|l| !l.is_active(now)) {
            if self.delete_lock(&lock.artifact)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    fn baseline(&mut self, artifact: &ArtifactRef) -> Result<Option<BaselineEntry>, StoreError> {
        self.one(
            "artifacts",
            "SELECT body FROM artifacts WHERE artifact_type = ?1 AND artifact_id = ?2",
            params![artifact.kind.as_str(), artifact.id.0],
        )
    }

    fn baselines(&mut self, kind: ArtifactKind) -> Result<Vec<BaselineEntry>, StoreError> {
        self.many(
            "artifacts",
            "SELECT body FROM artifacts WHERE artifact_type = ?1 ORDER BY artifact_id",
            params![kind.as_str()],
        )
    }

    fn put_baseline(&mut self, entry: &BaselineEntry) -> Result<(), StoreError> {
        let body = encode("artifacts", entry)?;
        let revision = to_i64("artifact_revisions", entry.revision)?;
        self.conn.execute(
            "INSERT INTO artifacts (artifact_type, artifact_id, body) VALUES (?1, ?2, ?3)
             ON CONFLICT (artifact_type, artifact_id) DO UPDATE SET body = excluded.body",
            params![entry.artifact.kind.as_str(), entry.artifact.id.0, body],
        )?;
        self.conn.execute(
            "INSERT OR REPLACE INTO artifact_revisions (artifact_type, artifact_id, revision, body)
             VALUES (?1, ?2, ?3, ?4)",
            params![entry.artifact.kind.as_str(), entry.artifact.id.0, revision, body],
        )?;
        Ok(())
    }

    fn delete_baseline(&mut self, artifact: &ArtifactRef) -> Result<bool, StoreError> {
        self.conn.execute(
            "DELETE FROM artifact_revisions WHERE artifact_type = ?1 AND artifact_id = ?2",
            params![artifact.kind.as_str(), artifact.id.0],
        )?;
        let n = self.conn.execute(
            "DELETE FROM artifacts WHERE artifact_type = ?1 AND artifact_id = ?2",
            params![artifact.kind.as_str(), artifact.id.0],
        )?;
        Ok(n > 0)
    }

    fn revision(
        &mut self,
        artifact: &ArtifactRef,
        revision: u64,
    ) -> Result<Option<ArtifactRecord>, StoreError> {
        let revision = to_i64("artifact_revisions", revision)?;
        let entry: Option<BaselineEntry> = self.one(
            "artifact_revisions",
            "SELECT body FROM artifact_revisions
             WHERE artifact_type = ?1 AND artifact_id = ?2 AND revision = ?3",
            params![artifact.kind.as_str(), artifact.id.0, revision],
        )?;
        Ok(entry.map(|e| e.record))
    }

    fn revisions(&mut self, artifact: &ArtifactRef) -> Result<Vec<BaselineEntry>, StoreError> {
        self.many(
            "artifact_revisions",
            "SELECT body FROM artifact_revisions
             WHERE artifact_type = ?1 AND artifact_id = ?2 ORDER BY revision",
            params![artifact.kind.as_str(), artifact.id.0],
        )
    }

    fn next_artifact_id(&mut self, kind: ArtifactKind) -> Result<ArtifactId, StoreError> {
        let highest: Option<i64> = self.conn.query_row(
            "SELECT MAX(artifact_id) FROM artifacts WHERE artifact_type = ?1",
            params![kind.as_str()],
            |row| row.get(0),
        )?;
        let last: Option<i64> = self
            .conn
            .query_row(
                "SELECT last_id FROM artifact_sequences WHERE artifact_type = ?1",
                params![kind.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let next = highest.unwrap_or(0).max(last.unwrap_or(0)) + 1;
        self.conn.execute(
            "INSERT INTO artifact_sequences (artifact_type, last_id) VALUES (?1, ?2)
             ON CONFLICT (artifact_type) DO UPDATE SET last_id = excluded.last_id",
            params![kind.as_str(), next],
        )?;
        Ok(ArtifactId(next))
    }

    fn shadow(
        &mut self,
        artifact: &ArtifactRef,
        initiative: &InitiativeId,
    ) -> Result<Option<ShadowVersion>, StoreError> {
        self.one(
            "shadow_versions",
            "SELECT body FROM shadow_versions
             WHERE artifact_type = ?1 AND artifact_id = ?2 AND initiative_id = ?3",
            params![artifact.kind.as_str(), artifact.id.0, initiative.as_str()],
        )
    }

    fn shadows_for_initiative(
        &mut self,
        initiative: &InitiativeId,
    ) -> Result<Vec<ShadowVersion>, StoreError> {
        self.many(
            "shadow_versions",
            "SELECT body FROM shadow_versions WHERE initiative_id = ?1
             ORDER BY artifact_type, artifact_id",
            params![initiative.as_str()],
        )
    }

    fn shadows_for_artifact(&mut self, artifact: &ArtifactRef) -> Result<Vec<ShadowVersion>, StoreError> {
        self.many(
            "shadow_versions",
            "SELECT body FROM shadow_versions WHERE artifact_type = ?1 AND artifact_id = ?2
             ORDER BY initiative_id",
            params![artifact.kind.as_str(), artifact.id.0],
        )
    }

    fn put_shadow(&mut self, shadow: &ShadowVersion) -> Result<(), StoreError> {
        let body = encode("shadow_versions", shadow)?;
        self.conn.execute(
            "INSERT INTO shadow_versions (artifact_type, artifact_id, initiative_id, body)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (artifact_type, artifact_id, initiative_id) DO UPDATE SET body = excluded.body",
            params![
                shadow.artifact.kind.as_str(),
                shadow.artifact.id.0,
                shadow.initiative_id.as_str(),
                body
            ],
        )?;
        Ok(())
    }

    fn delete_shadow(
        &mut self,
        artifact: &ArtifactRef,
        initiative: &InitiativeId,
    ) -> Result<bool, StoreError> {
        let n = self.conn.execute(
            "DELETE FROM shadow_versions
             WHERE artifact_type = ?1 AND artifact_id = ?2 AND initiative_id = ?3",
            params![artifact.kind.as_str(), artifact.id.0, initiative.as_str()],
        )?;
        Ok(n > 0)
    }

    fn initiative(&mut self, id: &InitiativeId) -> Result<Option<Initiative>, StoreError> {
        self.one(
            "initiatives",
            "SELECT body FROM initiatives WHERE initiative_id = ?1",
            params![id.as_str()],
        )
    }

    fn initiatives(&mut self) -> Result<Vec<Initiative>, StoreError> {
        self.many(
            "initiatives",
            "SELECT body FROM initiatives ORDER BY initiative_id",
            [],
        )
    }

    fn put_initiative(&mut self, initiative: &Initiative) -> Result<(), StoreError> {
        let body = encode("initiatives", initiative)?;
        self.conn.execute(
            "INSERT INTO initiatives (initiative_id, body) VALUES (?1, ?2)
             ON CONFLICT (initiative_id) DO UPDATE SET body = excluded.body",
            params![initiative.initiative_id.as_str(), body],
        )?;
        Ok(())
    }

    fn participants(&mut self, id: &InitiativeId) -> Result<Vec<Participant>, StoreError> {
        self.many(
            "initiative_participants",
            "SELECT body FROM initiative_participants WHERE initiative_id = ?1 ORDER BY user_id",
            params![id.as_str()],
        )
    }

    fn participant(
        &mut self,
        id: &InitiativeId,
        user: UserId,
    ) -> Result<Option<Participant>, StoreError> {
        self.one(
            "initiative_participants",
            "SELECT body FROM initiative_participants WHERE initiative_id = ?1 AND user_id = ?2",
            params![id.as_str(), user.0],
        )
    }

    fn put_participant(&mut self, participant: &Participant) -> Result<(), StoreError> {
        let body = encode("initiative_participants", participant)?;
        self.conn.execute(
            "INSERT INTO initiative_participants (initiative_id, user_id, body) VALUES (?1, ?2, ?3)
             ON CONFLICT (initiative_id, user_id) DO UPDATE SET body = excluded.body",
            params![participant.initiative_id.as_str(), participant.user_id.0, body],
        )?;
        Ok(())
    }

    fn conflict(&mut self, id: &ConflictId) -> Result<Option<Conflict>, StoreError> {
        self.one(
            "conflicts",
            "SELECT body FROM conflicts WHERE conflict_id = ?1",
            params![id.0],
        )
    }

    fn conflicts(&mut self, initiative: &InitiativeId) -> Result<Vec<Conflict>, StoreError> {
        self.many(
            "conflicts",
            "SELECT body FROM conflicts WHERE initiative_id = ?1 ORDER BY conflict_id",
            params![initiative.as_str()],
        )
    }

    fn conflicts_for_artifact(&mut self, artifact: &ArtifactRef) -> Result<Vec<Conflict>, StoreError> {
        self.many(
            "conflicts",
            "SELECT body FROM conflicts WHERE artifact_type = ?1 AND artifact_id = ?2
             ORDER BY conflict_id",
            params![artifact.kind.as_str(), artifact.id.0],
        )
    }

    fn put_conflict(&mut self, conflict: &Conflict) -> Result<(), StoreError> {
        let body = encode("conflicts", conflict)?;
        self.conn.execute(
            "INSERT INTO conflicts (conflict_id, initiative_id, artifact_type, artifact_id, body)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (conflict_id) DO UPDATE SET body = excluded.body",
            params![
                conflict.id.0,
                conflict.initiative_id.as_str(),
                conflict.artifact.kind.as_str(),
                conflict.artifact.id.0,
                body
            ],
        )?;
        Ok(())
    }

    fn delete_conflicts(&mut self, initiative: &InitiativeId) -> Result<usize, StoreError> {
        Ok(self.conn.execute(
            "DELETE FROM conflicts WHERE initiative_id = ?1",
            params![initiative.as_str()],
        )?)
    }

    fn last_audit(&mut self) -> Result<Option<AuditEvent>, StoreError> {
        self.one(
            "audit_events",
            "SELECT body FROM audit_events ORDER BY sequence DESC LIMIT 1",
            [],
        )
    }

    fn append_audit(&mut self, event: &AuditEvent) -> Result<(), StoreError> {
        let body = encode("audit_events", event)?;
        let sequence = to_i64("audit_events", event.sequence)?;
        self.conn.execute(
            "INSERT INTO audit_events (sequence, artifact_type, artifact_id, body)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                sequence,
                event.artifact.map(|a| a.kind.as_str()),
                event.artifact.map(|a| a.id.0),
                body
            ],
        )?;
        Ok(())
    }

    fn audit(&mut self, artifact: Option<&ArtifactRef>) -> Result<Vec<AuditEvent>, StoreError> {
        match artifact {
            Some(a) => self.many(
                "audit_events",
                "SELECT body FROM audit_events WHERE artifact_type = ?1 AND artifact_id = ?2
                 ORDER BY sequence",
                params![a.kind.as_str(), a.id.0],
            ),
            None => self.many(
                "audit_events",
                "SELECT body FROM audit_events ORDER BY sequence",
                [],
            ),
        }
    }
}
