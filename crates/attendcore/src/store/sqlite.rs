//! SQLite backend.
//!
//! Uniqueness is enforced by the `(group_name, login_key)` primary key, so
//! concurrent registrations of the same login resolve inside SQLite even
//! when several processes share the file.

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

use super::{login_key, CredentialRecord, CredentialStore, GroupPolicy, GroupSummary};
use crate::error::StoreError;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS study_groups (
    name      TEXT PRIMARY KEY NOT NULL,
    relevance INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS students (
    group_name      TEXT NOT NULL REFERENCES study_groups(name),
    login           TEXT NOT NULL,
    login_key       TEXT NOT NULL,
    password_digest TEXT NOT NULL,
    subscribed      INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (group_name, login_key)
);
";

pub struct SqliteStore {
    pool: DbPool,
    policy: GroupPolicy,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and applies the schema.
    pub fn open(path: &Path, policy: GroupPolicy) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.busy_timeout(Duration::from_secs(5))?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")
        });
        let pool = Pool::builder().max_size(4).build(manager)?;

        let conn = pool.get()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self { pool, policy })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut DbConnection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }
}

fn group_exists(conn: &Connection, group: &str) -> Result<bool, StoreError> {
    let found = conn
        .query_row("SELECT 1 FROM study_groups WHERE name = ?1", params![group], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

fn missing(conn: &Connection, group: String, login: String) -> StoreError {
    match group_exists(conn, &group) {
        Ok(true) => StoreError::StudentNotFound { group, login },
        Ok(false) => StoreError::GroupNotFound(group),
        Err(e) => e,
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn insert_if_absent(&self, group: &str, login: &str, digest: &str) -> Result<(), StoreError> {
        let (group, login, digest) = (group.to_string(), login.to_string(), digest.to_string());
        let policy = self.policy;

        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if !group_exists(&tx, &group)? {
                match policy {
                    GroupPolicy::RequireExisting => return Err(StoreError::GroupNotFound(group)),
                    GroupPolicy::AutoCreate => {
                        tx.execute("INSERT INTO study_groups (name, relevance) VALUES (?1, 0)", params![group])?;
                    }
                }
            }

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO students (group_name, login, login_key, password_digest, subscribed)
                 VALUES (?1, ?2, ?3, ?4, 0)",
                params![group, login, login_key(&login), digest],
            )?;
            if inserted == 0 {
                return Err(StoreError::DuplicateLogin { group, login });
            }

            tx.commit()?;
            log::debug!("Stored new student {:?} in group {:?}", login, group);
            Ok(())
        })
        .await
    }

    async fn find(&self, group: &str, login: &str) -> Result<CredentialRecord, StoreError> {
        let (group, login) = (group.to_string(), login.to_string());

        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT login, password_digest, subscribed FROM students
                     WHERE group_name = ?1 AND login_key = ?2",
                    params![group, login_key(&login)],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, bool>(2)?,
                        ))
                    },
                )
                .optional()?;

            match row {
                Some((stored_login, password_digest, subscribed)) => Ok(CredentialRecord {
                    group,
                    login: stored_login,
                    password_digest,
                    subscribed,
                }),
                None => Err(missing(conn, group, login)),
            }
        })
        .await
    }

    async fn toggle(&self, group: &str, login: &str, value: bool) -> Result<(), StoreError> {
        let (group, login) = (group.to_string(), login.to_string());

        self.with_conn(move |conn| {
            // Counts matched rows, so re-setting the same value still reports 1
            let changed = conn.execute(
                "UPDATE students SET subscribed = ?3 WHERE group_name = ?1 AND login_key = ?2",
                params![group, login_key(&login), value],
            )?;
            if changed == 0 {
                return Err(missing(conn, group, login));
            }
            Ok(())
        })
        .await
    }

    async fn ensure_group(&self, group: &str, relevance: bool) -> Result<bool, StoreError> {
        let group = group.to_string();

        self.with_conn(move |conn| {
            let created = conn.execute(
                "INSERT OR IGNORE INTO study_groups (name, relevance) VALUES (?1, ?2)",
                params![group, relevance],
            )?;
            Ok(created > 0)
        })
        .await
    }

    async fn groups(&self) -> Result<Vec<GroupSummary>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT g.name, g.relevance, COUNT(s.login), COALESCE(SUM(s.subscribed), 0)
                 FROM study_groups g
                 LEFT JOIN students s ON s.group_name = g.name
                 GROUP BY g.name, g.relevance
                 ORDER BY g.name",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(GroupSummary {
                    name: row.get(0)?,
                    relevance: row.get(1)?,
                    students: row.get::<_, i64>(2)? as usize,
                    present: row.get::<_, i64>(3)? as usize,
                })
            })?;
            let summaries = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(summaries)
        })
        .await
    }
}
