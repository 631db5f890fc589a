//! SQLite policy storage
//!
//! Schema: one `policies` row per policy (uid, type, description, effect,
//! context JSON) plus one child table each for subjects, resources and
//! actions, one row per matcher stored as JSON text. Rows are assembled back
//! into the canonical policy document and parsed with serde, so conditions
//! go through the process-wide registry.

use super::{filter_candidates, Storage};
use crate::checker::Checker;
use crate::condition::encode_context;
use crate::error::{Result, StoreError};
use crate::inquiry::Inquiry;
use crate::policy::Policy;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde_json::{json, Value};
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;
    CREATE TABLE IF NOT EXISTS policies (
        uid         TEXT PRIMARY KEY,
        type        INTEGER NOT NULL,
        description TEXT,
        effect      INTEGER NOT NULL,
        context     TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS policy_subjects (
        id      INTEGER PRIMARY KEY AUTOINCREMENT,
        uid     TEXT NOT NULL REFERENCES policies(uid) ON DELETE CASCADE,
        subject TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS policy_resources (
        id       INTEGER PRIMARY KEY AUTOINCREMENT,
        uid      TEXT NOT NULL REFERENCES policies(uid) ON DELETE CASCADE,
        resource TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS policy_actions (
        id     INTEGER PRIMARY KEY AUTOINCREMENT,
        uid    TEXT NOT NULL REFERENCES policies(uid) ON DELETE CASCADE,
        action TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_policy_subjects_uid ON policy_subjects(uid);
    CREATE INDEX IF NOT EXISTS idx_policy_resources_uid ON policy_resources(uid);
    CREATE INDEX IF NOT EXISTS idx_policy_actions_uid ON policy_actions(uid);
";

/// (table, column) of each matcher child table
const SUBJECTS: (&str, &str) = ("policy_subjects", "subject");
const RESOURCES: (&str, &str) = ("policy_resources", "resource");
const ACTIONS: (&str, &str) = ("policy_actions", "action");

/// Flattened policy ready for insertion
struct PolicyRecord {
    uid: String,
    kind: u8,
    description: Option<String>,
    effect: bool,
    context: String,
    subjects: Vec<String>,
    resources: Vec<String>,
    actions: Vec<String>,
}

impl PolicyRecord {
    fn from_policy(policy: &Policy) -> Result<Self> {
        let encode = |values: &[Value]| -> Result<Vec<String>> {
            values
                .iter()
                .map(|v| Ok(serde_json::to_string(v)?))
                .collect()
        };

        Ok(PolicyRecord {
            uid: policy.uid.clone(),
            kind: policy.kind.into(),
            description: policy.description.clone(),
            effect: policy.effect.into(),
            context: serde_json::to_string(&encode_context(&policy.context)?)?,
            subjects: encode(&policy.subjects)?,
            resources: encode(&policy.resources)?,
            actions: encode(&policy.actions)?,
        })
    }

    fn insert(&self, tx: &Transaction<'_>) -> Result<()> {
        tx.execute(
            "INSERT INTO policies (uid, type, description, effect, context)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![self.uid, self.kind, self.description, self.effect, self.context],
        )?;
        self.insert_matchers(tx)
    }

    fn insert_matchers(&self, tx: &Transaction<'_>) -> Result<()> {
        for ((table, column), values) in [
            (SUBJECTS, &self.subjects),
            (RESOURCES, &self.resources),
            (ACTIONS, &self.actions),
        ] {
            let sql = format!("INSERT INTO {} (uid, {}) VALUES (?1, ?2)", table, column);
            let mut stmt = tx.prepare_cached(&sql)?;
            for value in values {
                stmt.execute(params![self.uid, value])?;
            }
        }
        Ok(())
    }
}

/// `policies` row as read back
struct PolicyRow {
    uid: String,
    kind: u8,
    description: Option<String>,
    effect: bool,
    context: String,
}

/// Relational policy backend on SQLite
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        info!("Opening policy database at {:?}", path.as_ref());
        Self::from_connection(Connection::open(path)?)
    }

    /// Private in-memory database
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Use an existing connection, creating the schema if needed
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteStorage {
            conn: Mutex::new(conn),
        })
    }

    fn exists(conn: &Connection, uid: &str) -> Result<bool> {
        Ok(conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM policies WHERE uid = ?1)",
            params![uid],
            |row| row.get(0),
        )?)
    }

    fn matchers(conn: &Connection, (table, column): (&str, &str), uid: &str) -> Result<Vec<Value>> {
        let sql = format!("SELECT {} FROM {} WHERE uid = ?1 ORDER BY id", column, table);
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![uid], |row| row.get::<_, String>(0))?;

        let mut values = Vec::new();
        for text in rows {
            values.push(serde_json::from_str(&text?)?);
        }
        Ok(values)
    }

    fn assemble(conn: &Connection, row: PolicyRow) -> Result<Policy> {
        let context: Value = serde_json::from_str(&row.context)?;
        let subjects = Self::matchers(conn, SUBJECTS, &row.uid)?;
        let resources = Self::matchers(conn, RESOURCES, &row.uid)?;
        let actions = Self::matchers(conn, ACTIONS, &row.uid)?;

        let document = json!({
            "uid": row.uid,
            "type": row.kind,
            "effect": row.effect,
            "description": row.description,
            "context": context,
            "subjects": subjects,
            "resources": resources,
            "actions": actions,
        });
        Ok(serde_json::from_value(document)?)
    }

    fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PolicyRow> {
        Ok(PolicyRow {
            uid: row.get(0)?,
            kind: row.get(1)?,
            description: row.get(2)?,
            effect: row.get(3)?,
            context: row.get(4)?,
        })
    }

    fn page(conn: &Connection, limit: usize, offset: usize) -> Result<Vec<Policy>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);

        let rows = {
            let mut stmt = conn.prepare_cached(
                "SELECT uid, type, description, effect, context FROM policies
                 ORDER BY rowid LIMIT ?1 OFFSET ?2",
            )?;
            let mapped = stmt.query_map(params![limit, offset], Self::read_row)?;
            mapped.collect::<rusqlite::Result<Vec<_>>>()?
        };

        rows.into_iter()
            .map(|row| Self::assemble(conn, row))
            .collect()
    }

    fn delete_matchers(tx: &Transaction<'_>, uid: &str) -> Result<()> {
        for (table, _) in [SUBJECTS, RESOURCES, ACTIONS] {
            tx.execute(&format!("DELETE FROM {} WHERE uid = ?1", table), params![uid])?;
        }
        Ok(())
    }
}

impl Storage for SqliteStorage {
    fn add(&self, policy: &Policy) -> Result<()> {
        let record = PolicyRecord::from_policy(policy)?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        if Self::exists(&tx, &record.uid)? {
            return Err(StoreError::PolicyExists(record.uid));
        }
        record.insert(&tx)?;
        tx.commit()?;

        debug!("Inserted policy {}", policy.uid);
        Ok(())
    }

    fn get(&self, uid: &str) -> Result<Option<Policy>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT uid, type, description, effect, context FROM policies WHERE uid = ?1",
                params![uid],
                Self::read_row,
            )
            .optional()?;

        row.map(|row| Self::assemble(&conn, row)).transpose()
    }

    fn get_all(&self, limit: usize, offset: usize) -> Result<Vec<Policy>> {
        let conn = self.conn.lock();
        Self::page(&conn, limit, offset)
    }

    fn find_for_inquiry(
        &self,
        inquiry: &Inquiry,
        checker: Option<&dyn Checker>,
    ) -> Result<Vec<Policy>> {
        let all = {
            let conn = self.conn.lock();
            Self::page(&conn, usize::MAX, 0)?
        };
        Ok(filter_candidates(&all, inquiry, checker))
    }

    /// Replace the row set for the UID; an unknown UID is ignored
    fn update(&self, policy: &Policy) -> Result<()> {
        let record = PolicyRecord::from_policy(policy)?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        if !Self::exists(&tx, &record.uid)? {
            debug!("Update of unknown policy {} ignored", record.uid);
            return Ok(());
        }
        tx.execute(
            "UPDATE policies SET type = ?2, description = ?3, effect = ?4, context = ?5
             WHERE uid = ?1",
            params![
                record.uid,
                record.kind,
                record.description,
                record.effect,
                record.context
            ],
        )?;
        Self::delete_matchers(&tx, &record.uid)?;
        record.insert_matchers(&tx)?;
        tx.commit()?;

        debug!("Updated policy {}", record.uid);
        Ok(())
    }

    fn delete(&self, uid: &str) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        Self::delete_matchers(&tx, uid)?;
        let removed = tx.execute("DELETE FROM policies WHERE uid = ?1", params![uid])?;
        tx.commit()?;

        if removed > 0 {
            debug!("Deleted policy {}", uid);
        }
        Ok(())
    }
}
