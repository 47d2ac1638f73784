// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed store for settings and jobs.
//!
//! Two tables: `settings` holds one row per settings field with a
//! JSON-serialized value; `jobs` holds the full serialized job keyed by
//! id, with the current status duplicated for cheap filtering. Job
//! ordering follows insertion (rowid).

use chrono::Utc;
use hub_core::{Job, JobStatus, Settings};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;
use thiserror::Error;

/// Errors from store operations. Treated as fatal by callers; writes
/// are not retried.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable key/value persistence for settings and jobs. The transfer
/// engine is the only writer of job rows.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open the store, creating the schema and seeding default settings
    /// on first run.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS settings (
               key TEXT PRIMARY KEY,
               value TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS jobs (
               id TEXT PRIMARY KEY,
               status TEXT NOT NULL,
               payload TEXT NOT NULL
             );",
        )?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        if store.get_settings()?.is_none() {
            store.set_settings(&Settings::default())?;
        }
        Ok(store)
    }

    /// Reassemble the settings record from its field rows; `None` when
    /// no rows exist.
    pub fn get_settings(&self) -> Result<Option<Settings>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT key, value FROM settings")?;
        let mut rows = stmt.query([])?;
        let mut fields = serde_json::Map::new();
        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            let value: String = row.get(1)?;
            fields.insert(key, serde_json::from_str(&value)?);
        }
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(serde_json::Value::Object(
            fields,
        ))?))
    }

    /// Replace-all-then-insert in one transaction.
    pub fn set_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        // Settings always serializes to an object; one row per field.
        let fields = match serde_json::to_value(settings)? {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM settings", [])?;
        for (key, value) in &fields {
            tx.execute(
                "INSERT INTO settings(key, value) VALUES (?1, ?2)",
                params![key, serde_json::to_string(value)?],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Insert or replace one job by id.
    pub fn upsert_job(&self, job: &Job) -> Result<(), StoreError> {
        let payload = serde_json::to_string(job)?;
        self.conn.lock().execute(
            "INSERT INTO jobs(id, status, payload) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET status = excluded.status, payload = excluded.payload",
            params![job.id, job.status.to_string(), payload],
        )?;
        Ok(())
    }

    /// All jobs, newest insertion first.
    pub fn list_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT payload FROM jobs ORDER BY rowid DESC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut jobs = Vec::new();
        for payload in rows {
            jobs.push(serde_json::from_str(&payload?)?);
        }
        Ok(jobs)
    }

    pub fn get_job(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT payload FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query(params![job_id])?;
        match rows.next()? {
            Some(row) => {
                let payload: String = row.get(0)?;
                Ok(Some(serde_json::from_str(&payload)?))
            }
            None => Ok(None),
        }
    }

    /// Boot recovery sweep: rewrite every `running` job as
    /// `interrupted`. Called once, before the worker loops start
    /// dequeuing, so a restart never resumes half-done work.
    pub fn mark_running_jobs_interrupted(&self) -> Result<(), StoreError> {
        for mut job in self.list_jobs()? {
            if job.status == JobStatus::Running {
                job.status = JobStatus::Interrupted;
                if job.completed_at.is_none() {
                    job.completed_at = Some(Utc::now());
                }
                self.upsert_job(&job)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
