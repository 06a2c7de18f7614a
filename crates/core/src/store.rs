//! SQLite-backed patient store.
//!
//! The store owns a single connection behind a mutex. Request handling is read-only and each
//! request borrows the connection for the duration of one view call via [`Store::with_conn`].
//!
//! Every connection carries a `fold(text)` scalar function that lowercases with full Unicode case
//! mapping. SQLite's own `LIKE` only folds ASCII, so text filters compare `fold(column)` against a
//! lowercased pattern.
//!
//! ## Tables
//!
//! ```text
//! organizations, users, user_permissions,
//! patient_categories, patients, patient_care_team,
//! insurances, intakes, referral_notes
//! ```

use crate::{RosterError, RosterResult};
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = include_str!("schema.sql");

const REQUIRED_TABLES: [&str; 9] = [
    "organizations",
    "users",
    "user_permissions",
    "patient_categories",
    "patients",
    "patient_care_team",
    "insurances",
    "intakes",
    "referral_notes",
];

/// Shared handle to the roster database.
#[derive(Clone, Debug)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Opens (or creates) the database at `path` and applies the schema.
    pub fn create<P: AsRef<Path>>(path: P) -> RosterResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Self::from_connection(conn)
    }

    /// Opens an existing database, rejecting files that lack the roster tables.
    pub fn open<P: AsRef<Path>>(path: P) -> RosterResult<Self> {
        let conn = Connection::open(path)?;

        let placeholders = repeat_vars(REQUIRED_TABLES.len());
        let sql = format!(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ({placeholders})"
        );
        let table_count: usize = conn.query_row(
            &sql,
            rusqlite::params_from_iter(REQUIRED_TABLES.iter()),
            |row| row.get(0),
        )?;

        if table_count != REQUIRED_TABLES.len() {
            return Err(RosterError::InvalidDatabase(format!(
                "expected {} roster tables, found {}",
                REQUIRED_TABLES.len(),
                table_count
            )));
        }

        Self::from_connection(conn)
    }

    /// In-memory store with the schema applied. Used by tests and demos.
    pub fn open_in_memory() -> RosterResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> RosterResult<Self> {
        register_functions(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with exclusive access to the connection.
    pub fn with_conn<T, F>(&self, f: F) -> RosterResult<T>
    where
        F: FnOnce(&Connection) -> RosterResult<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| RosterError::StoreLockPoisoned)?;
        f(&conn)
    }
}

fn register_functions(conn: &Connection) -> RosterResult<()> {
    conn.create_scalar_function(
        "fold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text = ctx.get::<Option<String>>(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )?;
    Ok(())
}

/// `?, ?, ?` with `n` placeholders.
pub(crate) fn repeat_vars(n: usize) -> String {
    let mut s = "?, ".repeat(n);
    s.truncate(s.len().saturating_sub(2));
    s
}
