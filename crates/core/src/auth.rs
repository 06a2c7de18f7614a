//! Request users and the permission gate.
//!
//! Every view calls [`authorize`] before touching patient data. A denial is an explicit
//! [`Access::Denied`] outcome that the transport layer turns into a forbidden response; it is
//! not an error.

use crate::RosterResult;
use rusqlite::{Connection, OptionalExtension};
use std::collections::BTreeSet;

/// An authenticated staff user.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub organization_id: Option<i64>,
    pub is_active: bool,
    pub is_superuser: bool,
    pub permissions: BTreeSet<String>,
}

impl User {
    /// Inactive users hold no permissions; active superusers hold all of them.
    pub fn has_perm(&self, codename: &str) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_superuser || self.permissions.contains(codename)
    }
}

/// Outcome of the permission gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access<T> {
    Granted(T),
    Denied,
}

impl<T> Access<T> {
    pub fn is_granted(&self) -> bool {
        matches!(self, Access::Granted(_))
    }
}

/// Checks that `user` is present and holds `permission`.
pub fn authorize<'a>(user: Option<&'a User>, permission: &str) -> Access<&'a User> {
    match user {
        Some(u) if u.has_perm(permission) => Access::Granted(u),
        Some(u) => {
            tracing::warn!(user = %u.username, permission, "permission denied");
            Access::Denied
        }
        None => {
            tracing::warn!(permission, "permission denied for anonymous request");
            Access::Denied
        }
    }
}

/// Resolves the user owning `api_key`, with their permission set.
///
/// Blank keys never match.
pub fn user_by_api_key(conn: &Connection, api_key: &str) -> RosterResult<Option<User>> {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        return Ok(None);
    }

    let user = conn
        .query_row(
            "SELECT id, username, first_name, last_name, organization_id, is_active, is_superuser
             FROM users WHERE api_key = ?1",
            [api_key],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    first_name: row.get(2)?,
                    last_name: row.get(3)?,
                    organization_id: row.get(4)?,
                    is_active: row.get(5)?,
                    is_superuser: row.get(6)?,
                    permissions: BTreeSet::new(),
                })
            },
        )
        .optional()?;

    let Some(mut user) = user else {
        return Ok(None);
    };

    let mut stmt = conn.prepare("SELECT codename FROM user_permissions WHERE user_id = ?1")?;
    user.permissions = stmt
        .query_map([user.id], |row| row.get(0))?
        .collect::<Result<BTreeSet<String>, _>>()?;

    Ok(Some(user))
}
