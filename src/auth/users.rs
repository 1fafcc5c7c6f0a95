//! User accounts: anonymous demo users and registered users.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::password::{hash_password, verify_password};
use super::AuthError;
use crate::db::now;

const USER_COLUMNS: &str = "id, username, is_anonymous, created_at, last_seen_at";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    /// `None` for anonymous users.
    pub username: Option<String>,
    pub is_anonymous: bool,
    pub created_at: String,
    pub last_seen_at: String,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("游客")
    }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        is_anonymous: row.get(2)?,
        created_at: row.get(3)?,
        last_seen_at: row.get(4)?,
    })
}

pub fn validate_username(username: &str) -> Result<(), AuthError> {
    let len = username.chars().count();
    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !(3..=32).contains(&len) || !valid_chars {
        return Err(AuthError::InvalidUsername);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < 6 {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

pub fn create_anonymous_user(conn: &Connection) -> Result<User> {
    let id = uuid::Uuid::now_v7().to_string();
    let now = now();
    conn.execute(
        "INSERT INTO users (id, username, password_hash, is_anonymous, created_at, last_seen_at) \
         VALUES (?1, NULL, NULL, 1, ?2, ?2)",
        params![id, now],
    )?;
    tracing::debug!(user = %id, "anonymous user created");
    Ok(User {
        id,
        username: None,
        is_anonymous: true,
        created_at: now.clone(),
        last_seen_at: now,
    })
}

/// Validate credentials and hash the password, outside any write transaction.
pub fn prepare_credentials(username: &str, password: &str) -> Result<String, AuthError> {
    validate_username(username)?;
    validate_password(password)?;
    hash_password(password)
}

/// Insert a registered user with an already hashed password.
pub fn insert_registered_user(
    conn: &Connection,
    username: &str,
    password_hash: &str,
) -> Result<User, AuthError> {
    let taken: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )?;
    if taken {
        return Err(AuthError::UsernameTaken);
    }

    let id = uuid::Uuid::now_v7().to_string();
    let now = now();
    conn.execute(
        "INSERT INTO users (id, username, password_hash, is_anonymous, created_at, last_seen_at) \
         VALUES (?1, ?2, ?3, 0, ?4, ?4)",
        params![id, username, password_hash, now],
    )?;
    tracing::info!(user = %id, username = %username, "user registered");

    Ok(User {
        id,
        username: Some(username.to_string()),
        is_anonymous: false,
        created_at: now.clone(),
        last_seen_at: now,
    })
}

pub fn create_registered_user(
    conn: &Connection,
    username: &str,
    password: &str,
) -> Result<User, AuthError> {
    let hash = prepare_credentials(username, password)?;
    insert_registered_user(conn, username, &hash)
}

/// Check a username/password pair. Unknown users and wrong passwords both
/// yield `None`.
pub fn authenticate(conn: &Connection, username: &str, password: &str) -> Result<Option<User>, AuthError> {
    let row: Option<(User, String)> = conn
        .query_row(
            &format!(
                "SELECT {USER_COLUMNS}, password_hash FROM users \
                 WHERE username = ?1 AND is_anonymous = 0 AND password_hash IS NOT NULL"
            ),
            params![username],
            |row| Ok((row_to_user(row)?, row.get(5)?)),
        )
        .optional()?;

    match row {
        Some((user, hash)) if verify_password(password, &hash)? => Ok(Some(user)),
        _ => Ok(None),
    }
}

pub fn get_user(conn: &Connection, user_id: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![user_id],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

pub fn touch_user(conn: &Connection, user_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET last_seen_at = ?1 WHERE id = ?2",
        params![now(), user_id],
    )?;
    Ok(())
}

pub fn delete_user(conn: &Connection, user_id: &str) -> Result<bool> {
    let rows = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
    Ok(rows > 0)
}

/// Delete anonymous users (and, by cascade, all their data) not seen for `days`.
pub fn purge_stale_anonymous(conn: &Connection, days: i64) -> Result<usize> {
    let cutoff = chrono::TimeDelta::try_days(days)
        .and_then(|idle| chrono::Utc::now().checked_sub_signed(idle))
        .with_context(|| format!("retention of {days} days is out of range"))?
        .to_rfc3339();
    let rows = conn.execute(
        "DELETE FROM users WHERE is_anonymous = 1 AND last_seen_at < ?1",
        params![cutoff],
    )?;
    if rows > 0 {
        tracing::info!(count = rows, days, "purged stale anonymous users");
    }
    Ok(rows)
}
