use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::users::{get_user, User};
use crate::db::now;

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub expires_at: String,
}

/// Open a session for a registered user. The token is a random UUID v4.
pub fn create_session(conn: &Connection, user_id: &str, ttl_days: i64) -> Result<Session> {
    let token = uuid::Uuid::new_v4().simple().to_string();
    let expires_at = chrono::TimeDelta::try_days(ttl_days)
        .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
        .with_context(|| format!("session lifetime of {ttl_days} days is out of range"))?
        .to_rfc3339();
    conn.execute(
        "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![token, user_id, now(), expires_at],
    )?;
    Ok(Session {
        token,
        user_id: user_id.to_string(),
        expires_at,
    })
}

/// Look up the user behind a session token. Expired sessions are deleted on sight.
pub fn resolve_session(conn: &Connection, token: &str) -> Result<Option<User>> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT user_id, expires_at FROM sessions WHERE token = ?1",
            params![token],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((user_id, expires_at)) = row else {
        return Ok(None);
    };

    let expired = chrono::DateTime::parse_from_rfc3339(&expires_at)
        .map(|t| t < chrono::Utc::now())
        .unwrap_or(true);
    if expired {
        delete_session(conn, token)?;
        tracing::debug!(user = %user_id, "expired session removed");
        return Ok(None);
    }

    get_user(conn, &user_id)
}

pub fn delete_session(conn: &Connection, token: &str) -> Result<()> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

pub fn delete_expired_sessions(conn: &Connection) -> Result<usize> {
    let rows = conn.execute(
        "DELETE FROM sessions WHERE expires_at < ?1",
        params![now()],
    )?;
    Ok(rows)
}
