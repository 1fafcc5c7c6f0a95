use anyhow::Result;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::HashMap;

/// Response from note_stats.
#[derive(Debug, Serialize)]
pub struct NoteStats {
    pub total_users: u64,
    pub anonymous_users: u64,
    pub total_topics: u64,
    pub total_points: u64,
    pub total_tags: u64,
    pub by_status: HashMap<String, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_point: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_point: Option<String>,
}

/// Compute store statistics. With `user_id`, counts cover only that user's data
/// and the user counts are zero.
pub fn note_stats(conn: &Connection, user_id: Option<&str>) -> Result<NoteStats> {
    let (total_users, anonymous_users) = match user_id {
        Some(_) => (0, 0),
        None => conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(is_anonymous), 0) FROM users",
            [],
            |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64)),
        )?,
    };

    let total_topics = count_owned(conn, "topics", user_id)?;
    let total_points = count_owned(conn, "knowledge_points", user_id)?;
    let total_tags = count_owned(conn, "tags", user_id)?;
    let by_status = count_by_status(conn, user_id)?;

    let (oldest_point, newest_point) = conn.query_row(
        "SELECT MIN(created_at), MAX(created_at) FROM knowledge_points \
         WHERE ?1 IS NULL OR user_id = ?1",
        params![user_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(NoteStats {
        total_users,
        anonymous_users,
        total_topics,
        total_points,
        total_tags,
        by_status,
        oldest_point,
        newest_point,
    })
}

fn count_owned(conn: &Connection, table: &str, user_id: Option<&str>) -> Result<u64> {
    let n: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {table} WHERE ?1 IS NULL OR user_id = ?1"),
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}

fn count_by_status(conn: &Connection, user_id: Option<&str>) -> Result<HashMap<String, u64>> {
    let mut stmt = conn.prepare(
        "SELECT status, COUNT(*) FROM knowledge_points \
         WHERE ?1 IS NULL OR user_id = ?1 GROUP BY status",
    )?;
    let mut map: HashMap<String, u64> = ["processing", "completed", "failed"]
        .iter()
        .map(|s| (s.to_string(), 0))
        .collect();
    let rows = stmt.query_map(params![user_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (status, count) = row?;
        map.insert(status, count as u64);
    }
    Ok(map)
}
