//! Knowledge point write and read paths.
//!
//! A point is created in `processing`, then [`complete_point`] or [`fail_point`]
//! records the analysis outcome. Creation and deletion keep the external-content
//! FTS5 index in sync inside the same transaction.

use anyhow::{bail, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::tags::{delete_orphan_tags, set_point_tags, upsert_tags};
use super::topics::{find_or_create_topic, touch_topic};
use super::types::{KnowledgePoint, PointStatus, Tag, Topic};
use crate::db::now;

pub(crate) const POINT_COLUMNS: &str =
    "p.id, p.user_id, p.topic_id, p.title, p.content, p.status, p.error, p.created_at, p.updated_at";

const MAX_TITLE_CHARS: usize = 40;

pub(crate) fn row_to_point(row: &Row<'_>) -> rusqlite::Result<KnowledgePoint> {
    let status: String = row.get(5)?;
    let status = status.parse::<PointStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(KnowledgePoint {
        id: row.get(0)?,
        user_id: row.get(1)?,
        topic_id: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        status,
        error: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Polling view of a point, returned by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PointStatusInfo {
    pub id: String,
    pub status: PointStatus,
    pub topic_id: Option<String>,
    pub error: Option<String>,
}

/// Outcome of a successful classification write.
#[derive(Debug, Clone)]
pub struct CompletedPoint {
    pub topic: Topic,
    pub tags: Vec<Tag>,
}

/// Title from the first non-blank line, cut at [`MAX_TITLE_CHARS`] characters.
pub fn derive_title(content: &str) -> String {
    let line = content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    if line.chars().count() > MAX_TITLE_CHARS {
        let mut title: String = line.chars().take(MAX_TITLE_CHARS).collect();
        title.push('…');
        title
    } else {
        line.to_string()
    }
}

/// Save a new note in `processing` state.
pub fn create_point(conn: &mut Connection, user_id: &str, content: &str) -> Result<KnowledgePoint> {
    let content = content.trim();
    if content.is_empty() {
        bail!("note content must not be empty");
    }

    let tx = conn.transaction()?;
    let id = uuid::Uuid::now_v7().to_string();
    let title = derive_title(content);
    let now = now();

    tx.execute(
        "INSERT INTO knowledge_points (id, user_id, title, content, status, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, 'processing', ?5, ?5)",
        params![id, user_id, title, content, now],
    )?;
    let rowid = tx.last_insert_rowid();

    tx.execute(
        "INSERT INTO knowledge_points_fts (rowid, content, id) VALUES (?1, ?2, ?3)",
        params![rowid, content, id],
    )?;

    tx.commit()?;

    tracing::debug!(id = %id, user = %user_id, chars = content.chars().count(), "point created");

    Ok(KnowledgePoint {
        id,
        user_id: user_id.to_string(),
        topic_id: None,
        title,
        content: content.to_string(),
        status: PointStatus::Processing,
        error: None,
        created_at: now.clone(),
        updated_at: now,
    })
}

pub fn get_point(conn: &Connection, user_id: &str, point_id: &str) -> Result<Option<KnowledgePoint>> {
    let point = conn
        .query_row(
            &format!("SELECT {POINT_COLUMNS} FROM knowledge_points p WHERE p.id = ?1 AND p.user_id = ?2"),
            params![point_id, user_id],
            row_to_point,
        )
        .optional()?;
    Ok(point)
}

pub fn get_point_status(
    conn: &Connection,
    user_id: &str,
    point_id: &str,
) -> Result<Option<PointStatusInfo>> {
    Ok(get_point(conn, user_id, point_id)?.map(|p| PointStatusInfo {
        id: p.id,
        status: p.status,
        topic_id: p.topic_id,
        error: p.error,
    }))
}

pub fn list_recent_points(conn: &Connection, user_id: &str, limit: usize) -> Result<Vec<KnowledgePoint>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {POINT_COLUMNS} FROM knowledge_points p WHERE p.user_id = ?1 \
         ORDER BY p.created_at DESC, p.id DESC LIMIT ?2"
    ))?;
    let points = stmt
        .query_map(params![user_id, limit as i64], row_to_point)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(points)
}

/// Completed points of a topic, newest first. `limit = None` returns all of them.
pub fn list_points_for_topic(
    conn: &Connection,
    user_id: &str,
    topic_id: &str,
    limit: Option<usize>,
) -> Result<Vec<KnowledgePoint>> {
    let limit = limit.map_or(-1, |l| l as i64);
    let mut stmt = conn.prepare(&format!(
        "SELECT {POINT_COLUMNS} FROM knowledge_points p \
         WHERE p.user_id = ?1 AND p.topic_id = ?2 AND p.status = 'completed' \
         ORDER BY p.created_at DESC, p.id DESC LIMIT ?3"
    ))?;
    let points = stmt
        .query_map(params![user_id, topic_id, limit], row_to_point)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(points)
}

/// Points of every user still waiting for analysis, oldest first.
pub fn list_processing_points(conn: &Connection) -> Result<Vec<KnowledgePoint>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {POINT_COLUMNS} FROM knowledge_points p WHERE p.status = 'processing' \
         ORDER BY p.created_at ASC"
    ))?;
    let points = stmt
        .query_map([], row_to_point)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(points)
}

/// Number of points a user owns, in any state.
pub fn count_points(conn: &Connection, user_id: &str) -> Result<usize> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM knowledge_points WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(n as usize)
}

pub fn count_completed_in_topic(conn: &Connection, topic_id: &str) -> Result<u32> {
    let n: u32 = conn.query_row(
        "SELECT COUNT(*) FROM knowledge_points WHERE topic_id = ?1 AND status = 'completed'",
        params![topic_id],
        |row| row.get(0),
    )?;
    Ok(n)
}

/// Record a successful classification: topic, title and tags, all in one transaction.
pub fn complete_point(
    conn: &mut Connection,
    user_id: &str,
    point_id: &str,
    topic_name: &str,
    title: &str,
    tag_names: &[String],
) -> Result<CompletedPoint> {
    let tx = conn.transaction()?;

    let exists: bool = tx.query_row(
        "SELECT COUNT(*) > 0 FROM knowledge_points WHERE id = ?1 AND user_id = ?2",
        params![point_id, user_id],
        |row| row.get(0),
    )?;
    if !exists {
        bail!("point not found: {point_id}");
    }

    let topic = find_or_create_topic(&tx, user_id, topic_name)?;
    let tags = upsert_tags(&tx, user_id, tag_names)?;
    set_point_tags(&tx, point_id, &tags)?;

    tx.execute(
        "UPDATE knowledge_points SET topic_id = ?1, title = ?2, status = 'completed', error = NULL, updated_at = ?3 \
         WHERE id = ?4",
        params![topic.id, title, now(), point_id],
    )?;
    touch_topic(&tx, &topic.id)?;

    tx.commit()?;

    Ok(CompletedPoint { topic, tags })
}

/// Mark a point as failed with the provider error.
pub fn fail_point(conn: &Connection, user_id: &str, point_id: &str, error: &str) -> Result<()> {
    let rows = conn.execute(
        "UPDATE knowledge_points SET status = 'failed', error = ?1, updated_at = ?2 \
         WHERE id = ?3 AND user_id = ?4",
        params![error, now(), point_id, user_id],
    )?;
    if rows == 0 {
        bail!("point not found: {point_id}");
    }
    Ok(())
}

/// Put a failed point back into `processing`. Returns `false` if the point
/// does not exist or is not in `failed` state.
pub fn retry_point(conn: &Connection, user_id: &str, point_id: &str) -> Result<bool> {
    let rows = conn.execute(
        "UPDATE knowledge_points SET status = 'processing', error = NULL, updated_at = ?1 \
         WHERE id = ?2 AND user_id = ?3 AND status = 'failed'",
        params![now(), point_id, user_id],
    )?;
    Ok(rows > 0)
}

/// Delete a point and its tag links. Returns the deleted point.
pub fn delete_point(
    conn: &mut Connection,
    user_id: &str,
    point_id: &str,
) -> Result<Option<KnowledgePoint>> {
    let tx = conn.transaction()?;

    let Some(point) = get_point(&tx, user_id, point_id)? else {
        return Ok(None);
    };
    // The AFTER DELETE trigger removes the FTS entry
    tx.execute("DELETE FROM knowledge_points WHERE id = ?1", params![point_id])?;
    delete_orphan_tags(&tx, user_id)?;

    tx.commit()?;

    tracing::info!(id = %point_id, user = %user_id, "point deleted");
    Ok(Some(point))
}
