//! Topic CRUD. Every query is scoped by `user_id`.

use anyhow::{bail, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::types::{Topic, TopicOverview, UNCATEGORIZED};
use crate::db::now;

const TOPIC_COLUMNS: &str = "t.id, t.user_id, t.name, t.description, t.summary, t.summary_updated_at, \
                             t.summary_point_count, t.created_at, t.updated_at";

/// Completed-point count for the topic aliased `t`.
const POINT_COUNT_SQL: &str = "(SELECT COUNT(*) FROM knowledge_points p \
                               WHERE p.topic_id = t.id AND p.status = 'completed')";

const MAX_TOPIC_NAME_CHARS: usize = 50;

fn row_to_topic(row: &Row<'_>) -> rusqlite::Result<Topic> {
    Ok(Topic {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        summary: row.get(4)?,
        summary_updated_at: row.get(5)?,
        summary_point_count: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn row_to_overview(row: &Row<'_>) -> rusqlite::Result<TopicOverview> {
    Ok(TopicOverview {
        topic: row_to_topic(row)?,
        point_count: row.get(9)?,
    })
}

/// Trim and bound a topic name. Blank names map to [`UNCATEGORIZED`].
pub fn normalize_topic_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return UNCATEGORIZED.to_string();
    }
    trimmed.chars().take(MAX_TOPIC_NAME_CHARS).collect()
}

/// Return the user's topic with this name, creating it if needed.
pub fn find_or_create_topic(conn: &Connection, user_id: &str, name: &str) -> Result<Topic> {
    let name = normalize_topic_name(name);
    let now = now();
    let id = uuid::Uuid::now_v7().to_string();

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO topics (id, user_id, name, description, created_at, updated_at) \
         VALUES (?1, ?2, ?3, '', ?4, ?4)",
        params![id, user_id, name, now],
    )?;
    if inserted > 0 {
        tracing::debug!(topic = %name, user = %user_id, "topic created");
    }

    let topic = conn.query_row(
        &format!("SELECT {TOPIC_COLUMNS} FROM topics t WHERE t.user_id = ?1 AND t.name = ?2"),
        params![user_id, name],
        row_to_topic,
    )?;
    Ok(topic)
}

pub fn get_topic(conn: &Connection, user_id: &str, topic_id: &str) -> Result<Option<Topic>> {
    let topic = conn
        .query_row(
            &format!("SELECT {TOPIC_COLUMNS} FROM topics t WHERE t.id = ?1 AND t.user_id = ?2"),
            params![topic_id, user_id],
            row_to_topic,
        )
        .optional()?;
    Ok(topic)
}

pub fn get_topic_overview(
    conn: &Connection,
    user_id: &str,
    topic_id: &str,
) -> Result<Option<TopicOverview>> {
    let overview = conn
        .query_row(
            &format!(
                "SELECT {TOPIC_COLUMNS}, {POINT_COUNT_SQL} FROM topics t WHERE t.id = ?1 AND t.user_id = ?2"
            ),
            params![topic_id, user_id],
            row_to_overview,
        )
        .optional()?;
    Ok(overview)
}

/// All of a user's topics, most recently active first.
pub fn list_topics(conn: &Connection, user_id: &str) -> Result<Vec<TopicOverview>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TOPIC_COLUMNS}, {POINT_COUNT_SQL} FROM topics t \
         WHERE t.user_id = ?1 ORDER BY t.updated_at DESC, t.name ASC"
    ))?;
    let topics = stmt
        .query_map(params![user_id], row_to_overview)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(topics)
}

/// Topics of every user, for operator maintenance.
pub fn list_all_topics(conn: &Connection) -> Result<Vec<TopicOverview>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TOPIC_COLUMNS}, {POINT_COUNT_SQL} FROM topics t ORDER BY t.user_id, t.name"
    ))?;
    let topics = stmt
        .query_map([], row_to_overview)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(topics)
}

/// Topic names only, used to steer the classifier toward existing topics.
pub fn list_topic_names(conn: &Connection, user_id: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT name FROM topics WHERE user_id = ?1 ORDER BY updated_at DESC")?;
    let names = stmt
        .query_map(params![user_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}

pub fn rename_topic(conn: &Connection, user_id: &str, topic_id: &str, new_name: &str) -> Result<()> {
    let new_name = new_name.trim();
    if new_name.is_empty() {
        bail!("topic name must not be empty");
    }
    let new_name = normalize_topic_name(new_name);

    let taken: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM topics WHERE user_id = ?1 AND name = ?2 AND id != ?3",
        params![user_id, new_name, topic_id],
        |row| row.get(0),
    )?;
    if taken {
        bail!("topic already exists: {new_name}");
    }

    let rows = conn.execute(
        "UPDATE topics SET name = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
        params![new_name, now(), topic_id, user_id],
    )?;
    if rows == 0 {
        bail!("topic not found: {topic_id}");
    }
    Ok(())
}

pub fn update_topic_description(
    conn: &Connection,
    user_id: &str,
    topic_id: &str,
    description: &str,
) -> Result<()> {
    let rows = conn.execute(
        "UPDATE topics SET description = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
        params![description.trim(), now(), topic_id, user_id],
    )?;
    if rows == 0 {
        bail!("topic not found: {topic_id}");
    }
    Ok(())
}

/// Store a freshly generated summary. `None` clears it.
pub fn set_topic_summary(
    conn: &Connection,
    user_id: &str,
    topic_id: &str,
    summary: Option<&str>,
    point_count: u32,
) -> Result<()> {
    let now = now();
    let rows = conn.execute(
        "UPDATE topics SET summary = ?1, summary_updated_at = ?2, summary_point_count = ?3, updated_at = ?2 \
         WHERE id = ?4 AND user_id = ?5",
        params![summary, now, point_count, topic_id, user_id],
    )?;
    if rows == 0 {
        bail!("topic not found: {topic_id}");
    }
    Ok(())
}

/// Bump a topic's activity timestamp so it sorts first.
pub fn touch_topic(conn: &Connection, topic_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE topics SET updated_at = ?1 WHERE id = ?2",
        params![now(), topic_id],
    )?;
    Ok(())
}

/// Delete a topic. Its points survive with `topic_id = NULL`.
pub fn delete_topic(conn: &Connection, user_id: &str, topic_id: &str) -> Result<bool> {
    let rows = conn.execute(
        "DELETE FROM topics WHERE id = ?1 AND user_id = ?2",
        params![topic_id, user_id],
    )?;
    if rows > 0 {
        tracing::info!(topic = %topic_id, user = %user_id, "topic deleted");
    }
    Ok(rows > 0)
}
