//! One-time transfer of an anonymous (demo) user's data to a newly
//! registered account.
//!
//! Topics and tags are unique per user by name, so rows that collide with
//! one the target already owns are merged into it rather than moved.

use anyhow::Result;
use rusqlite::{params, Connection};
use serde::Serialize;

#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct BindingReport {
    pub topics_moved: usize,
    pub topics_merged: usize,
    pub points_moved: usize,
    pub tags_moved: usize,
    pub tags_merged: usize,
}

/// Move everything `from_user` owns to `to_user`.
///
/// Runs on the caller's connection; callers wrap it in a transaction together
/// with account creation.
pub fn bind_anonymous_data(conn: &Connection, from_user: &str, to_user: &str) -> Result<BindingReport> {
    let mut report = BindingReport::default();

    // Topics: merge name collisions, move the rest.
    let collisions: Vec<(String, String)> = {
        let mut stmt = conn.prepare(
            "SELECT src.id, dst.id FROM topics src \
             JOIN topics dst ON dst.name = src.name AND dst.user_id = ?2 \
             WHERE src.user_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![from_user, to_user], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };
    for (src, dst) in &collisions {
        conn.execute(
            "UPDATE knowledge_points SET topic_id = ?1 WHERE topic_id = ?2",
            params![dst, src],
        )?;
        conn.execute("DELETE FROM topics WHERE id = ?1", params![src])?;
        // a zero count marks the merged summary stale
        conn.execute(
            "UPDATE topics SET summary_point_count = 0 WHERE id = ?1",
            params![dst],
        )?;
    }
    report.topics_merged = collisions.len();
    report.topics_moved = conn.execute(
        "UPDATE topics SET user_id = ?1 WHERE user_id = ?2",
        params![to_user, from_user],
    )?;

    // Tags: same approach; links are re-pointed before the duplicate is dropped.
    let tag_collisions: Vec<(i64, i64)> = {
        let mut stmt = conn.prepare(
            "SELECT src.id, MIN(dst.id) FROM tags src \
             JOIN tags dst ON dst.name = src.name COLLATE NOCASE AND dst.user_id = ?2 \
             WHERE src.user_id = ?1 GROUP BY src.id",
        )?;
        let rows = stmt
            .query_map(params![from_user, to_user], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };
    for (src, dst) in &tag_collisions {
        conn.execute(
            "UPDATE OR IGNORE knowledge_point_tags SET tag_id = ?1 WHERE tag_id = ?2",
            params![dst, src],
        )?;
        conn.execute("DELETE FROM tags WHERE id = ?1", params![src])?;
    }
    report.tags_merged = tag_collisions.len();
    report.tags_moved = conn.execute(
        "UPDATE tags SET user_id = ?1 WHERE user_id = ?2",
        params![to_user, from_user],
    )?;

    report.points_moved = conn.execute(
        "UPDATE knowledge_points SET user_id = ?1 WHERE user_id = ?2",
        params![to_user, from_user],
    )?;

    tracing::info!(
        from = %from_user,
        to = %to_user,
        points = report.points_moved,
        topics = report.topics_moved,
        merged_topics = report.topics_merged,
        "anonymous data bound to account"
    );

    Ok(report)
}
