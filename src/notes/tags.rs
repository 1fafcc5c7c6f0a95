//! Tags and their links to knowledge points.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;

use super::points::{row_to_point, POINT_COLUMNS};
use super::types::{KnowledgePoint, Tag, TagCount};

pub const MAX_TAGS_PER_POINT: usize = 8;
const MAX_TAG_CHARS: usize = 20;

/// Clean up tag names from user or LLM input.
///
/// Trims whitespace and a leading `#`, drops blanks, dedups case-insensitively
/// (first spelling wins) and keeps at most [`MAX_TAGS_PER_POINT`].
pub fn normalize_tags<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tags = Vec::new();

    for raw in names {
        let name: String = raw
            .as_ref()
            .trim()
            .trim_start_matches('#')
            .trim()
            .chars()
            .take(MAX_TAG_CHARS)
            .collect();
        if name.is_empty() {
            continue;
        }
        if seen.insert(name.to_lowercase()) {
            tags.push(name);
        }
        if tags.len() == MAX_TAGS_PER_POINT {
            break;
        }
    }

    tags
}

/// Ensure each (already normalized) tag exists for the user and return them in input order.
///
/// Names match existing tags case-insensitively; the stored spelling wins.
pub fn upsert_tags(conn: &Connection, user_id: &str, names: &[String]) -> Result<Vec<Tag>> {
    let mut tags = Vec::with_capacity(names.len());
    for name in names {
        let existing = conn
            .query_row(
                "SELECT id, name FROM tags WHERE user_id = ?1 AND name = ?2 COLLATE NOCASE \
                 ORDER BY id LIMIT 1",
                params![user_id, name],
                |row| {
                    Ok(Tag {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        let tag = match existing {
            Some(tag) => tag,
            None => {
                conn.execute(
                    "INSERT INTO tags (user_id, name) VALUES (?1, ?2)",
                    params![user_id, name],
                )?;
                Tag {
                    id: conn.last_insert_rowid(),
                    name: name.clone(),
                }
            }
        };
        if !tags.iter().any(|t: &Tag| t.id == tag.id) {
            tags.push(tag);
        }
    }
    Ok(tags)
}

/// Replace all tag links of a point.
pub fn set_point_tags(conn: &Connection, point_id: &str, tags: &[Tag]) -> Result<()> {
    conn.execute(
        "DELETE FROM knowledge_point_tags WHERE point_id = ?1",
        params![point_id],
    )?;
    for tag in tags {
        conn.execute(
            "INSERT OR IGNORE INTO knowledge_point_tags (point_id, tag_id) VALUES (?1, ?2)",
            params![point_id, tag.id],
        )?;
    }
    Ok(())
}

pub fn tags_for_point(conn: &Connection, point_id: &str) -> Result<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name FROM tags t \
         JOIN knowledge_point_tags kt ON kt.tag_id = t.id \
         WHERE kt.point_id = ?1 ORDER BY t.name",
    )?;
    let tags = stmt
        .query_map(params![point_id], |row| {
            Ok(Tag {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

/// All of a user's tags with how many points carry each, most used first.
pub fn list_tags_with_counts(conn: &Connection, user_id: &str) -> Result<Vec<TagCount>> {
    let mut stmt = conn.prepare(
        "SELECT t.name, COUNT(kt.point_id) AS n FROM tags t \
         LEFT JOIN knowledge_point_tags kt ON kt.tag_id = t.id \
         WHERE t.user_id = ?1 GROUP BY t.id HAVING n > 0 ORDER BY n DESC, t.name ASC",
    )?;
    let tags = stmt
        .query_map(params![user_id], |row| {
            Ok(TagCount {
                name: row.get(0)?,
                point_count: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

pub fn list_points_for_tag(
    conn: &Connection,
    user_id: &str,
    tag_name: &str,
) -> Result<Vec<KnowledgePoint>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {POINT_COLUMNS} FROM knowledge_points p \
         JOIN knowledge_point_tags kt ON kt.point_id = p.id \
         JOIN tags t ON t.id = kt.tag_id \
         WHERE t.user_id = ?1 AND t.name = ?2 COLLATE NOCASE AND p.user_id = ?1 \
         ORDER BY p.created_at DESC"
    ))?;
    let points = stmt
        .query_map(params![user_id, tag_name], row_to_point)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(points)
}

/// Remove the user's tags that no point references any more.
pub fn delete_orphan_tags(conn: &Connection, user_id: &str) -> Result<usize> {
    let rows = conn.execute(
        "DELETE FROM tags WHERE user_id = ?1 \
         AND id NOT IN (SELECT DISTINCT tag_id FROM knowledge_point_tags)",
        params![user_id],
    )?;
    Ok(rows)
}
