//! Keyword search over a user's notes.
//!
//! Uses the trigram FTS5 index ranked by BM25. The trigram tokenizer cannot
//! match terms shorter than three characters, so such queries fall back to a
//! `LIKE` scan of the user's notes.

use anyhow::Result;
use rusqlite::{params, Connection};

use super::points::{row_to_point, POINT_COLUMNS};
use super::types::KnowledgePoint;

const TRIGRAM_MIN_CHARS: usize = 3;

/// Quote each whitespace-separated term so user input is never parsed as FTS5 syntax.
/// Terms are implicitly AND-ed.
pub fn fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

/// Search a user's notes. A blank query returns nothing.
pub fn search_points(
    conn: &Connection,
    user_id: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<KnowledgePoint>> {
    let Some(match_expr) = fts_query(query) else {
        return Ok(Vec::new());
    };

    let has_short_term = query
        .split_whitespace()
        .any(|t| t.chars().count() < TRIGRAM_MIN_CHARS);
    if has_short_term {
        return like_search(conn, user_id, query, limit);
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT {POINT_COLUMNS} FROM knowledge_points_fts f \
         JOIN knowledge_points p ON p.rowid = f.rowid \
         WHERE knowledge_points_fts MATCH ?1 AND p.user_id = ?2 \
         ORDER BY f.rank LIMIT ?3"
    ))?;
    let points = stmt
        .query_map(params![match_expr, user_id, limit as i64], row_to_point)?
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(query = %query, hits = points.len(), "fts search");
    Ok(points)
}

fn like_search(
    conn: &Connection,
    user_id: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<KnowledgePoint>> {
    // Every term must appear; escape LIKE wildcards in user input.
    let patterns: Vec<String> = query
        .split_whitespace()
        .map(|t| {
            let escaped = t.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
            format!("%{escaped}%")
        })
        .collect();

    let mut sql = format!("SELECT {POINT_COLUMNS} FROM knowledge_points p WHERE p.user_id = ?1");
    for i in 0..patterns.len() {
        sql.push_str(&format!(" AND p.content LIKE ?{} ESCAPE '\\'", i + 2));
    }
    sql.push_str(&format!(" ORDER BY p.created_at DESC LIMIT {limit}"));

    let mut values: Vec<&dyn rusqlite::ToSql> = vec![&user_id];
    for p in &patterns {
        values.push(p);
    }

    let mut stmt = conn.prepare(&sql)?;
    let points = stmt
        .query_map(values.as_slice(), row_to_point)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(points)
}
