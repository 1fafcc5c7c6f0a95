//! Background analysis of captured notes.
//!
//! A note is saved as `processing`, then [`spawn_analysis`] classifies it and
//! refreshes its topic's summary. The stored status is the only completion
//! signal: the page poller reads it, nothing here is driven by timers.
//!
//! Outcome rules:
//! - provider error: point `failed` with the error text, no topic assigned
//! - unparseable reply: fallback classification, point `completed`
//! - summary error: logged, previous summary kept, point stays `completed`

use anyhow::{bail, Result};

use crate::llm::parse::{parse_classification, parse_summary};
use crate::llm::prompts::{classification_prompt, summary_prompt, CLASSIFY_SYSTEM, SUMMARY_SYSTEM};
use crate::notes::points::{
    complete_point, count_completed_in_topic, fail_point, get_point, list_points_for_topic,
    list_processing_points,
};
use crate::notes::topics::{get_topic, list_topic_names, set_topic_summary};
use crate::notes::types::PointStatus;
use crate::state::AppState;

/// Classify one point and refresh its topic summary. Returns the final status.
pub async fn analyze_note(state: &AppState, user_id: &str, point_id: &str) -> Result<PointStatus> {
    let (uid, pid) = (user_id.to_string(), point_id.to_string());
    let (point, topics) = state
        .run_db(move |conn| {
            let Some(point) = get_point(conn, &uid, &pid)? else {
                bail!("point not found: {pid}");
            };
            let topics = list_topic_names(conn, &uid)?;
            Ok((point, topics))
        })
        .await?;

    if point.status.is_terminal() {
        tracing::debug!(id = %point.id, status = %point.status, "point already analyzed, skipping");
        return Ok(point.status);
    }

    let prompt = classification_prompt(&point.content, &topics);
    let reply = match state.complete(CLASSIFY_SYSTEM, prompt).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(id = %point.id, provider = state.llm.name(), error = %e, "classification failed");
            let (uid, pid, msg) = (user_id.to_string(), point.id.clone(), format!("{e:#}"));
            state
                .run_db(move |conn| fail_point(conn, &uid, &pid, &msg))
                .await?;
            return Ok(PointStatus::Failed);
        }
    };

    let analysis = parse_classification(&reply, &point.content);
    let fallback = analysis.fallback;
    let (uid, pid) = (user_id.to_string(), point.id.clone());
    let completed = state
        .run_db(move |conn| {
            complete_point(conn, &uid, &pid, &analysis.topic, &analysis.title, &analysis.tags)
        })
        .await?;

    tracing::info!(
        id = %point.id,
        topic = %completed.topic.name,
        tags = completed.tags.len(),
        fallback,
        "note classified"
    );

    if let Err(e) = summarize_topic(state, user_id, &completed.topic.id).await {
        tracing::warn!(topic = %completed.topic.id, error = %e, "summary refresh failed, keeping previous summary");
    }

    Ok(PointStatus::Completed)
}

/// Regenerate a topic's summary from its most recent completed points.
/// A topic without points has its summary cleared. Returns the new summary.
pub async fn summarize_topic(state: &AppState, user_id: &str, topic_id: &str) -> Result<Option<String>> {
    let limit = state.config.notes.summary_max_points;
    let (uid, tid) = (user_id.to_string(), topic_id.to_string());
    let (topic, points, count) = state
        .run_db(move |conn| {
            let Some(topic) = get_topic(conn, &uid, &tid)? else {
                bail!("topic not found: {tid}");
            };
            let points = list_points_for_topic(conn, &uid, &tid, Some(limit))?;
            let count = count_completed_in_topic(conn, &tid)?;
            Ok((topic, points, count))
        })
        .await?;

    if points.is_empty() {
        let (uid, tid) = (user_id.to_string(), topic.id.clone());
        state
            .run_db(move |conn| set_topic_summary(conn, &uid, &tid, None, 0))
            .await?;
        return Ok(None);
    }

    let reply = state
        .complete(SUMMARY_SYSTEM, summary_prompt(&topic.name, &points))
        .await?;
    let Some(summary) = parse_summary(&reply) else {
        bail!("LLM returned an empty summary");
    };

    let (uid, tid, text) = (user_id.to_string(), topic.id.clone(), summary.clone());
    state
        .run_db(move |conn| set_topic_summary(conn, &uid, &tid, Some(&text), count))
        .await?;

    tracing::info!(topic = %topic.name, points = count, "topic summary updated");
    Ok(Some(summary))
}

/// Analyze a point on a detached task.
pub fn spawn_analysis(state: AppState, user_id: String, point_id: String) {
    tokio::spawn(async move {
        if let Err(e) = analyze_note(&state, &user_id, &point_id).await {
            tracing::error!(id = %point_id, error = %e, "note analysis aborted");
            // Leave no point stuck in processing
            let (pid, msg) = (point_id.clone(), format!("{e:#}"));
            if let Err(e) = state
                .run_db(move |conn| fail_point(conn, &user_id, &pid, &msg))
                .await
            {
                tracing::warn!(id = %point_id, error = %e, "could not mark aborted analysis as failed");
            }
        }
    });
}

/// Re-queue points left in `processing` by a previous run. Returns how many.
pub async fn resume_pending(state: &AppState) -> Result<usize> {
    let pending = state.run_db(|conn| list_processing_points(conn)).await?;
    let n = pending.len();
    for point in pending {
        spawn_analysis(state.clone(), point.user_id, point.id);
    }
    if n > 0 {
        tracing::info!(count = n, "resumed unfinished note analysis");
    }
    Ok(n)
}

/// Refresh a topic summary on a detached task.
pub fn spawn_summary(state: AppState, user_id: String, topic_id: String) {
    tokio::spawn(async move {
        if let Err(e) = summarize_topic(&state, &user_id, &topic_id).await {
            tracing::warn!(topic = %topic_id, error = %e, "background summary refresh failed");
        }
    });
}
