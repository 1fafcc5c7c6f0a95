//! Page handlers for notes, topics, tags and search.

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};
use rusqlite::Connection;
use serde::Deserialize;

use super::error::AppError;
use super::identity::CurrentUser;
use super::render::{self, HomeView};
use crate::notes::points::{
    count_points, create_point, delete_point, get_point, get_point_status, list_points_for_topic,
    list_recent_points, retry_point,
};
use crate::notes::search::search_points;
use crate::notes::tags::{list_points_for_tag, list_tags_with_counts, tags_for_point};
use crate::notes::topics::{
    delete_topic, get_topic, get_topic_overview, list_topic_names, list_topics, normalize_topic_name,
    rename_topic, update_topic_description,
};
use crate::notes::types::{KnowledgePoint, PointStatus, Tag, TopicOverview};
use crate::pipeline;
use crate::state::AppState;

const RECENT_LIMIT: usize = 10;
const SEARCH_LIMIT: usize = 50;

type PointsWithTags = Vec<(KnowledgePoint, Vec<Tag>)>;

fn with_tags(conn: &Connection, points: Vec<KnowledgePoint>) -> Result<PointsWithTags> {
    points
        .into_iter()
        .map(|p| {
            let tags = tags_for_point(conn, &p.id)?;
            Ok((p, tags))
        })
        .collect()
}

fn load_topic_view(
    conn: &Connection,
    user_id: &str,
    topic_id: &str,
) -> Result<Option<(TopicOverview, PointsWithTags)>> {
    let Some(topic) = get_topic_overview(conn, user_id, topic_id)? else {
        return Ok(None);
    };
    let points = with_tags(conn, list_points_for_topic(conn, user_id, topic_id, None)?)?;
    Ok(Some((topic, points)))
}

#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    note: Option<String>,
}

pub async fn home(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<HomeQuery>,
) -> Result<Html<String>, AppError> {
    let uid = current.id().to_string();
    let (recent, topics, pending, count) = state
        .run_db(move |conn| {
            let recent = with_tags(conn, list_recent_points(conn, &uid, RECENT_LIMIT)?)?;
            let topics = list_topics(conn, &uid)?;
            let pending = match query.note {
                Some(id) => get_point_status(conn, &uid, &id)?,
                None => None,
            };
            let count = count_points(conn, &uid)?;
            Ok((recent, topics, pending, count))
        })
        .await?;

    let notes = &state.config.notes;
    let demo_remaining = current
        .is_anonymous()
        .then(|| notes.demo_max_points.saturating_sub(count));

    Ok(Html(render::home_page(&HomeView {
        user: &current.user,
        recent: &recent,
        topics: &topics,
        pending: pending.as_ref(),
        demo_remaining,
        max_note_chars: notes.max_note_chars,
        poll_timeout_secs: notes.poll_timeout_secs,
    })))
}

#[derive(Debug, Deserialize)]
pub struct NoteForm {
    content: String,
}

pub async fn create_note(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Form(form): Form<NoteForm>,
) -> Result<Redirect, AppError> {
    let content = form.content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::BadRequest("笔记内容不能为空".into()));
    }
    let max_chars = state.config.notes.max_note_chars;
    if content.chars().count() > max_chars {
        return Err(AppError::BadRequest(format!("笔记不能超过 {max_chars} 字")));
    }

    let uid = current.id().to_string();
    let demo_limit = current.is_anonymous().then_some(state.config.notes.demo_max_points);
    let created = state
        .run_db(move |conn| {
            if let Some(limit) = demo_limit {
                if count_points(conn, &uid)? >= limit {
                    return Ok(None);
                }
            }
            create_point(conn, &uid, &content).map(Some)
        })
        .await?;

    let Some(point) = created else {
        return Err(AppError::BadRequest(
            "体验模式的笔记数量已达上限，注册后即可继续记录".into(),
        ));
    };

    tracing::info!(id = %point.id, user = %point.user_id, chars = point.content.chars().count(), "note captured");
    pipeline::spawn_analysis(state.clone(), point.user_id.clone(), point.id.clone());

    Ok(Redirect::to(&format!("/?note={}", point.id)))
}

pub async fn note_detail(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    let uid = current.id().to_string();
    let loaded = state
        .run_db(move |conn| {
            let Some(point) = get_point(conn, &uid, &id)? else {
                return Ok(None);
            };
            let tags = tags_for_point(conn, &point.id)?;
            let topic = match &point.topic_id {
                Some(tid) => get_topic(conn, &uid, tid)?,
                None => None,
            };
            Ok(Some((point, tags, topic)))
        })
        .await?;

    let (point, tags, topic) = loaded.ok_or(AppError::NotFound)?;
    Ok(Html(render::note_page(&current.user, &point, &tags, topic.as_ref())))
}

pub async fn retry_note(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    let (uid, pid) = (current.id().to_string(), id.clone());
    let (exists, retried) = state
        .run_db(move |conn| {
            let exists = get_point(conn, &uid, &pid)?.is_some();
            let retried = exists && retry_point(conn, &uid, &pid)?;
            Ok((exists, retried))
        })
        .await?;

    if !exists {
        return Err(AppError::NotFound);
    }
    if !retried {
        return Err(AppError::BadRequest("只有分析失败的笔记可以重新分析".into()));
    }

    tracing::info!(id = %id, "note analysis retried");
    pipeline::spawn_analysis(state.clone(), current.id().to_string(), id.clone());
    Ok(Redirect::to(&format!("/?note={id}")))
}

pub async fn delete_note(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    let uid = current.id().to_string();
    let deleted = state
        .run_db(move |conn| delete_point(conn, &uid, &id))
        .await?
        .ok_or(AppError::NotFound)?;

    // The topic lost a summarized point
    if deleted.status == PointStatus::Completed {
        if let Some(topic_id) = deleted.topic_id {
            pipeline::spawn_summary(state.clone(), current.id().to_string(), topic_id);
        }
    }

    Ok(Redirect::to("/"))
}

pub async fn topics_index(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Html<String>, AppError> {
    let uid = current.id().to_string();
    let topics = state.run_db(move |conn| list_topics(conn, &uid)).await?;
    Ok(Html(render::topics_page(&current.user, &topics)))
}

pub async fn topic_detail(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    let uid = current.id().to_string();
    let (topic, points) = state
        .run_db(move |conn| load_topic_view(conn, &uid, &id))
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Html(render::topic_page(&current.user, &topic, &points, None)))
}

/// Regenerate a summary on demand. Waits for the model so the redirect
/// lands on the fresh text.
pub async fn summarize_topic(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    let (uid, tid) = (current.id().to_string(), id.clone());
    state
        .run_db(move |conn| get_topic(conn, &uid, &tid))
        .await?
        .ok_or(AppError::NotFound)?;

    pipeline::summarize_topic(&state, current.id(), &id)
        .await
        .map_err(|e| {
            tracing::warn!(topic = %id, error = %e, "on-demand summary failed");
            AppError::Upstream(format!("{e:#}"))
        })?;

    Ok(Redirect::to(&format!("/topics/{id}")))
}

#[derive(Debug, Deserialize)]
pub struct RenameForm {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

pub async fn rename_topic_form(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Form(form): Form<RenameForm>,
) -> Result<Response, AppError> {
    let uid = current.id().to_string();
    let tid = id.clone();
    let notice = state
        .run_db(move |conn| {
            let Some(topic) = get_topic(conn, &uid, &tid)? else {
                return Ok(Err(AppError::NotFound));
            };
            let name = form.name.trim();
            if name.is_empty() {
                return Ok(Ok(Some("主题名不能为空")));
            }
            if normalize_topic_name(name) != topic.name
                && list_topic_names(conn, &uid)?.contains(&normalize_topic_name(name))
            {
                return Ok(Ok(Some("已存在同名主题")));
            }
            rename_topic(conn, &uid, &tid, name)?;
            if let Some(description) = &form.description {
                update_topic_description(conn, &uid, &tid, description)?;
            }
            Ok(Ok(None))
        })
        .await??;

    let Some(notice) = notice else {
        return Ok(Redirect::to(&format!("/topics/{id}")).into_response());
    };

    let uid = current.id().to_string();
    let (topic, points) = state
        .run_db(move |conn| load_topic_view(conn, &uid, &id))
        .await?
        .ok_or(AppError::NotFound)?;
    Ok((
        StatusCode::BAD_REQUEST,
        Html(render::topic_page(&current.user, &topic, &points, Some(notice))),
    )
        .into_response())
}

pub async fn delete_topic_form(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    let uid = current.id().to_string();
    let deleted = state.run_db(move |conn| delete_topic(conn, &uid, &id)).await?;
    if !deleted {
        return Err(AppError::NotFound);
    }
    Ok(Redirect::to("/topics"))
}

pub async fn tags_index(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Html<String>, AppError> {
    let uid = current.id().to_string();
    let tags = state
        .run_db(move |conn| list_tags_with_counts(conn, &uid))
        .await?;
    Ok(Html(render::tags_page(&current.user, &tags)))
}

pub async fn tag_detail(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(name): Path<String>,
) -> Result<Html<String>, AppError> {
    let (uid, tag) = (current.id().to_string(), name.clone());
    let points = state
        .run_db(move |conn| {
            let points = list_points_for_tag(conn, &uid, &tag)?;
            with_tags(conn, points)
        })
        .await?;
    if points.is_empty() {
        return Err(AppError::NotFound);
    }
    Ok(Html(render::tag_page(&current.user, &name, &points)))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
}

pub async fn search(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<SearchQuery>,
) -> Result<Html<String>, AppError> {
    let uid = current.id().to_string();
    let q = query.q.clone();
    let results = state
        .run_db(move |conn| {
            let points = search_points(conn, &uid, &q, SEARCH_LIMIT)?;
            with_tags(conn, points)
        })
        .await?;
    tracing::debug!(query = %query.q, hits = results.len(), "search");
    Ok(Html(render::search_page(&current.user, &query.q, &results)))
}
