//! JSON endpoints: note status for the page poller, and a health probe.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};

use super::identity::CurrentUser;
use crate::notes::points::get_point_status;
use crate::state::AppState;

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// `GET /api/notes/{id}/status`: read the stored processing status.
pub async fn note_status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Response {
    let uid = current.id().to_string();
    match state.run_db(move |conn| get_point_status(conn, &uid, &id)).await {
        Ok(Some(status)) => Json(status).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "note not found"),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "status lookup failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

pub async fn health(State(state): State<AppState>) -> Response {
    let db_ok = state
        .run_db(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
        .is_ok();

    let (status, label) = if db_ok {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        status,
        Json(serde_json::json!({
            "status": label,
            "version": env!("CARGO_PKG_VERSION"),
            "llm": state.llm.name(),
        })),
    )
        .into_response()
}
