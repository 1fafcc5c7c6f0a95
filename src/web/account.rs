//! Registration, login and logout.
//!
//! Registering from a demo identity moves the demo user's notes into the new
//! account (see [`register_with_binding`]). Logging in never merges data.

use axum::{
    extract::State,
    http::{header::SET_COOKIE, StatusCode},
    response::{AppendHeaders, Html, IntoResponse, Response},
    Extension, Form,
};
use serde::Deserialize;

use super::error::AppError;
use super::identity::{clear_cookie, session_cookie, CurrentUser, ANON_COOKIE, SESSION_COOKIE};
use super::render;
use crate::auth::sessions::{create_session, delete_session};
use crate::auth::users::authenticate;
use crate::auth::{register_with_binding, AuthError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AccountForm {
    username: String,
    password: String,
}

fn form_error(current: &CurrentUser, action: &str, error: &AuthError, username: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Html(render::account_page(&current.user, action, Some(&error.to_string()), username)),
    )
        .into_response()
}

pub async fn register_page(Extension(current): Extension<CurrentUser>) -> Html<String> {
    Html(render::account_page(&current.user, "/register", None, ""))
}

pub async fn register(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Form(form): Form<AccountForm>,
) -> Result<Response, AppError> {
    let username = form.username.trim().to_string();
    let anon = current.is_anonymous().then(|| current.id().to_string());
    let previous_session = current.session_token.clone();
    let ttl = state.config.server.session_ttl_days;

    let name = username.clone();
    let outcome = state
        .run_db(move |conn| match register_with_binding(conn, anon.as_deref(), &name, &form.password) {
            Ok((user, report)) => {
                if let Some(token) = previous_session {
                    delete_session(conn, &token)?;
                }
                let session = create_session(conn, &user.id, ttl)?;
                Ok(Ok((user, report, session)))
            }
            Err(e) if e.is_user_facing() => Ok(Err(e)),
            Err(e) => Err(e.into()),
        })
        .await?;

    let (user, report, session) = match outcome {
        Ok(registered) => registered,
        Err(e) => return Ok(form_error(&current, "/register", &e, &username)),
    };

    match &report {
        Some(r) => tracing::info!(
            user = %user.id,
            from = %current.id(),
            topics = r.topics_moved + r.topics_merged,
            points = r.points_moved,
            tags = r.tags_moved + r.tags_merged,
            "registered and bound demo data"
        ),
        None => tracing::info!(user = %user.id, "registered"),
    }

    let secure = state.config.server.cookie_secure;
    Ok((
        AppendHeaders([
            (SET_COOKIE, session_cookie(&session.token, ttl, secure)),
            (SET_COOKIE, clear_cookie(ANON_COOKIE, secure)),
        ]),
        axum::response::Redirect::to("/"),
    )
        .into_response())
}

pub async fn login_page(Extension(current): Extension<CurrentUser>) -> Html<String> {
    Html(render::account_page(&current.user, "/login", None, ""))
}

pub async fn login(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Form(form): Form<AccountForm>,
) -> Result<Response, AppError> {
    let username = form.username.trim().to_string();
    let previous_session = current.session_token.clone();
    let ttl = state.config.server.session_ttl_days;

    let name = username.clone();
    let session = state
        .run_db(move |conn| {
            let Some(user) = authenticate(conn, &name, &form.password)? else {
                return Ok(None);
            };
            if let Some(token) = previous_session {
                delete_session(conn, &token)?;
            }
            create_session(conn, &user.id, ttl).map(Some)
        })
        .await?;

    let Some(session) = session else {
        tracing::debug!(username = %username, "login rejected");
        return Ok(form_error(&current, "/login", &AuthError::InvalidCredentials, &username));
    };

    tracing::info!(user = %session.user_id, "logged in");
    let secure = state.config.server.cookie_secure;
    Ok((
        AppendHeaders([(SET_COOKIE, session_cookie(&session.token, ttl, secure))]),
        axum::response::Redirect::to("/"),
    )
        .into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    if let Some(token) = current.session_token.clone() {
        state.run_db(move |conn| delete_session(conn, &token)).await?;
        tracing::info!(user = %current.id(), "logged out");
    }

    let secure = state.config.server.cookie_secure;
    Ok((
        AppendHeaders([(SET_COOKIE, clear_cookie(SESSION_COOKIE, secure))]),
        axum::response::Redirect::to("/"),
    )
        .into_response())
}
