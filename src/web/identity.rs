//! Cookie-based identity.
//!
//! Every page request resolves to a [`CurrentUser`]:
//! 1. a valid `sq_session` cookie → the registered user behind it
//! 2. else an `sq_anon` cookie naming an existing demo user → that user
//! 3. else a fresh demo user, announced with `Set-Cookie: sq_anon`

use anyhow::Result;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use std::collections::HashMap;

use super::error::AppError;
use crate::auth::sessions::resolve_session;
use crate::auth::users::{create_anonymous_user, get_user, touch_user, User};
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "sq_session";
pub const ANON_COOKIE: &str = "sq_anon";

const ANON_COOKIE_MAX_AGE: i64 = 365 * 24 * 3600;

/// The user a request acts as, stored in request extensions.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    /// Session token when signed in as a registered user.
    pub session_token: Option<String>,
}

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }

    pub fn is_anonymous(&self) -> bool {
        self.user.is_anonymous
    }
}

struct ResolvedIdentity {
    current: CurrentUser,
    new_anonymous: bool,
}

/// Parse all `Cookie` headers into name → value.
pub fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Build a `Set-Cookie` value. `max_age = 0` clears the cookie.
pub fn cookie(name: &str, value: &str, max_age: i64, secure: bool) -> String {
    let mut c = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        c.push_str("; Secure");
    }
    c
}

pub fn anon_cookie(user_id: &str, secure: bool) -> String {
    cookie(ANON_COOKIE, user_id, ANON_COOKIE_MAX_AGE, secure)
}

pub fn session_cookie(token: &str, ttl_days: i64, secure: bool) -> String {
    cookie(SESSION_COOKIE, token, ttl_days.saturating_mul(24 * 3600), secure)
}

pub fn clear_cookie(name: &str, secure: bool) -> String {
    cookie(name, "", 0, secure)
}

fn resolve_identity(
    conn: &Connection,
    session_token: Option<&str>,
    anon_id: Option<&str>,
) -> Result<ResolvedIdentity> {
    if let Some(token) = session_token {
        if let Some(user) = resolve_session(conn, token)? {
            touch_user(conn, &user.id)?;
            return Ok(ResolvedIdentity {
                current: CurrentUser {
                    user,
                    session_token: Some(token.to_string()),
                },
                new_anonymous: false,
            });
        }
    }

    if let Some(id) = anon_id {
        if let Some(user) = get_user(conn, id)?.filter(|u| u.is_anonymous) {
            touch_user(conn, &user.id)?;
            return Ok(ResolvedIdentity {
                current: CurrentUser {
                    user,
                    session_token: None,
                },
                new_anonymous: false,
            });
        }
    }

    let user = create_anonymous_user(conn)?;
    Ok(ResolvedIdentity {
        current: CurrentUser {
            user,
            session_token: None,
        },
        new_anonymous: true,
    })
}

/// Middleware that resolves the request's identity.
pub async fn identity_layer(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let cookies = parse_cookies(req.headers());
    let session = cookies.get(SESSION_COOKIE).cloned();
    let anon = cookies.get(ANON_COOKIE).cloned();

    let resolved = state
        .run_db(move |conn| resolve_identity(conn, session.as_deref(), anon.as_deref()))
        .await;
    let resolved = match resolved {
        Ok(r) => r,
        Err(e) => return AppError::Internal(e).into_response(),
    };

    let new_anon_id = resolved.new_anonymous.then(|| resolved.current.user.id.clone());
    req.extensions_mut().insert(resolved.current);

    let mut response = next.run(req).await;

    if let Some(id) = new_anon_id {
        tracing::debug!(user = %id, "issued anonymous identity");
        let value = anon_cookie(&id, state.config.server.cookie_secure);
        if let Ok(value) = HeaderValue::from_str(&value) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}
