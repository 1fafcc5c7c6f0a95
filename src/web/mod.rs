//! HTTP surface: server-rendered pages, the status API and the server loop.
//!
//! Page and API routes sit behind [`identity::identity_layer`], so every
//! handler can extract a [`identity::CurrentUser`]. `/health` stays outside
//! it and never creates demo users.

pub mod account;
pub mod api;
pub mod error;
pub mod identity;
pub mod pages;
pub mod render;

use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::SquirrelConfig;
use crate::pipeline;
use crate::state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let app: Router<AppState> = Router::new()
        .route("/", get(pages::home))
        .route("/notes", post(pages::create_note))
        .route("/notes/{id}", get(pages::note_detail))
        .route("/notes/{id}/retry", post(pages::retry_note))
        .route("/notes/{id}/delete", post(pages::delete_note))
        .route("/api/notes/{id}/status", get(api::note_status))
        .route("/topics", get(pages::topics_index))
        .route("/topics/{id}", get(pages::topic_detail))
        .route("/topics/{id}/summarize", post(pages::summarize_topic))
        .route("/topics/{id}/rename", post(pages::rename_topic_form))
        .route("/topics/{id}/delete", post(pages::delete_topic_form))
        .route("/tags", get(pages::tags_index))
        .route("/tags/{name}", get(pages::tag_detail))
        .route("/search", get(pages::search))
        .route("/register", get(account::register_page).post(account::register))
        .route("/login", get(account::login_page).post(account::login))
        .route("/logout", post(account::logout))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            identity::identity_layer,
        ));

    app.route("/health", get(api::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the web app until ctrl-c.
pub async fn serve(config: SquirrelConfig) -> Result<()> {
    let bind_addr = config.bind_addr();
    let state = AppState::from_config(config)?;

    pipeline::resume_pending(&state).await?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "squirrel-notes listening at http://{bind_addr}/");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
