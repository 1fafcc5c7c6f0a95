//! Shared application state: database handle, LLM provider and config.

use anyhow::Result;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::config::SquirrelConfig;
use crate::db;
use crate::llm::{self, LlmProvider};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub llm: Arc<dyn LlmProvider>,
    pub config: Arc<SquirrelConfig>,
}

impl AppState {
    pub fn new(conn: Connection, llm: Arc<dyn LlmProvider>, config: SquirrelConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            llm,
            config: Arc::new(config),
        }
    }

    /// Open the configured database and create the configured LLM provider.
    pub fn from_config(config: SquirrelConfig) -> Result<Self> {
        let db_path = config.resolved_db_path();
        let conn = db::open_database(&db_path)?;
        tracing::info!(db = %db_path.display(), "database ready");

        let provider: Arc<dyn LlmProvider> = Arc::from(llm::create_provider(&config.llm)?);
        tracing::info!(provider = provider.name(), model = %config.llm.model, "LLM provider ready");

        Ok(Self::new(conn, provider, config))
    }

    /// Run a closure against the database on the blocking pool.
    pub async fn run_db<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| anyhow::anyhow!("db task failed: {e}"))?
    }

    /// Run one LLM completion on the blocking pool.
    pub async fn complete(&self, system: &'static str, user: String) -> Result<String> {
        let llm = Arc::clone(&self.llm);
        tokio::task::spawn_blocking(move || llm.complete(system, &user))
            .await
            .map_err(|e| anyhow::anyhow!("LLM task failed: {e}"))?
    }
}
