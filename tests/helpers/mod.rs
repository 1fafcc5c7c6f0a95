#![allow(dead_code)]

use anyhow::Result;
use rusqlite::Connection;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use squirrel_notes::auth::users::{create_anonymous_user, create_registered_user, User};
use squirrel_notes::config::SquirrelConfig;
use squirrel_notes::db;
use squirrel_notes::llm::LlmProvider;
use squirrel_notes::notes::points::{complete_point, create_point};
use squirrel_notes::notes::types::KnowledgePoint;
use squirrel_notes::state::AppState;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    db::schema::init_schema(&conn).unwrap();
    db::migrations::run_migrations(&mut conn).unwrap();
    conn
}

/// LLM provider that replays queued replies in order and records every prompt.
/// An empty queue is an error, like an unreachable provider.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, text: &str) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(&self, message: &str) -> &Self {
        self.replies.lock().unwrap().push_back(Err(message.to_string()));
        self
    }

    /// `(system, user)` pairs seen so far.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn pending(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => anyhow::bail!("{message}"),
            None => anyhow::bail!("connection refused"),
        }
    }
}

/// Classification reply in the shape the prompt asks for.
pub fn classification_json(topic: &str, tags: &[&str], title: &str) -> String {
    serde_json::json!({ "topic": topic, "tags": tags, "title": title }).to_string()
}

pub fn test_state(provider: Arc<ScriptedProvider>) -> AppState {
    test_state_with(provider, SquirrelConfig::default())
}

pub fn test_state_with(provider: Arc<ScriptedProvider>, config: SquirrelConfig) -> AppState {
    AppState::new(test_db(), provider, config)
}

pub fn seed_anonymous(state: &AppState) -> User {
    let conn = state.db.lock().unwrap();
    create_anonymous_user(&conn).unwrap()
}

pub fn seed_registered(state: &AppState, username: &str, password: &str) -> User {
    let conn = state.db.lock().unwrap();
    create_registered_user(&conn, username, password).unwrap()
}

/// Insert a point that is still waiting for analysis.
pub fn seed_processing(state: &AppState, user_id: &str, content: &str) -> KnowledgePoint {
    let mut conn = state.db.lock().unwrap();
    create_point(&mut conn, user_id, content).unwrap()
}

/// Insert a point that already went through classification.
pub fn seed_completed(
    state: &AppState,
    user_id: &str,
    content: &str,
    topic: &str,
    tags: &[&str],
) -> KnowledgePoint {
    let mut conn = state.db.lock().unwrap();
    let point = create_point(&mut conn, user_id, content).unwrap();
    let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
    complete_point(&mut conn, user_id, &point.id, topic, &point.title, &tags).unwrap();
    squirrel_notes::notes::points::get_point(&conn, user_id, &point.id)
        .unwrap()
        .unwrap()
}
