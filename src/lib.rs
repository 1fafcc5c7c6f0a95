//! Squirrel Notes (松鼠随记): capture learning notes, let an LLM sort them into
//! topics and tags, and read an AI summary per topic.
//!
//! Notes are saved immediately with status `processing`. A background task asks
//! the configured model to classify the note, stores the result and refreshes
//! the topic summary; the browser polls the stored status once per second.
//!
//! Visitors get a demo identity on their first request. Registering from a
//! demo session moves everything the demo user wrote into the new account.
//!
//! # Architecture
//!
//! - **Storage**: SQLite with an FTS5 trigram index for note search
//! - **LLM**: any OpenAI-compatible chat completions endpoint
//! - **Web**: axum, server-rendered HTML plus one JSON status endpoint
//!
//! # Modules
//!
//! - [`config`]: configuration from TOML files and environment variables
//! - [`db`]: database initialization, schema and migrations
//! - [`notes`]: topics, knowledge points, tags, search and data binding
//! - [`auth`]: users, password hashing, sessions and registration
//! - [`llm`]: provider trait, HTTP client, prompts and reply parsing
//! - [`pipeline`]: background classification and summaries
//! - [`web`]: routes, identity middleware and HTML rendering

pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod llm;
pub mod notes;
pub mod pipeline;
pub mod state;
pub mod web;
