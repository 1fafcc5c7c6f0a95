//! CLI `resummarize` command: regenerate topic summaries with the configured model.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::SquirrelConfig;
use crate::notes::topics::list_all_topics;
use crate::pipeline;
use crate::state::AppState;

/// Regenerate stale summaries, or every summary with `all`.
pub async fn resummarize(config: SquirrelConfig, all: bool) -> Result<()> {
    let state = AppState::from_config(config).context("failed to open application state")?;

    let topics: Vec<_> = state
        .run_db(|conn| list_all_topics(conn))
        .await?
        .into_iter()
        .filter(|t| all || t.summary_is_stale())
        .collect();

    let total = topics.len();
    if total == 0 {
        println!("All topic summaries are up to date.");
        return Ok(());
    }

    println!("Regenerating {total} topic summaries with model '{}'...", state.config.llm.model);

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} ({eta}) {msg}")
            .context("invalid progress template")?
            .progress_chars("##-"),
    );

    let mut failed = 0usize;
    for t in &topics {
        pb.set_message(t.topic.name.clone());
        if let Err(e) = pipeline::summarize_topic(&state, &t.topic.user_id, &t.topic.id).await {
            failed += 1;
            pb.suspend(|| eprintln!("  {}: {e:#}", t.topic.name));
        }
        pb.inc(1);
    }

    pb.finish_and_clear();

    println!("Done: {} updated, {failed} failed.", total - failed);
    Ok(())
}
