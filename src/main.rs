use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use squirrel_notes::{cli, config, web};

#[derive(Parser)]
#[command(name = "squirrel-notes", version, about = "松鼠随记: learning notes sorted and summarized by an LLM")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the web app
    Serve,
    /// Print counts of users, topics, points and tags
    Stats,
    /// Regenerate topic summaries that no longer match their points
    Resummarize {
        /// Regenerate every summary, not only stale ones
        #[arg(long)]
        all: bool,
    },
    /// Delete demo users not seen for a number of days
    PurgeDemo {
        /// Idle days before a demo user is removed (default: notes.demo_retention_days)
        #[arg(long)]
        days: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::SquirrelConfig::load()?;

    // Log to stderr so command output on stdout stays clean.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => web::serve(config).await?,
        Command::Stats => cli::stats::stats(&config)?,
        Command::Resummarize { all } => cli::resummarize::resummarize(config, all).await?,
        Command::PurgeDemo { days } => cli::purge_demo::purge_demo(&config, days)?,
    }

    Ok(())
}
