use anyhow::Result;

use crate::config::SquirrelConfig;
use crate::notes::types::PointStatus;

/// Display store statistics in the terminal.
pub fn stats(config: &SquirrelConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = crate::db::open_database(&db_path)?;

    let stats = crate::notes::stats::note_stats(&conn, None)?;

    println!("Squirrel Notes Statistics");
    println!("{}", "=".repeat(40));
    println!("  Users:               {}", stats.total_users);
    println!("    demo:              {}", stats.anonymous_users);
    println!("  Topics:              {}", stats.total_topics);
    println!("  Knowledge points:    {}", stats.total_points);
    println!("  Tags:                {}", stats.total_tags);
    println!();

    println!("By Status:");
    for s in [PointStatus::Processing, PointStatus::Completed, PointStatus::Failed] {
        let count = stats.by_status.get(s.as_str()).copied().unwrap_or(0);
        println!("  {:<12} {}", s.as_str(), count);
    }
    println!();

    if let Ok(meta) = std::fs::metadata(&db_path) {
        println!("Database size:         {} bytes", meta.len());
    }
    if let Some(ref oldest) = stats.oldest_point {
        println!("Oldest point:          {oldest}");
    }
    if let Some(ref newest) = stats.newest_point {
        println!("Newest point:          {newest}");
    }

    Ok(())
}
