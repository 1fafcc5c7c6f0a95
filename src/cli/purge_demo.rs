use anyhow::Result;

use crate::auth::sessions::delete_expired_sessions;
use crate::auth::users::purge_stale_anonymous;
use crate::config::SquirrelConfig;

/// Delete demo users (and, by cascade, their notes) idle for `days` days,
/// plus expired sessions.
pub fn purge_demo(config: &SquirrelConfig, days: Option<i64>) -> Result<()> {
    let days = days.unwrap_or(config.notes.demo_retention_days);
    anyhow::ensure!(days >= 0, "--days must not be negative");

    let conn = crate::db::open_database(config.resolved_db_path())?;

    let users = purge_stale_anonymous(&conn, days)?;
    let sessions = delete_expired_sessions(&conn)?;

    tracing::info!(users, sessions, days, "demo purge finished");
    println!("Removed {users} demo users idle for {days}+ days and {sessions} expired sessions.");
    Ok(())
}
