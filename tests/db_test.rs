mod helpers;

use squirrel_notes::auth::users::{create_anonymous_user, delete_user};
use squirrel_notes::db;
use squirrel_notes::db::migrations::{get_schema_version, run_migrations, CURRENT_SCHEMA_VERSION};
use squirrel_notes::notes::points::create_point;
use squirrel_notes::notes::topics::find_or_create_topic;
use tempfile::TempDir;

#[test]
fn open_creates_new_db_at_nonexistent_path() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("subdir").join("notes.db");
    assert!(!db_path.exists());

    let conn = db::open_database(&db_path).unwrap();
    assert!(db_path.exists());

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM knowledge_points", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);

    let mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
}

#[test]
fn reopening_keeps_data_and_version() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("notes.db");

    let user_id = {
        let mut conn = db::open_database(&db_path).unwrap();
        let user = create_anonymous_user(&conn).unwrap();
        create_point(&mut conn, &user.id, "持久化的笔记").unwrap();
        user.id
    };

    let conn = db::open_database(&db_path).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM knowledge_points WHERE user_id = ?1",
            [&user_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn migrations_are_idempotent() {
    let mut conn = helpers::test_db();
    run_migrations(&mut conn).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn v1_database_gains_summary_point_count() {
    let mut conn = rusqlite::Connection::open_in_memory().unwrap();
    db::schema::init_schema(&conn).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), 1);

    run_migrations(&mut conn).unwrap();

    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    let has_column: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('topics') WHERE name = 'summary_point_count'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(has_column);
}

#[test]
fn deleting_a_user_cascades_to_their_data() {
    let mut conn = helpers::test_db();
    let user = create_anonymous_user(&conn).unwrap();
    find_or_create_topic(&conn, &user.id, "Rust").unwrap();
    create_point(&mut conn, &user.id, "会被一起删除").unwrap();

    assert!(delete_user(&conn, &user.id).unwrap());

    for table in ["topics", "knowledge_points"] {
        let n: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap();
        assert_eq!(n, 0, "{table}");
    }
}

#[test]
fn upgrade_drops_index_rows_orphaned_by_cascades() {
    let mut conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    db::schema::init_schema(&conn).unwrap();

    let user = create_anonymous_user(&conn).unwrap();
    create_point(&mut conn, &user.id, "orphaned index entry").unwrap();
    assert!(delete_user(&conn, &user.id).unwrap());

    let fts_hits = |conn: &rusqlite::Connection| -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM knowledge_points_fts WHERE knowledge_points_fts MATCH 'orphaned'",
            [],
            |row| row.get(0),
        )
        .unwrap()
    };
    assert_eq!(fts_hits(&conn), 1);

    run_migrations(&mut conn).unwrap();
    assert_eq!(fts_hits(&conn), 0);
}
