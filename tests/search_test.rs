mod helpers;

use squirrel_notes::auth::users::{create_anonymous_user, delete_user, purge_stale_anonymous};
use squirrel_notes::notes::points::{create_point, delete_point};
use squirrel_notes::notes::search::search_points;

#[test]
fn finds_chinese_substrings() {
    let mut conn = helpers::test_db();
    let user = create_anonymous_user(&conn).unwrap();
    let hit = create_point(&mut conn, &user.id, "Rust 的所有权系统在编译期检查内存安全").unwrap();
    create_point(&mut conn, &user.id, "Python 使用引用计数和垃圾回收").unwrap();

    let results = search_points(&conn, &user.id, "所有权", 10).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, hit.id);
}

#[test]
fn short_terms_fall_back_to_substring_scan() {
    let mut conn = helpers::test_db();
    let user = create_anonymous_user(&conn).unwrap();
    create_point(&mut conn, &user.id, "Go 的协程叫 goroutine").unwrap();
    create_point(&mut conn, &user.id, "Erlang 进程很轻量").unwrap();

    let results = search_points(&conn, &user.id, "协程", 10).unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].content.contains("goroutine"));

    // LIKE wildcards in user input are literal
    assert!(search_points(&conn, &user.id, "%", 10).unwrap().is_empty());
}

#[test]
fn all_terms_must_match() {
    let mut conn = helpers::test_db();
    let user = create_anonymous_user(&conn).unwrap();
    create_point(&mut conn, &user.id, "tokio runtime spawns tasks").unwrap();
    create_point(&mut conn, &user.id, "tokio channels carry messages").unwrap();

    assert_eq!(search_points(&conn, &user.id, "tokio", 10).unwrap().len(), 2);
    assert_eq!(search_points(&conn, &user.id, "tokio channels", 10).unwrap().len(), 1);
}

#[test]
fn fts_syntax_in_queries_is_inert() {
    let mut conn = helpers::test_db();
    let user = create_anonymous_user(&conn).unwrap();
    create_point(&mut conn, &user.id, "SELECT * FROM notes").unwrap();

    for q in ["\"unbalanced", "content: NOT foo", "a OR b*", "NEAR(x y)"] {
        search_points(&conn, &user.id, q, 10).unwrap();
    }
}

#[test]
fn results_are_scoped_and_follow_deletes() {
    let mut conn = helpers::test_db();
    let alice = create_anonymous_user(&conn).unwrap();
    let bob = create_anonymous_user(&conn).unwrap();
    let point = create_point(&mut conn, &alice.id, "只属于 alice 的笔记内容").unwrap();

    assert!(search_points(&conn, &bob.id, "alice", 10).unwrap().is_empty());
    assert_eq!(search_points(&conn, &alice.id, "alice", 10).unwrap().len(), 1);

    delete_point(&mut conn, &alice.id, &point.id).unwrap();
    assert!(search_points(&conn, &alice.id, "alice", 10).unwrap().is_empty());
}

#[test]
fn purged_demo_notes_leave_no_index_entries() {
    let mut conn = helpers::test_db();
    let demo = create_anonymous_user(&conn).unwrap();
    create_point(&mut conn, &demo.id, "confidential payroll spreadsheet").unwrap();
    conn.execute(
        "UPDATE users SET last_seen_at = '2000-01-01T00:00:00+00:00' WHERE id = ?1",
        [&demo.id],
    )
    .unwrap();
    assert_eq!(purge_stale_anonymous(&conn, 30).unwrap(), 1);

    // The next point may reuse the purged point's rowid
    let bob = create_anonymous_user(&conn).unwrap();
    create_point(&mut conn, &bob.id, "tomato soup recipe").unwrap();

    assert!(search_points(&conn, &bob.id, "payroll", 10).unwrap().is_empty());
    assert_eq!(search_points(&conn, &bob.id, "tomato", 10).unwrap().len(), 1);
    let stale: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM knowledge_points_fts WHERE knowledge_points_fts MATCH 'payroll'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stale, 0);
}

#[test]
fn deleted_user_notes_leave_no_index_entries() {
    let mut conn = helpers::test_db();
    let gone = create_anonymous_user(&conn).unwrap();
    create_point(&mut conn, &gone.id, "秘密的工资表格").unwrap();
    assert!(delete_user(&conn, &gone.id).unwrap());

    let bob = create_anonymous_user(&conn).unwrap();
    create_point(&mut conn, &bob.id, "番茄汤的做法").unwrap();
    assert!(search_points(&conn, &bob.id, "工资表", 10).unwrap().is_empty());
}

#[test]
fn blank_query_returns_nothing() {
    let mut conn = helpers::test_db();
    let user = create_anonymous_user(&conn).unwrap();
    create_point(&mut conn, &user.id, "anything").unwrap();
    assert!(search_points(&conn, &user.id, "   ", 10).unwrap().is_empty());
}
