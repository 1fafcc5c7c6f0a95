mod helpers;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use std::time::Duration;
use tower::ServiceExt;

use helpers::{
    classification_json, seed_anonymous, seed_completed, seed_registered, test_state, test_state_with,
    ScriptedProvider,
};
use squirrel_notes::auth::users::get_user;
use squirrel_notes::config::SquirrelConfig;
use squirrel_notes::notes::points::{get_point, list_recent_points};
use squirrel_notes::state::AppState;
use squirrel_notes::web::router;

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::builder().uri(uri);
    if let Some(c) = cookie {
        req = req.header(header::COOKIE, c);
    }
    req.body(Body::empty()).unwrap()
}

fn post_form(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(c) = cookie {
        req = req.header(header::COOKIE, c);
    }
    req.body(Body::from(body.to_string())).unwrap()
}

/// Value of a cookie set by the response, if any.
fn set_cookie(resp: &Response<Body>, name: &str) -> Option<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| {
            let pair = v.split(';').next()?;
            let (n, value) = pair.split_once('=')?;
            (n == name).then(|| value.to_string())
        })
}

fn location(resp: &Response<Body>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn body_text(resp: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Visit the home page once and return the issued demo cookie header.
async fn demo_cookie(app: &Router) -> String {
    let resp = app.clone().oneshot(get("/", None)).await.unwrap();
    let id = set_cookie(&resp, "sq_anon").expect("demo cookie issued");
    format!("sq_anon={id}")
}

/// Poll the status endpoint until the note leaves `processing`.
async fn wait_for_status(app: &Router, cookie: &str, id: &str) -> serde_json::Value {
    for _ in 0..200 {
        let resp = app
            .clone()
            .oneshot(get(&format!("/api/notes/{id}/status"), Some(cookie)))
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        if json["status"] != "processing" {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("note {id} never left processing");
}

fn app_with(llm: std::sync::Arc<ScriptedProvider>) -> (Router, AppState) {
    let state = test_state(llm);
    (router(state.clone()), state)
}

#[tokio::test]
async fn first_visit_issues_demo_identity() {
    let (app, state) = app_with(ScriptedProvider::new());

    let resp = app.clone().oneshot(get("/", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let id = set_cookie(&resp, "sq_anon").expect("sq_anon cookie");
    let raw = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap().to_string();
    assert!(raw.contains("HttpOnly"));
    assert!(raw.contains("SameSite=Lax"));

    let html = body_text(resp).await;
    assert!(html.contains("体验模式"));

    let user = get_user(&state.db.lock().unwrap(), &id).unwrap().unwrap();
    assert!(user.is_anonymous);

    // The same cookie resolves to the same user and is not reissued
    let resp = app.oneshot(get("/", Some(&format!("sq_anon={id}")))).await.unwrap();
    assert!(set_cookie(&resp, "sq_anon").is_none());
}

#[tokio::test]
async fn health_does_not_create_users() {
    let (app, state) = app_with(ScriptedProvider::new());

    let resp = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(set_cookie(&resp, "sq_anon").is_none());
    let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["llm"], "scripted");

    let users: i64 = state
        .db
        .lock()
        .unwrap()
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .unwrap();
    assert_eq!(users, 0);
}

#[tokio::test]
async fn note_is_captured_then_classified() {
    let llm = ScriptedProvider::new();
    llm.reply(&classification_json("Rust", &["async"], "Future 是惰性的"))
        .reply("Rust 的 Future 需要被轮询才会执行。");
    let (app, _state) = app_with(llm);
    let cookie = demo_cookie(&app).await;

    let resp = app
        .clone()
        .oneshot(post_form("/notes", Some(&cookie), "content=Futures+do+nothing+unless+polled"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let loc = location(&resp);
    let id = loc.strip_prefix("/?note=").expect("redirect to the toast").to_string();

    // The page right after the redirect carries the poller
    let resp = app.clone().oneshot(get(&loc, Some(&cookie))).await.unwrap();
    let html = body_text(resp).await;
    assert!(html.contains("Futures do nothing unless polled"));

    let status = wait_for_status(&app, &cookie, &id).await;
    assert_eq!(status["status"], "completed");
    let topic_id = status["topic_id"].as_str().unwrap().to_string();

    // The summary is written shortly after the point completes
    let mut html = String::new();
    for _ in 0..200 {
        let resp = app
            .clone()
            .oneshot(get(&format!("/topics/{topic_id}"), Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        html = body_text(resp).await;
        if html.contains("Rust 的 Future 需要被轮询才会执行。") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(html.contains("Rust 的 Future 需要被轮询才会执行。"));
    assert!(html.contains("Future 是惰性的"));

    let resp = app.oneshot(get("/tags/async", Some(&cookie))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn failed_note_can_be_retried() {
    let llm = ScriptedProvider::new();
    llm.fail("upstream unavailable");
    let (app, _state) = app_with(llm.clone());
    let cookie = demo_cookie(&app).await;

    let resp = app
        .clone()
        .oneshot(post_form("/notes", Some(&cookie), "content=Borrow+checker+notes"))
        .await
        .unwrap();
    let id = location(&resp).trim_start_matches("/?note=").to_string();

    let status = wait_for_status(&app, &cookie, &id).await;
    assert_eq!(status["status"], "failed");
    assert!(status["error"].as_str().unwrap().contains("upstream unavailable"));

    llm.reply(&classification_json("Rust", &[], "借用检查")).reply("总结");
    let resp = app
        .clone()
        .oneshot(post_form(&format!("/notes/{id}/retry"), Some(&cookie), ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let status = wait_for_status(&app, &cookie, &id).await;
    assert_eq!(status["status"], "completed");

    // Completed notes cannot be retried
    let resp = app
        .oneshot(post_form(&format!("/notes/{id}/retry"), Some(&cookie), ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn blank_and_oversized_notes_are_rejected() {
    let mut config = SquirrelConfig::default();
    config.notes.max_note_chars = 10;
    let state = test_state_with(ScriptedProvider::new(), config);
    let app = router(state.clone());
    let cookie = demo_cookie(&app).await;

    let resp = app
        .clone()
        .oneshot(post_form("/notes", Some(&cookie), "content=+++"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .oneshot(post_form("/notes", Some(&cookie), "content=this+is+far+too+long"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let count: i64 = state
        .db
        .lock()
        .unwrap()
        .query_row("SELECT COUNT(*) FROM knowledge_points", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn demo_users_hit_the_note_limit() {
    let mut config = SquirrelConfig::default();
    config.notes.demo_max_points = 1;
    let state = test_state_with(ScriptedProvider::new(), config);
    let app = router(state.clone());
    let cookie = demo_cookie(&app).await;

    let resp = app
        .clone()
        .oneshot(post_form("/notes", Some(&cookie), "content=first"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let resp = app
        .oneshot(post_form("/notes", Some(&cookie), "content=second"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(resp).await.contains("注册"));
}

#[tokio::test]
async fn other_users_data_is_not_found() {
    let (app, state) = app_with(ScriptedProvider::new());
    let owner = seed_anonymous(&state);
    let point = seed_completed(&state, &owner.id, "secret note", "私有主题", &["隐私"]);
    let cookie = demo_cookie(&app).await;

    for uri in [
        format!("/notes/{}", point.id),
        format!("/api/notes/{}/status", point.id),
        format!("/topics/{}", point.topic_id.as_deref().unwrap()),
        "/tags/%E9%9A%90%E7%A7%81".to_string(),
    ] {
        let resp = app.clone().oneshot(get(&uri, Some(&cookie))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
    }

    let resp = app
        .clone()
        .oneshot(post_form(&format!("/notes/{}/delete", point.id), Some(&cookie), ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(get_point(&state.db.lock().unwrap(), &owner.id, &point.id).unwrap().is_some());

    let resp = app
        .oneshot(get("/search?q=secret", Some(&cookie)))
        .await
        .unwrap();
    assert!(!body_text(resp).await.contains("secret note"));
}

#[tokio::test]
async fn user_text_is_escaped() {
    let (app, state) = app_with(ScriptedProvider::new());
    let cookie = demo_cookie(&app).await;
    let user_id = cookie.trim_start_matches("sq_anon=").to_string();
    let point = seed_completed(&state, &user_id, "<script>alert(1)</script>", "<b>XSS</b>", &[]);

    let resp = app
        .clone()
        .oneshot(get(&format!("/notes/{}", point.id), Some(&cookie)))
        .await
        .unwrap();
    let html = body_text(resp).await;
    assert!(!html.contains("<script>alert(1)</script>"));
    assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    assert!(html.contains("&lt;b&gt;XSS&lt;/b&gt;"));
}

#[tokio::test]
async fn registration_binds_demo_notes() {
    let (app, state) = app_with(ScriptedProvider::new());
    let cookie = demo_cookie(&app).await;
    let anon_id = cookie.trim_start_matches("sq_anon=").to_string();
    let point = seed_completed(&state, &anon_id, "demo note", "Rust", &["demo"]);

    let resp = app
        .clone()
        .oneshot(post_form("/register", Some(&cookie), "username=alice&password=hunter22"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let session = set_cookie(&resp, "sq_session").expect("session cookie");
    assert_eq!(set_cookie(&resp, "sq_anon").as_deref(), Some(""));

    // The demo user is gone and its note belongs to the account
    {
        let conn = state.db.lock().unwrap();
        assert!(get_user(&conn, &anon_id).unwrap().is_none());
        let owner: String = conn
            .query_row("SELECT user_id FROM knowledge_points WHERE id = ?1", [&point.id], |row| row.get(0))
            .unwrap();
        assert_ne!(owner, anon_id);
        assert_eq!(list_recent_points(&conn, &owner, 10).unwrap().len(), 1);
    }

    let session_cookie = format!("sq_session={session}");
    let resp = app
        .clone()
        .oneshot(get(&format!("/notes/{}", point.id), Some(&session_cookie)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_text(resp).await;
    assert!(html.contains("demo note"));
    assert!(html.contains("alice"));

    // A stale demo cookie alongside the session does not override it
    let both = format!("{session_cookie}; {cookie}");
    let resp = app.oneshot(get("/", Some(&both))).await.unwrap();
    assert!(!body_text(resp).await.contains("体验模式"));
}

#[tokio::test]
async fn invalid_registration_rerenders_form() {
    let (app, state) = app_with(ScriptedProvider::new());
    seed_registered(&state, "taken_name", "secret1");
    let cookie = demo_cookie(&app).await;

    for body in [
        "username=ab&password=secret1",
        "username=valid_name&password=123",
        "username=taken_name&password=secret1",
    ] {
        let resp = app
            .clone()
            .oneshot(post_form("/register", Some(&cookie), body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
        assert!(set_cookie(&resp, "sq_session").is_none());
    }

    // The demo identity survives failed attempts
    let anon_id = cookie.trim_start_matches("sq_anon=");
    assert!(get_user(&state.db.lock().unwrap(), anon_id).unwrap().is_some());
}

#[tokio::test]
async fn login_and_logout() {
    let (app, state) = app_with(ScriptedProvider::new());
    let user = seed_registered(&state, "bob", "correct horse");
    seed_completed(&state, &user.id, "bob's note", "Go", &[]);
    let cookie = demo_cookie(&app).await;

    let resp = app
        .clone()
        .oneshot(post_form("/login", Some(&cookie), "username=bob&password=wrong+horse"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .clone()
        .oneshot(post_form("/login", Some(&cookie), "username=bob&password=correct+horse"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let session = format!("sq_session={}", set_cookie(&resp, "sq_session").unwrap());

    let resp = app.clone().oneshot(get("/", Some(&session))).await.unwrap();
    assert!(body_text(resp).await.contains("bob&#39;s note"));

    let resp = app
        .clone()
        .oneshot(post_form("/logout", Some(&session), ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(set_cookie(&resp, "sq_session").as_deref(), Some(""));

    // The old token no longer signs anyone in
    let resp = app.oneshot(get("/", Some(&session))).await.unwrap();
    assert!(set_cookie(&resp, "sq_anon").is_some());
}

#[tokio::test]
async fn rename_and_delete_topic() {
    let (app, state) = app_with(ScriptedProvider::new());
    let cookie = demo_cookie(&app).await;
    let user_id = cookie.trim_start_matches("sq_anon=").to_string();
    let a = seed_completed(&state, &user_id, "note a", "Alpha", &[]);
    seed_completed(&state, &user_id, "note b", "Beta", &[]);
    let topic_id = a.topic_id.clone().unwrap();

    let resp = app
        .clone()
        .oneshot(post_form(&format!("/topics/{topic_id}/rename"), Some(&cookie), "name=Beta"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .clone()
        .oneshot(post_form(
            &format!("/topics/{topic_id}/rename"),
            Some(&cookie),
            "name=Gamma&description=greek+letters",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let resp = app
        .clone()
        .oneshot(get(&format!("/topics/{topic_id}"), Some(&cookie)))
        .await
        .unwrap();
    let html = body_text(resp).await;
    assert!(html.contains("Gamma"));
    assert!(html.contains("greek letters"));

    let resp = app
        .clone()
        .oneshot(post_form(&format!("/topics/{topic_id}/delete"), Some(&cookie), ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let point = get_point(&state.db.lock().unwrap(), &user_id, &a.id).unwrap().unwrap();
    assert!(point.topic_id.is_none());
}

#[tokio::test]
async fn on_demand_summary_reports_upstream_errors() {
    let llm = ScriptedProvider::new();
    llm.fail("quota exceeded");
    let (app, state) = app_with(llm.clone());
    let cookie = demo_cookie(&app).await;
    let user_id = cookie.trim_start_matches("sq_anon=").to_string();
    let point = seed_completed(&state, &user_id, "Raft elects a leader", "分布式", &[]);
    let topic_id = point.topic_id.unwrap();

    let resp = app
        .clone()
        .oneshot(post_form(&format!("/topics/{topic_id}/summarize"), Some(&cookie), ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    llm.reply("Raft 通过选举产生领导者。");
    let resp = app
        .clone()
        .oneshot(post_form(&format!("/topics/{topic_id}/summarize"), Some(&cookie), ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let resp = app.oneshot(get("/topics", Some(&cookie))).await.unwrap();
    assert!(body_text(resp).await.contains("Raft 通过选举产生领导者。"));
}
