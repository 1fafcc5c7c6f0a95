//! Server-side HTML rendering.
//!
//! Pages are plain `format!` templates around a shared [`layout`]. Every piece
//! of user or model text goes through [`esc`].

use axum::http::StatusCode;

use crate::auth::users::User;
use crate::notes::points::PointStatusInfo;
use crate::notes::types::{KnowledgePoint, PointStatus, Tag, TagCount, Topic, TopicOverview};

const STYLE: &str = r#"
body { font-family: -apple-system, "PingFang SC", "Microsoft YaHei", sans-serif; max-width: 880px; margin: 0 auto; padding: 0 16px 48px; color: #222; background: #faf8f5; }
header { display: flex; align-items: center; justify-content: space-between; padding: 16px 0; border-bottom: 1px solid #e5ded3; margin-bottom: 20px; }
header nav a, header nav form { margin-left: 14px; display: inline; }
a { color: #9a5b13; text-decoration: none; }
.brand { font-weight: 700; font-size: 20px; color: #6b3f0c; }
.banner { background: #fff4e0; border: 1px solid #f0d5a8; padding: 10px 14px; border-radius: 6px; margin-bottom: 16px; }
.card { background: #fff; border: 1px solid #eee4d6; border-radius: 8px; padding: 14px 16px; margin-bottom: 12px; }
.card h3 { margin: 0 0 6px; }
.muted { color: #888; font-size: 13px; }
.badge { display: inline-block; font-size: 12px; padding: 1px 8px; border-radius: 10px; margin-left: 6px; }
.badge.processing { background: #e8f0fe; color: #1a56c4; }
.badge.completed { background: #e6f4ea; color: #1e7e34; }
.badge.failed { background: #fdecea; color: #b3261e; }
.badge.stale { background: #f3f3f3; color: #777; }
.tag { display: inline-block; background: #f4ece1; color: #7a4a12; border-radius: 4px; padding: 1px 7px; margin: 2px 4px 2px 0; font-size: 13px; }
textarea { width: 100%; min-height: 110px; box-sizing: border-box; padding: 10px; font-size: 15px; }
input[type=text], input[type=password], input[type=search] { padding: 6px 8px; font-size: 15px; }
button { background: #b8741a; color: #fff; border: none; border-radius: 5px; padding: 7px 16px; cursor: pointer; }
button.link { background: none; color: #9a5b13; padding: 0; }
button.danger { background: #b3261e; }
.toast { position: fixed; right: 20px; bottom: 20px; padding: 12px 18px; border-radius: 8px; background: #1a56c4; color: #fff; box-shadow: 0 2px 10px rgba(0,0,0,.2); }
.toast.completed { background: #1e7e34; }
.toast.failed { background: #b3261e; }
.toast a { color: #fff; text-decoration: underline; }
.error { color: #b3261e; }
.summary { white-space: pre-wrap; line-height: 1.6; }
pre.content { white-space: pre-wrap; font-family: inherit; line-height: 1.6; }
"#;

/// Polls `/api/notes/{id}/status` once per second until the note settles.
/// Only reads the stored status; the timeout changes the message, not the state.
const POLL_SCRIPT: &str = r#"
(function () {
  var toast = document.getElementById('toast');
  if (!toast) return;
  var id = toast.getAttribute('data-note');
  var timeoutMs = Number(toast.getAttribute('data-timeout')) * 1000;
  var msg = toast.querySelector('.toast-msg');
  var started = Date.now();
  var timer = setInterval(function () {
    if (Date.now() - started > timeoutMs) {
      clearInterval(timer);
      msg.textContent = '分析时间较长，请稍后刷新查看';
      return;
    }
    fetch('/api/notes/' + encodeURIComponent(id) + '/status', { credentials: 'same-origin' })
      .then(function (res) {
        if (!res.ok) { clearInterval(timer); toast.remove(); return null; }
        return res.json();
      })
      .then(function (data) {
        if (!data) return;
        if (data.status === 'completed') {
          clearInterval(timer);
          toast.className = 'toast completed';
          msg.innerHTML = '已完成 · <a href="/topics/' + encodeURIComponent(data.topic_id) + '">查看主题</a>';
        } else if (data.status === 'failed') {
          clearInterval(timer);
          toast.className = 'toast failed';
          msg.textContent = '分析失败' + (data.error ? '：' + data.error : '');
        }
      })
      .catch(function () { /* transient network error, keep polling */ });
  }, 1000);
})();
"#;

/// Escape text for HTML element content and quoted attributes.
pub fn esc(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encode a path segment (tag names can hold anything).
pub fn url_segment(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

fn short_date(ts: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(ts)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| ts.to_string())
}

pub fn layout(title: &str, user: Option<&User>, body: &str) -> String {
    let nav_user = match user {
        Some(u) if !u.is_anonymous => format!(
            r#"<span class="muted">{name}</span><form method="post" action="/logout"><button class="link" type="submit">退出</button></form>"#,
            name = esc(u.display_name())
        ),
        Some(_) => r#"<a href="/login">登录</a><a href="/register">注册</a>"#.to_string(),
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title} · 松鼠随记</title>
<style>{STYLE}</style>
</head>
<body>
<header>
  <a class="brand" href="/">🐿️ 松鼠随记</a>
  <nav>
    <a href="/topics">主题</a>
    <a href="/tags">标签</a>
    <a href="/search">搜索</a>
    {nav_user}
  </nav>
</header>
{body}
</body>
</html>"#,
        title = esc(title),
    )
}

pub fn status_badge(status: PointStatus) -> String {
    format!(
        r#"<span class="badge {cls}">{label}</span>"#,
        cls = status.as_str(),
        label = status.label()
    )
}

fn tag_chips(tags: &[Tag]) -> String {
    tags.iter()
        .map(|t| {
            format!(
                r#"<a class="tag" href="/tags/{href}">#{name}</a>"#,
                href = url_segment(&t.name),
                name = esc(&t.name)
            )
        })
        .collect()
}

fn point_card(point: &KnowledgePoint, tags: &[Tag]) -> String {
    let preview: String = point.content.chars().take(120).collect();
    let ellipsis = if point.content.chars().count() > 120 { "…" } else { "" };
    format!(
        r#"<div class="card">
  <h3><a href="/notes/{id}">{title}</a>{badge}</h3>
  <div>{preview}{ellipsis}</div>
  <div>{tags}</div>
  <div class="muted">{date}</div>
</div>"#,
        id = esc(&point.id),
        title = esc(&point.title),
        badge = status_badge(point.status),
        preview = esc(&preview),
        tags = tag_chips(tags),
        date = short_date(&point.created_at),
    )
}

fn topic_card(t: &TopicOverview) -> String {
    let summary = match &t.topic.summary {
        Some(s) => format!(r#"<div class="summary">{}</div>"#, esc(s)),
        None => r#"<div class="muted">暂无总结</div>"#.to_string(),
    };
    let stale = if t.topic.summary.is_some() && t.summary_is_stale() {
        r#"<span class="badge stale">待更新</span>"#
    } else {
        ""
    };
    format!(
        r#"<div class="card">
  <h3><a href="/topics/{id}">{name}</a> <span class="muted">{count} 条笔记</span>{stale}</h3>
  {summary}
</div>"#,
        id = esc(&t.topic.id),
        name = esc(&t.topic.name),
        count = t.point_count,
    )
}

fn toast(status: &PointStatusInfo, poll_timeout_secs: u64) -> String {
    match status.status {
        PointStatus::Processing => format!(
            r#"<div id="toast" class="toast processing" data-note="{id}" data-timeout="{poll_timeout_secs}"><span class="toast-msg">正在分析…</span></div>
<script>{POLL_SCRIPT}</script>"#,
            id = esc(&status.id),
        ),
        PointStatus::Completed => format!(
            r#"<div class="toast completed"><span class="toast-msg">已完成 · <a href="/topics/{topic}">查看主题</a></span></div>"#,
            topic = esc(status.topic_id.as_deref().unwrap_or("")),
        ),
        PointStatus::Failed => format!(
            r#"<div class="toast failed"><span class="toast-msg">分析失败{err}</span></div>"#,
            err = status
                .error
                .as_deref()
                .map(|e| format!("：{}", esc(e)))
                .unwrap_or_default(),
        ),
    }
}

pub struct HomeView<'a> {
    pub user: &'a User,
    pub recent: &'a [(KnowledgePoint, Vec<Tag>)],
    pub topics: &'a [TopicOverview],
    pub pending: Option<&'a PointStatusInfo>,
    pub demo_remaining: Option<usize>,
    pub max_note_chars: usize,
    pub poll_timeout_secs: u64,
}

pub fn home_page(view: &HomeView<'_>) -> String {
    let banner = match view.demo_remaining {
        Some(0) => r#"<div class="banner">体验额度已用完。<a href="/register">注册账号</a>后可继续记录，已有笔记会自动保留。</div>"#.to_string(),
        Some(n) => format!(
            r#"<div class="banner">你正在使用体验模式，还可记录 {n} 条笔记。<a href="/register">注册</a>后笔记将永久保存。</div>"#
        ),
        None => String::new(),
    };

    let recent = if view.recent.is_empty() {
        r#"<p class="muted">还没有笔记，写下你今天学到的第一件事吧。</p>"#.to_string()
    } else {
        view.recent.iter().map(|(p, tags)| point_card(p, tags)).collect()
    };

    let topics = if view.topics.is_empty() {
        r#"<p class="muted">笔记分析完成后会自动归入主题。</p>"#.to_string()
    } else {
        view.topics.iter().map(topic_card).collect()
    };

    let toast = view
        .pending
        .map(|s| toast(s, view.poll_timeout_secs))
        .unwrap_or_default();

    let body = format!(
        r#"{banner}
<form method="post" action="/notes" class="card">
  <textarea name="content" maxlength="{max}" placeholder="随手记下学到的知识点…" required></textarea>
  <div style="margin-top:8px"><button type="submit">记下来</button></div>
</form>
<h2>最近笔记</h2>
{recent}
<h2>主题总结</h2>
{topics}
{toast}"#,
        max = view.max_note_chars,
    );

    layout("首页", Some(view.user), &body)
}

pub fn note_page(user: &User, point: &KnowledgePoint, tags: &[Tag], topic: Option<&Topic>) -> String {
    let topic_line = match topic {
        Some(t) => format!(
            r#"主题：<a href="/topics/{id}">{name}</a>"#,
            id = esc(&t.id),
            name = esc(&t.name)
        ),
        None => r#"<span class="muted">未归类</span>"#.to_string(),
    };
    let error = point
        .error
        .as_deref()
        .map(|e| format!(r#"<p class="error">{}</p>"#, esc(e)))
        .unwrap_or_default();
    let retry = if point.status == PointStatus::Failed {
        format!(
            r#"<form method="post" action="/notes/{id}/retry" style="display:inline"><button type="submit">重新分析</button></form>"#,
            id = esc(&point.id)
        )
    } else {
        String::new()
    };

    let body = format!(
        r#"<div class="card">
  <h2>{title}{badge}</h2>
  <p>{topic_line}</p>
  <div>{tags}</div>
  <pre class="content">{content}</pre>
  {error}
  <p class="muted">记录于 {created}</p>
  {retry}
  <form method="post" action="/notes/{id}/delete" style="display:inline" onsubmit="return confirm('确定删除这条笔记？')"><button class="danger" type="submit">删除</button></form>
</div>"#,
        title = esc(&point.title),
        badge = status_badge(point.status),
        tags = tag_chips(tags),
        content = esc(&point.content),
        created = short_date(&point.created_at),
        id = esc(&point.id),
    );

    layout(&point.title, Some(user), &body)
}

pub fn topics_page(user: &User, topics: &[TopicOverview]) -> String {
    let list: String = if topics.is_empty() {
        r#"<p class="muted">还没有主题。</p>"#.to_string()
    } else {
        topics.iter().map(topic_card).collect()
    };
    layout("主题", Some(user), &format!("<h2>全部主题</h2>\n{list}"))
}

pub fn topic_page(
    user: &User,
    topic: &TopicOverview,
    points: &[(KnowledgePoint, Vec<Tag>)],
    notice: Option<&str>,
) -> String {
    let t = &topic.topic;
    let summary = match &t.summary {
        Some(s) => {
            let stale = if topic.summary_is_stale() {
                r#" <span class="badge stale">有新笔记，总结待更新</span>"#
            } else {
                ""
            };
            format!(
                r#"<div class="summary">{}</div><p class="muted">更新于 {}{stale}</p>"#,
                esc(s),
                t.summary_updated_at.as_deref().map(short_date).unwrap_or_default()
            )
        }
        None => r#"<p class="muted">暂无总结</p>"#.to_string(),
    };
    let notice = notice
        .map(|n| format!(r#"<p class="error">{}</p>"#, esc(n)))
        .unwrap_or_default();
    let about = if t.description.is_empty() {
        String::new()
    } else {
        format!(r#"<p class="muted">{}</p>"#, esc(&t.description))
    };
    let list: String = points.iter().map(|(p, tags)| point_card(p, tags)).collect();

    let body = format!(
        r#"<div class="card">
  <h2>{name} <span class="muted">{count} 条笔记</span></h2>
  {about}
  {notice}
  <h3>AI 总结</h3>
  {summary}
  <form method="post" action="/topics/{id}/summarize" style="display:inline"><button type="submit">重新生成总结</button></form>
  <form method="post" action="/topics/{id}/rename" style="margin-top:12px">
    <input type="text" name="name" value="{name}" required maxlength="50">
    <input type="text" name="description" value="{description}" placeholder="主题简介（可选）">
    <button type="submit">保存</button>
  </form>
  <form method="post" action="/topics/{id}/delete" style="display:inline; margin-left:12px" onsubmit="return confirm('删除主题后，笔记会变为未归类。确定？')"><button class="danger" type="submit">删除主题</button></form>
</div>
<h2>笔记</h2>
{list}"#,
        name = esc(&t.name),
        description = esc(&t.description),
        count = topic.point_count,
        id = esc(&t.id),
    );

    layout(&t.name, Some(user), &body)
}

pub fn tags_page(user: &User, tags: &[TagCount]) -> String {
    let list: String = if tags.is_empty() {
        r#"<p class="muted">还没有标签。</p>"#.to_string()
    } else {
        tags.iter()
            .map(|t| {
                format!(
                    r#"<a class="tag" href="/tags/{href}">#{name} ({n})</a>"#,
                    href = url_segment(&t.name),
                    name = esc(&t.name),
                    n = t.point_count
                )
            })
            .collect()
    };
    layout("标签", Some(user), &format!("<h2>全部标签</h2>\n<div class=\"card\">{list}</div>"))
}

pub fn tag_page(user: &User, tag: &str, points: &[(KnowledgePoint, Vec<Tag>)]) -> String {
    let list: String = if points.is_empty() {
        r#"<p class="muted">没有带这个标签的笔记。</p>"#.to_string()
    } else {
        points.iter().map(|(p, tags)| point_card(p, tags)).collect()
    };
    layout(
        &format!("#{tag}"),
        Some(user),
        &format!("<h2>#{}</h2>\n{list}", esc(tag)),
    )
}

pub fn search_page(user: &User, query: &str, results: &[(KnowledgePoint, Vec<Tag>)]) -> String {
    let list: String = if query.trim().is_empty() {
        String::new()
    } else if results.is_empty() {
        r#"<p class="muted">没有找到相关笔记。</p>"#.to_string()
    } else {
        results.iter().map(|(p, tags)| point_card(p, tags)).collect()
    };
    let body = format!(
        r#"<form method="get" action="/search" class="card">
  <input type="search" name="q" value="{q}" placeholder="搜索笔记内容" autofocus> <button type="submit">搜索</button>
</form>
{list}"#,
        q = esc(query),
    );
    layout("搜索", Some(user), &body)
}

/// Login or register form. `action` is `/login` or `/register`.
pub fn account_page(user: &User, action: &str, error: Option<&str>, username: &str) -> String {
    let (title, button, hint) = if action == "/register" {
        let hint = if user.is_anonymous {
            r#"<p class="muted">注册后，当前体验模式下的笔记会自动归入新账号。</p>"#
        } else {
            ""
        };
        ("注册", "注册", hint)
    } else {
        ("登录", "登录", "")
    };
    let error = error
        .map(|e| format!(r#"<p class="error">{}</p>"#, esc(e)))
        .unwrap_or_default();

    let body = format!(
        r#"<form method="post" action="{action}" class="card">
  <h2>{title}</h2>
  {hint}
  {error}
  <p><input type="text" name="username" value="{username}" placeholder="用户名" required></p>
  <p><input type="password" name="password" placeholder="密码" required></p>
  <p><button type="submit">{button}</button></p>
</form>"#,
        username = esc(username),
    );
    layout(title, Some(user), &body)
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    let body = format!(
        r#"<div class="card"><h2>{code}</h2><p>{msg}</p><p><a href="/">返回首页</a></p></div>"#,
        code = status.as_u16(),
        msg = esc(message),
    );
    layout("出错了", None, &body)
}
