//! Prompt text for classification and summarization.

use crate::notes::types::KnowledgePoint;

/// Longest slice of a single note sent to the summarizer.
pub const SUMMARY_POINT_CHARS: usize = 500;

/// Existing topic names listed in the classification prompt.
const MAX_LISTED_TOPICS: usize = 50;

pub const CLASSIFY_SYSTEM: &str = "你是一个学习笔记整理助手。你会阅读用户随手记下的学习笔记，\
为其归类主题、提取标签并拟定简短标题。只输出合法的 JSON，不要输出任何其他内容。";

pub const SUMMARY_SYSTEM: &str = "你是一个学习笔记整理助手。你会阅读同一主题下的多条学习笔记，\
用简洁的中文总结用户在该主题下学到了什么。";

/// User prompt asking the model to classify one note.
pub fn classification_prompt(content: &str, existing_topics: &[String]) -> String {
    let topics = if existing_topics.is_empty() {
        "（暂无）".to_string()
    } else {
        existing_topics
            .iter()
            .take(MAX_LISTED_TOPICS)
            .map(|t| format!("- {t}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"请分析下面这条学习笔记。

已有主题：
{topics}

笔记内容：
"""
{content}
"""

要求：
1. 如果已有主题中有合适的，请直接使用该主题名称；否则新建一个简短的主题名称（不超过 10 个字）。
2. 提取 1-5 个标签，每个标签不超过 10 个字。
3. 为笔记拟定一个不超过 20 个字的标题。

请严格按照以下 JSON 格式回复：
{{"topic": "主题名称", "tags": ["标签1", "标签2"], "title": "笔记标题"}}"#
    )
}

/// User prompt asking the model to summarize a topic's points.
pub fn summary_prompt(topic: &str, points: &[KnowledgePoint]) -> String {
    let notes = points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let body: String = p.content.chars().take(SUMMARY_POINT_CHARS).collect();
            format!("{}. {}\n{}", i + 1, p.title, body)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "主题：{topic}\n\n以下是该主题下的 {count} 条笔记：\n\n{notes}\n\n\
         请用 3-6 句话总结这些笔记的核心知识点，指出它们之间的联系。\
         直接输出总结正文，不要使用 JSON 或代码块。",
        count = points.len()
    )
}
