//! Lenient parsing of model output.
//!
//! Models wrap JSON in code fences, add chatter around it, or leave fields
//! out. Nothing here returns an error: unusable output degrades to defaults.

use serde::Deserialize;

use crate::notes::points::derive_title;
use crate::notes::tags::normalize_tags;
use crate::notes::topics::normalize_topic_name;
use crate::notes::types::UNCATEGORIZED;

/// Classification of one note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteAnalysis {
    pub topic: String,
    pub tags: Vec<String>,
    pub title: String,
    /// `true` when the model output could not be used and defaults were applied.
    pub fallback: bool,
}

impl NoteAnalysis {
    /// Defaults for unusable model output.
    pub fn fallback(content: &str) -> Self {
        Self {
            topic: UNCATEGORIZED.to_string(),
            tags: Vec::new(),
            title: derive_title(content),
            fallback: true,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawAnalysis {
    topic: Option<String>,
    tags: Option<TagsField>,
    title: Option<String>,
}

/// Models sometimes return tags as one comma-separated string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TagsField {
    List(Vec<String>),
    Joined(String),
}

impl TagsField {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::List(tags) => tags,
            Self::Joined(s) => s
                .split([',', '，', '、'])
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Pull the JSON payload out of a model reply.
///
/// Handles ```json fenced blocks, bare fences, and otherwise the span from
/// the first `{` to the last `}`.
pub fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    if let Some(start) = trimmed.find("```json") {
        let json_start = start + "```json".len();
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = start + 3;
        let json_start = trimmed[after..].find('{').map_or(after, |pos| after + pos);
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return &trimmed[start..=end];
        }
    }

    trimmed
}

/// Parse a classification reply, falling back to defaults field by field.
pub fn parse_classification(response: &str, content: &str) -> NoteAnalysis {
    let json = extract_json(response);
    let raw: RawAnalysis = match serde_json::from_str(json) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable classification, using fallback");
            return NoteAnalysis::fallback(content);
        }
    };

    let topic = raw
        .topic
        .filter(|t| !t.trim().is_empty())
        .map(|t| normalize_topic_name(&t))
        .unwrap_or_else(|| UNCATEGORIZED.to_string());
    let tags = normalize_tags(&raw.tags.map(TagsField::into_vec).unwrap_or_default());
    let title = raw
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| derive_title(content));

    NoteAnalysis {
        topic,
        tags,
        title,
        fallback: false,
    }
}

/// Clean a summary reply. Empty output is `None`.
pub fn parse_summary(response: &str) -> Option<String> {
    let mut text = response.trim();

    // Strip a code fence if the model wrapped the whole reply in one
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.split_once('\n').map_or("", |(_, body)| body);
        text = rest.trim_end().strip_suffix("```").unwrap_or(rest).trim();
    }

    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
