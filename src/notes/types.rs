//! Core note type definitions.
//!
//! Defines [`PointStatus`] (the three analysis states a note moves through),
//! [`KnowledgePoint`] (a captured note), [`Topic`] and [`Tag`].

use serde::{Deserialize, Serialize};

/// Topic name given to notes the classifier could not place.
pub const UNCATEGORIZED: &str = "未分类";

/// Analysis state of a knowledge point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointStatus {
    /// Saved, waiting for (or undergoing) LLM classification.
    Processing,
    /// Classified into a topic with tags.
    Completed,
    /// The LLM call failed; the note can be retried.
    Failed,
}

impl PointStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Label shown in the UI.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Processing => "正在分析",
            Self::Completed => "已完成",
            Self::Failed => "分析失败",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

impl std::fmt::Display for PointStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PointStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("unknown point status: {s}")),
        }
    }
}

/// A captured note, matching the `knowledge_points` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgePoint {
    /// UUID v7 (time-sortable) primary key.
    pub id: String,
    pub user_id: String,
    /// Assigned topic once analysis completes.
    pub topic_id: Option<String>,
    pub title: String,
    pub content: String,
    pub status: PointStatus,
    /// Provider error text for `failed` points.
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A topic, matching the `topics` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: String,
    /// AI-generated summary of the topic's points.
    pub summary: Option<String>,
    pub summary_updated_at: Option<String>,
    /// Completed points the current summary was generated from.
    pub summary_point_count: u32,
    pub created_at: String,
    pub updated_at: String,
}

/// A topic together with its live count of completed points.
#[derive(Debug, Clone, Serialize)]
pub struct TopicOverview {
    #[serde(flatten)]
    pub topic: Topic,
    pub point_count: u32,
}

impl TopicOverview {
    /// The summary no longer reflects the topic's points.
    pub fn summary_is_stale(&self) -> bool {
        self.topic.summary_point_count != self.point_count
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagCount {
    pub name: String,
    pub point_count: u32,
}
