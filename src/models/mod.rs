use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::InteractionValues;
use crate::error::{FeedError, Result};

/// A timestamped, typed user-item event with a normalized strength value.
///
/// Immutable once created: the interaction log is append-only and entries
/// are never mutated or deleted for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: String,
    pub item_id: String,
    pub interaction_type: InteractionType,
    pub timestamp: DateTime<Utc>,
    /// Normalized strength in [0, 1].
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    View,
    Like,
    Comment,
    Save,
    Share,
    TimeSpent,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::View => "view",
            InteractionType::Like => "like",
            InteractionType::Comment => "comment",
            InteractionType::Save => "save",
            InteractionType::Share => "share",
            InteractionType::TimeSpent => "time_spent",
        }
    }

    /// Configured base strength for an interaction of this type.
    pub fn base_value(&self, values: &InteractionValues) -> f64 {
        match self {
            InteractionType::View => values.view,
            InteractionType::Like => values.like,
            InteractionType::Comment => values.comment,
            InteractionType::Save => values.save,
            InteractionType::Share => values.share,
            InteractionType::TimeSpent => values.default,
        }
    }
}

impl Interaction {
    pub fn new(
        user_id: impl Into<String>,
        item_id: impl Into<String>,
        interaction_type: InteractionType,
        timestamp: DateTime<Utc>,
        value: f64,
    ) -> Result<Self> {
        let interaction = Self {
            user_id: user_id.into(),
            item_id: item_id.into(),
            interaction_type,
            timestamp,
            value,
        };
        interaction.validate()?;
        Ok(interaction)
    }

    /// Rejects malformed events: empty IDs or a strength outside [0, 1].
    pub fn validate(&self) -> Result<()> {
        if self.user_id.is_empty() {
            return Err(FeedError::validation("interaction user_id is empty"));
        }
        if self.item_id.is_empty() {
            return Err(FeedError::validation("interaction item_id is empty"));
        }
        if !self.value.is_finite() || !(0.0..=1.0).contains(&self.value) {
            return Err(FeedError::Validation(format!(
                "interaction value {} outside [0, 1]",
                self.value
            )));
        }
        Ok(())
    }

    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        (now - self.timestamp).num_seconds().max(0) as f64 / 86_400.0
    }

    pub fn hours_ago(&self, now: DateTime<Utc>) -> f64 {
        (now - self.timestamp).num_seconds().max(0) as f64 / 3_600.0
    }
}

/// A public notebook as it appears in the feed.
///
/// Counters are mutated only through the session's interaction-recording
/// entry points; `ranking_score` is written by the ranker alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub page_count: u32,
    #[serde(default)]
    pub description_word_count: u32,
    #[serde(default)]
    pub average_content_length: f64,
    #[serde(default)]
    pub view_count: u32,
    #[serde(default)]
    pub like_count: u32,
    #[serde(default)]
    pub comment_count: u32,
    #[serde(default)]
    pub save_count: u32,
    #[serde(default)]
    pub share_count: u32,
    #[serde(default)]
    pub time_spent_seconds: f64,
    /// Whether the viewing user has liked this notebook. Session-local.
    #[serde(default)]
    pub is_liked: bool,
    /// Whether the viewing user has saved this notebook. Session-local.
    #[serde(default)]
    pub is_saved: bool,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub ranking_score: f64,
}

impl FeedItem {
    pub fn new(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            created_at,
            page_count: 0,
            description_word_count: 0,
            average_content_length: 0.0,
            view_count: 0,
            like_count: 0,
            comment_count: 0,
            save_count: 0,
            share_count: 0,
            time_spent_seconds: 0.0,
            is_liked: false,
            is_saved: false,
            comments: Vec::new(),
            ranking_score: 0.0,
        }
    }

    /// Content-shape attributes that feed the quality factor.
    pub fn with_content_shape(
        mut self,
        page_count: u32,
        description_word_count: u32,
        average_content_length: f64,
    ) -> Self {
        self.page_count = page_count;
        self.description_word_count = description_word_count;
        self.average_content_length = average_content_length;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(author: impl Into<String>, text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            author: author.into(),
            text: text.into(),
            created_at,
        }
    }
}
