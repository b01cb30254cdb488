use serde::Deserialize;

use crate::error::{FeedError, Result};

/// Tunables for the ranking and recommendation pipeline.
///
/// Defaults match the production scoring behavior; every knob can be
/// overridden through `FEED_RANKING_*` environment variables via
/// [`RankingConfig::from_env`].
#[derive(Debug, Clone)]
pub struct RankingConfig {
    /// Minimum stored similarity for a neighbor to contribute to a
    /// prediction. Applied at prediction time only; the matrices store
    /// raw similarity for every pair with at least one common key.
    pub similarity_threshold: f64,
    pub engagement: EngagementWeights,
    pub composite: CompositeWeights,
    pub interaction_values: InteractionValues,
    /// Interactions older than this contribute zero decayed value.
    pub max_interaction_age_days: f64,
    /// Dwell time at which a time-spent interaction saturates to 1.0.
    pub time_spent_cap_secs: f64,
    /// Blend weight of the user-based collaborative-filtering score.
    pub user_cf_weight: f64,
    /// Blend weight of the item-based collaborative-filtering score.
    pub item_cf_weight: f64,
    /// Neutral recommendation score used when no predictor is wired in.
    pub default_recommendation_score: f64,
    /// Only interactions within this window count towards user relevance.
    pub relevance_window_hours: f64,
    /// Relevance contribution of a single just-now interaction.
    pub relevance_per_interaction: f64,
}

/// Per-signal weights for the engagement factor.
#[derive(Debug, Clone)]
pub struct EngagementWeights {
    pub view: f64,
    pub like: f64,
    pub comment: f64,
    pub time_spent: f64,
    /// Weighted engagement sum at which the factor saturates to 1.0.
    pub saturation: f64,
}

impl Default for EngagementWeights {
    fn default() -> Self {
        Self {
            view: 1.0,
            like: 2.0,
            comment: 3.0,
            time_spent: 0.001,
            saturation: 100.0,
        }
    }
}

/// Weights of the four composite ranking factors.
#[derive(Debug, Clone)]
pub struct CompositeWeights {
    pub engagement: f64,
    pub relevance: f64,
    pub quality: f64,
    pub recommendation: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            engagement: 0.3,
            relevance: 0.2,
            quality: 0.2,
            recommendation: 0.3,
        }
    }
}

/// Base strength value recorded per interaction type.
#[derive(Debug, Clone)]
pub struct InteractionValues {
    pub view: f64,
    pub like: f64,
    pub comment: f64,
    pub save: f64,
    pub share: f64,
    /// Fallback for callers constructing raw interactions of an
    /// unclassified kind.
    pub default: f64,
}

impl Default for InteractionValues {
    fn default() -> Self {
        Self {
            view: 0.3,
            like: 0.8,
            comment: 1.0,
            save: 0.9,
            share: 0.7,
            default: 0.1,
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.3,
            engagement: EngagementWeights::default(),
            composite: CompositeWeights::default(),
            interaction_values: InteractionValues::default(),
            max_interaction_age_days: 30.0,
            time_spent_cap_secs: 300.0,
            user_cf_weight: 0.6,
            item_cf_weight: 0.4,
            default_recommendation_score: 0.5,
            relevance_window_hours: 24.0,
            relevance_per_interaction: 0.1,
        }
    }
}

/// Flat override set deserialized from the environment. Unset variables
/// leave the default in place.
#[derive(Debug, Deserialize)]
struct EnvOverrides {
    similarity_threshold: Option<f64>,
    view_weight: Option<f64>,
    like_weight: Option<f64>,
    comment_weight: Option<f64>,
    time_spent_weight: Option<f64>,
    engagement_saturation: Option<f64>,
    engagement_share: Option<f64>,
    relevance_share: Option<f64>,
    quality_share: Option<f64>,
    recommendation_share: Option<f64>,
    view_value: Option<f64>,
    like_value: Option<f64>,
    comment_value: Option<f64>,
    save_value: Option<f64>,
    share_value: Option<f64>,
    default_value: Option<f64>,
    max_interaction_age_days: Option<f64>,
    time_spent_cap_secs: Option<f64>,
    user_cf_weight: Option<f64>,
    item_cf_weight: Option<f64>,
    default_recommendation_score: Option<f64>,
    relevance_window_hours: Option<f64>,
    relevance_per_interaction: Option<f64>,
}

impl RankingConfig {
    /// Load configuration from the environment, overlaying any
    /// `FEED_RANKING_*` variables on the defaults.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let env: EnvOverrides = envy::prefixed("FEED_RANKING_")
            .from_env()
            .map_err(|e| FeedError::Config(e.to_string()))?;

        let mut config = Self::default();

        if let Some(v) = env.similarity_threshold {
            config.similarity_threshold = v;
        }
        if let Some(v) = env.view_weight {
            config.engagement.view = v;
        }
        if let Some(v) = env.like_weight {
            config.engagement.like = v;
        }
        if let Some(v) = env.comment_weight {
            config.engagement.comment = v;
        }
        if let Some(v) = env.time_spent_weight {
            config.engagement.time_spent = v;
        }
        if let Some(v) = env.engagement_saturation {
            config.engagement.saturation = v;
        }
        if let Some(v) = env.engagement_share {
            config.composite.engagement = v;
        }
        if let Some(v) = env.relevance_share {
            config.composite.relevance = v;
        }
        if let Some(v) = env.quality_share {
            config.composite.quality = v;
        }
        if let Some(v) = env.recommendation_share {
            config.composite.recommendation = v;
        }
        if let Some(v) = env.view_value {
            config.interaction_values.view = v;
        }
        if let Some(v) = env.like_value {
            config.interaction_values.like = v;
        }
        if let Some(v) = env.comment_value {
            config.interaction_values.comment = v;
        }
        if let Some(v) = env.save_value {
            config.interaction_values.save = v;
        }
        if let Some(v) = env.share_value {
            config.interaction_values.share = v;
        }
        if let Some(v) = env.default_value {
            config.interaction_values.default = v;
        }
        if let Some(v) = env.max_interaction_age_days {
            config.max_interaction_age_days = v;
        }
        if let Some(v) = env.time_spent_cap_secs {
            config.time_spent_cap_secs = v;
        }
        if let Some(v) = env.user_cf_weight {
            config.user_cf_weight = v;
        }
        if let Some(v) = env.item_cf_weight {
            config.item_cf_weight = v;
        }
        if let Some(v) = env.default_recommendation_score {
            config.default_recommendation_score = v;
        }
        if let Some(v) = env.relevance_window_hours {
            config.relevance_window_hours = v;
        }
        if let Some(v) = env.relevance_per_interaction {
            config.relevance_per_interaction = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the scoring math cannot work with.
    pub fn validate(&self) -> Result<()> {
        let unit_range = [
            ("similarity_threshold", self.similarity_threshold),
            ("view_value", self.interaction_values.view),
            ("like_value", self.interaction_values.like),
            ("comment_value", self.interaction_values.comment),
            ("save_value", self.interaction_values.save),
            ("share_value", self.interaction_values.share),
            ("default_value", self.interaction_values.default),
            (
                "default_recommendation_score",
                self.default_recommendation_score,
            ),
        ];
        for (name, value) in unit_range {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(FeedError::Config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        let positive = [
            ("engagement_saturation", self.engagement.saturation),
            ("max_interaction_age_days", self.max_interaction_age_days),
            ("time_spent_cap_secs", self.time_spent_cap_secs),
            ("relevance_window_hours", self.relevance_window_hours),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(FeedError::Config(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        let non_negative = [
            ("view_weight", self.engagement.view),
            ("like_weight", self.engagement.like),
            ("comment_weight", self.engagement.comment),
            ("time_spent_weight", self.engagement.time_spent),
            ("engagement_share", self.composite.engagement),
            ("relevance_share", self.composite.relevance),
            ("quality_share", self.composite.quality),
            ("recommendation_share", self.composite.recommendation),
            ("user_cf_weight", self.user_cf_weight),
            ("item_cf_weight", self.item_cf_weight),
            ("relevance_per_interaction", self.relevance_per_interaction),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(FeedError::Config(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_production_values() {
        let config = RankingConfig::default();
        assert!((config.similarity_threshold - 0.3).abs() < f64::EPSILON);
        assert!((config.engagement.comment - 3.0).abs() < f64::EPSILON);
        assert!((config.composite.recommendation - 0.3).abs() < f64::EPSILON);
        assert!((config.interaction_values.save - 0.9).abs() < f64::EPSILON);
        assert!((config.max_interaction_age_days - 30.0).abs() < f64::EPSILON);
        assert!((config.time_spent_cap_secs - 300.0).abs() < f64::EPSILON);
        assert!((config.user_cf_weight - 0.6).abs() < f64::EPSILON);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let config = RankingConfig {
            similarity_threshold: 1.5,
            ..RankingConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_saturation() {
        let mut config = RankingConfig::default();
        config.engagement.saturation = 0.0;
        assert!(config.validate().is_err());
    }
}
