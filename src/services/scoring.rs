//! Scoring engine
//!
//! Pure functions only: no I/O and no clock reads, everything comes in as arguments.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{
    error::{AppError, AppResult},
    models::{ContentItem, RecommendationResult, UserInterest},
};

pub const ENGAGEMENT_WEIGHT: f64 = 0.7;
pub const TAG_INTEREST_WEIGHT: f64 = 0.3;

/// Engagement assumed for content that has never been through a recompute
const DEFAULT_ENGAGEMENT: f64 = 0.5;

fn unit(value: f64) -> Option<f64> {
    value.is_finite().then(|| value.clamp(0.0, 1.0))
}

/// A user's interest scores keyed by tag id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterestProfile {
    by_tag: HashMap<String, f64>,
}

impl InterestProfile {
    /// Builds the lookup, clamping scores to [0,1]. Duplicate tags keep the highest score.
    pub fn from_interests(interests: &[UserInterest]) -> Self {
        let mut by_tag: HashMap<String, f64> = HashMap::with_capacity(interests.len());
        for interest in interests {
            let Some(score) = unit(interest.interest_score) else {
                continue;
            };
            by_tag
                .entry(interest.tag_id.clone())
                .and_modify(|existing| *existing = existing.max(score))
                .or_insert(score);
        }
        Self { by_tag }
    }

    pub fn interest_in(&self, tag_id: &str) -> f64 {
        self.by_tag.get(tag_id).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

/// Recommendation score of `content` for a user, in [0,1]
///
/// `engagement * 0.7 + tag_bonus * 0.3`, where `tag_bonus` is the user's average
/// interest across the content's tags (0 for untagged content).
pub fn score(profile: &InterestProfile, content: &ContentItem) -> f64 {
    let engagement = content
        .engagement_score
        .and_then(unit)
        .unwrap_or(DEFAULT_ENGAGEMENT);

    let tag_bonus = if content.tags.is_empty() {
        0.0
    } else {
        let total: f64 = content
            .tags
            .iter()
            .map(|tag| profile.interest_in(&tag.id))
            .sum();
        total / content.tags.len() as f64
    };

    (engagement * ENGAGEMENT_WEIGHT + tag_bonus * TAG_INTEREST_WEIGHT).clamp(0.0, 1.0)
}

pub fn is_valid_result(result: &RecommendationResult) -> bool {
    !result.content_id.is_empty()
        && (0.0..=1.0).contains(&result.score)
        && !result.reason.is_empty()
}

/// Time-decayed engagement formula used by the bulk recompute
///
/// `clamp((views + 5*likes + 10*shares) / (normalizer * 2^(age_hours / half_life_hours)), 0, 1)`,
/// so a content item's influence halves every `half_life_hours`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngagementFormula {
    /// Weighted interaction count that scores 1.0 at age zero
    pub normalizer: f64,
    pub half_life_hours: f64,
}

impl Default for EngagementFormula {
    fn default() -> Self {
        Self {
            normalizer: 100.0,
            half_life_hours: 24.0,
        }
    }
}

impl EngagementFormula {
    pub fn validate(&self) -> AppResult<()> {
        if !(self.normalizer.is_finite() && self.normalizer > 0.0) {
            return Err(AppError::InvalidInput(format!(
                "engagement normalizer must be positive, got {}",
                self.normalizer
            )));
        }
        if !(self.half_life_hours.is_finite() && self.half_life_hours > 0.0) {
            return Err(AppError::InvalidInput(format!(
                "engagement half-life must be positive, got {}",
                self.half_life_hours
            )));
        }
        Ok(())
    }

    pub fn score(&self, views: u64, likes: u64, shares: u64, age: Duration) -> f64 {
        let weighted = views as f64 + likes as f64 * 5.0 + shares as f64 * 10.0;
        let age_hours = (age.num_seconds().max(0) as f64) / 3600.0;
        let decay = 2f64.powf(age_hours / self.half_life_hours);

        (weighted / (self.normalizer * decay)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Tag, DEFAULT_REASON};
    use chrono::Utc;

    fn content(engagement: Option<f64>, tag_ids: &[&str]) -> ContentItem {
        ContentItem {
            id: "c1".to_string(),
            title: "Content".to_string(),
            tags: tag_ids
                .iter()
                .map(|id| Tag {
                    id: id.to_string(),
                    name: format!("name-{}", id),
                })
                .collect(),
            engagement_score: engagement,
            created_at: Utc::now(),
        }
    }

    fn interest(tag_id: &str, score: f64) -> UserInterest {
        UserInterest {
            user_id: "u1".to_string(),
            tag_id: tag_id.to_string(),
            interest_score: score,
        }
    }

    fn result(content_id: &str, score: f64, reason: &str) -> RecommendationResult {
        RecommendationResult {
            content_id: content_id.to_string(),
            title: "t".to_string(),
            tags: vec![],
            score,
            reason: reason.to_string(),
        }
    }

    #[test]
    fn test_tech_scenario_scores_0_74() {
        let profile = InterestProfile::from_interests(&[interest("tech", 0.6)]);
        let item = content(Some(0.8), &["tech"]);

        assert!((score(&profile, &item) - 0.74).abs() < 1e-9);
    }

    #[test]
    fn test_untagged_content_scores_engagement_only() {
        let profile = InterestProfile::from_interests(&[interest("tech", 1.0)]);
        let item = content(Some(0.4), &[]);

        assert!((score(&profile, &item) - 0.4 * 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_missing_engagement_defaults_to_half() {
        let profile = InterestProfile::default();
        let item = content(None, &[]);

        assert!((score(&profile, &item) - 0.35).abs() < 1e-9);
    }

    #[test]
    fn test_tag_bonus_averages_over_all_content_tags() {
        let profile = InterestProfile::from_interests(&[interest("a", 1.0), interest("b", 0.5)]);
        let item = content(Some(0.0), &["a", "b", "c", "d"]);

        // (1.0 + 0.5 + 0 + 0) / 4 = 0.375
        assert!((score(&profile, &item) - 0.375 * 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_score_stays_in_unit_interval_for_out_of_range_inputs() {
        let profile = InterestProfile::from_interests(&[interest("a", 7.0), interest("b", -3.0)]);
        let cases = [
            content(Some(12.0), &["a"]),
            content(Some(-1.0), &["b"]),
            content(Some(f64::NAN), &["a", "b"]),
            content(Some(1.0), &["a", "a"]),
        ];

        for item in &cases {
            let s = score(&profile, item);
            assert!((0.0..=1.0).contains(&s), "score {} out of range", s);
        }
    }

    #[test]
    fn test_duplicate_interest_rows_keep_highest() {
        let profile = InterestProfile::from_interests(&[interest("a", 0.2), interest("a", 0.9)]);
        assert_eq!(profile.interest_in("a"), 0.9);
        assert_eq!(profile.interest_in("missing"), 0.0);
    }

    #[test]
    fn test_is_valid_result() {
        assert!(is_valid_result(&result("c1", 0.5, DEFAULT_REASON)));
        assert!(is_valid_result(&result("c1", 0.0, DEFAULT_REASON)));
        assert!(is_valid_result(&result("c1", 1.0, DEFAULT_REASON)));

        assert!(!is_valid_result(&result("", 0.5, DEFAULT_REASON)));
        assert!(!is_valid_result(&result("c1", 1.01, DEFAULT_REASON)));
        assert!(!is_valid_result(&result("c1", -0.01, DEFAULT_REASON)));
        assert!(!is_valid_result(&result("c1", f64::NAN, DEFAULT_REASON)));
        assert!(!is_valid_result(&result("c1", 0.5, "")));
    }

    #[test]
    fn test_engagement_formula_halves_every_half_life() {
        let formula = EngagementFormula::default();

        let fresh = formula.score(20, 0, 0, Duration::zero());
        let day_old = formula.score(20, 0, 0, Duration::hours(24));
        let two_days_old = formula.score(20, 0, 0, Duration::hours(48));

        assert!((fresh - 0.2).abs() < 1e-9);
        assert!((day_old - 0.1).abs() < 1e-9);
        assert!((two_days_old - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_engagement_formula_weights_and_clamp() {
        let formula = EngagementFormula::default();

        // 10 + 5*2 + 10*1 = 30
        assert!((formula.score(10, 2, 1, Duration::zero()) - 0.3).abs() < 1e-9);
        assert_eq!(formula.score(10_000, 0, 0, Duration::zero()), 1.0);
        assert_eq!(formula.score(0, 0, 0, Duration::hours(3)), 0.0);
    }

    #[test]
    fn test_engagement_formula_validation() {
        assert!(EngagementFormula::default().validate().is_ok());
        assert!(EngagementFormula {
            normalizer: 0.0,
            half_life_hours: 24.0
        }
        .validate()
        .is_err());
        assert!(EngagementFormula {
            normalizer: 100.0,
            half_life_hours: f64::INFINITY
        }
        .validate()
        .is_err());
    }
}
