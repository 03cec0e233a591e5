use std::fmt;

use anyhow::Result;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::classifier::{ClassCode, ClassCodeClassifier};
use crate::config::{ClassifierConfig, RiskConfig, ScoreBand};
use crate::model::BusinessDetails;
use crate::sentiment::OverallSentiment;

pub const FAST_FOOD_INELIGIBLE: &str =
    "Fast Food Restaurants are ineligible per underwriting guidelines";
pub const CRITICAL_CONCERNS_INELIGIBLE: &str = "Critical safety concerns identified in reviews";
pub const HIGH_POSITIVE_FACTOR: &str = "High percentage of positive reviews";
pub const HIGH_NEGATIVE_FACTOR: &str = "High percentage of negative reviews";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// Underwriting gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Eligibility {
    Eligible,
    Ineligible,
    NeedsReview,
}

impl fmt::Display for Eligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eligible => "ELIGIBLE",
            Self::Ineligible => "INELIGIBLE",
            Self::NeedsReview => "NEEDS_REVIEW",
        })
    }
}

/// How the risk score was reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskBreakdown {
    /// Positive percentage after the sanity clamp.
    pub effective_positive_percentage: f64,
    /// Negative percentage after the sanity clamp.
    pub effective_negative_percentage: f64,
    pub clamped: bool,
    pub positive_points: i32,
    pub negative_points: i32,
    pub critical_keywords: Vec<String>,
    pub critical_points: i32,
    pub total_score: i32,
}

impl RiskBreakdown {
    pub fn critical_found(&self) -> bool {
        !self.critical_keywords.is_empty()
    }
}

/// Verdict of one assessment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub class_code: ClassCode,
    pub eligibility: Eligibility,
    pub confidence: f64,
    pub ineligible_criteria: Vec<String>,
    pub positive_factors: Vec<String>,
    pub negative_factors: Vec<String>,
    pub score_breakdown: RiskBreakdown,
}

/// Point-based scorer turning aggregated sentiment and business type into a tier and verdict.
#[derive(Debug, Clone)]
pub struct RiskScorer {
    config: RiskConfig,
    classifier: ClassCodeClassifier,
}

impl RiskScorer {
    /// Critical keywords are lowercased to match the keys of the keyword frequency maps.
    pub fn new(mut config: RiskConfig, classifier: ClassCodeClassifier) -> Self {
        for keyword in &mut config.critical_keywords {
            *keyword = keyword.trim().to_lowercase();
        }
        Self { config, classifier }
    }

    #[instrument(name = "assess_risk", skip_all, fields(total_reviews = sentiment.total_reviews))]
    pub fn assess(&self, sentiment: &OverallSentiment, business: &BusinessDetails) -> RiskAssessment {
        let score_breakdown = self.score(sentiment);
        let critical_found = score_breakdown.critical_found();
        let (risk_level, confidence) = self.tier(score_breakdown.total_score, critical_found);
        let class_code = self.classifier.class_code(business);

        let mut ineligible_criteria = Vec::new();
        if class_code == ClassCode::FastFood {
            ineligible_criteria.push(FAST_FOOD_INELIGIBLE.to_string());
        }
        if critical_found {
            ineligible_criteria.push(CRITICAL_CONCERNS_INELIGIBLE.to_string());
        }

        let eligibility = if !ineligible_criteria.is_empty() {
            Eligibility::Ineligible
        } else if risk_level == RiskLevel::High {
            Eligibility::NeedsReview
        } else {
            Eligibility::Eligible
        };

        debug!(
            score = score_breakdown.total_score,
            critical = ?score_breakdown.critical_keywords,
            %risk_level,
            %eligibility,
            %class_code,
            "risk assessed"
        );

        RiskAssessment {
            risk_level,
            class_code,
            eligibility,
            confidence,
            ineligible_criteria,
            positive_factors: self.positive_factors(sentiment),
            negative_factors: self.negative_factors(sentiment),
            score_breakdown,
        }
    }

    /// Apply the sanity clamp and the point system. Positive and negative bands are independent.
    pub fn score(&self, sentiment: &OverallSentiment) -> RiskBreakdown {
        let clamp = &self.config.clamp;
        let mut positive = sentiment.positive_percentage;
        let mut negative = sentiment.negative_percentage;
        let mut clamped = false;
        if sentiment.total_reviews > clamp.min_reviews {
            if positive > clamp.positive_trigger {
                debug!(positive, ceiling = clamp.positive_ceiling, "clamping implausible positive share");
                positive = clamp.positive_ceiling;
                clamped = true;
            }
            if negative < clamp.negative_trigger {
                debug!(negative, floor = clamp.negative_floor, "raising implausible negative share");
                negative = clamp.negative_floor;
                clamped = true;
            }
        }

        let positive_points = band_points(&self.config.positive_bands, positive);
        let negative_points = band_points(&self.config.negative_bands, negative);
        let critical_keywords: Vec<String> = self
            .config
            .critical_keywords
            .iter()
            .filter(|keyword| sentiment.negative_keyword_frequency.contains_key(keyword.as_str()))
            .cloned()
            .collect();
        let critical_points = self.config.critical_keyword_points * critical_keywords.len() as i32;

        RiskBreakdown {
            effective_positive_percentage: positive,
            effective_negative_percentage: negative,
            clamped,
            positive_points,
            negative_points,
            critical_keywords,
            critical_points,
            total_score: positive_points + negative_points + critical_points,
        }
    }

    /// Critical keywords force the high tier regardless of score.
    pub fn tier(&self, score: i32, critical_found: bool) -> (RiskLevel, f64) {
        if score <= self.config.low_max_score && !critical_found {
            (RiskLevel::Low, self.config.low_confidence)
        } else if score <= self.config.medium_max_score && !critical_found {
            (RiskLevel::Medium, self.config.medium_confidence)
        } else {
            (RiskLevel::High, self.config.high_confidence)
        }
    }

    // Factors describe the observed (unclamped) sentiment.
    fn positive_factors(&self, sentiment: &OverallSentiment) -> Vec<String> {
        let mut factors = Vec::new();
        if sentiment.positive_percentage >= self.config.positive_factor_percentage {
            factors.push(HIGH_POSITIVE_FACTOR.to_string());
        }
        factors.extend(
            sentiment
                .positive_keyword_frequency
                .iter()
                .filter(|(_, count)| **count >= self.config.positive_keyword_min_mentions)
                .map(|(keyword, _)| format!("Multiple mentions of '{keyword}'")),
        );
        factors
    }

    fn negative_factors(&self, sentiment: &OverallSentiment) -> Vec<String> {
        let mut factors = Vec::new();
        if sentiment.negative_percentage >= self.config.negative_factor_percentage {
            factors.push(HIGH_NEGATIVE_FACTOR.to_string());
        }
        factors.extend(
            sentiment
                .negative_keyword_frequency
                .iter()
                .filter(|(_, count)| **count >= self.config.negative_keyword_min_mentions)
                .map(|(keyword, _)| format!("Mentions of '{keyword}'")),
        );
        factors
    }
}

fn band_points(bands: &[ScoreBand], percentage: f64) -> i32 {
    bands
        .iter()
        .find(|band| percentage >= band.min_percentage)
        .map(|band| band.points)
        .unwrap_or(0)
}

static DEFAULT_SCORER: Lazy<RiskScorer> = Lazy::new(|| {
    let classifier = ClassCodeClassifier::new(ClassifierConfig::default())
        .expect("built-in classifier lexicons compile");
    RiskScorer::new(RiskConfig::default(), classifier)
});

/// Assess risk with the built-in guidelines.
pub fn assess_risk(sentiment: &OverallSentiment, business: &BusinessDetails) -> RiskAssessment {
    DEFAULT_SCORER.assess(sentiment, business)
}

/// Build a scorer with a custom risk configuration and the default classifier.
pub fn scorer_with(config: RiskConfig) -> Result<RiskScorer> {
    Ok(RiskScorer::new(
        config,
        ClassCodeClassifier::new(ClassifierConfig::default())?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Rating, Review};
    use crate::sentiment::aggregate_sentiment;
    use std::collections::BTreeMap;

    fn sentiment(total: usize, positive: f64, negative: f64) -> OverallSentiment {
        OverallSentiment {
            total_reviews: total,
            positive_percentage: positive,
            negative_percentage: negative,
            neutral_percentage: 100.0 - positive - negative,
            ..OverallSentiment::default()
        }
    }

    fn with_negative_keywords(mut overall: OverallSentiment, keywords: &[(&str, usize)]) -> OverallSentiment {
        overall.negative_keyword_frequency = keywords
            .iter()
            .map(|(keyword, count)| ((*keyword).to_string(), *count))
            .collect::<BTreeMap<_, _>>();
        overall
    }

    fn restaurant() -> BusinessDetails {
        BusinessDetails {
            name: "Harbor Bistro".into(),
            categories: vec![Category::new("restaurants", "Restaurants")],
            ..BusinessDetails::default()
        }
    }

    fn fast_food() -> BusinessDetails {
        BusinessDetails {
            name: "Burger Express".into(),
            price: Some("$".into()),
            categories: vec![Category::new("hotdogs", "Fast Food")],
            ..BusinessDetails::default()
        }
    }

    #[test]
    fn critical_keyword_overrides_positive_sentiment() {
        let overall = with_negative_keywords(sentiment(20, 90.0, 5.0), &[("hazard", 1)]);
        let assessment = assess_risk(&overall, &restaurant());
        assert_eq!(assessment.risk_level, RiskLevel::High);
        assert_ne!(assessment.eligibility, Eligibility::Eligible);
        assert_eq!(assessment.eligibility, Eligibility::Ineligible);
        assert_eq!(
            assessment.ineligible_criteria,
            vec![CRITICAL_CONCERNS_INELIGIBLE.to_string()]
        );
        assert_eq!(assessment.score_breakdown.critical_keywords, vec!["hazard".to_string()]);
        assert_eq!(assessment.score_breakdown.total_score, -3 + 2);
        assert!((assessment.confidence - 0.80).abs() < f64::EPSILON);
    }

    #[test]
    fn each_critical_keyword_adds_points() {
        let overall = with_negative_keywords(
            sentiment(5, 0.0, 0.0),
            &[("bugs", 2), ("violation", 1), ("slow", 4)],
        );
        let breakdown = DEFAULT_SCORER.score(&overall);
        assert_eq!(breakdown.critical_keywords, vec!["violation".to_string(), "bugs".to_string()]);
        assert_eq!(breakdown.critical_points, 4);
        assert_eq!(breakdown.total_score, 4);
    }

    #[test]
    fn saturated_positive_share_is_clamped() {
        let overall = sentiment(50, 100.0, 0.0);
        let breakdown = DEFAULT_SCORER.score(&overall);
        assert!(breakdown.clamped);
        assert_eq!(breakdown.effective_positive_percentage, 85.0);
        assert_eq!(breakdown.effective_negative_percentage, 5.0);
        assert_eq!(breakdown.total_score, -3);
        assert_eq!(assess_risk(&overall, &restaurant()).risk_level, RiskLevel::Low);
    }

    #[test]
    fn clamp_changes_outcome_when_bands_are_tight() {
        let mut config = RiskConfig::default();
        config.positive_bands = vec![ScoreBand::new(90.0, -3), ScoreBand::new(50.0, -1)];
        let scorer = scorer_with(config).unwrap();
        let large = scorer.assess(&sentiment(50, 100.0, 0.0), &restaurant());
        assert_eq!(large.score_breakdown.total_score, -1);
        assert_eq!(large.risk_level, RiskLevel::Medium);
        // ten reviews is not enough to trigger the clamp
        let small = scorer.assess(&sentiment(10, 100.0, 0.0), &restaurant());
        assert!(!small.score_breakdown.clamped);
        assert_eq!(small.risk_level, RiskLevel::Low);
    }

    #[test]
    fn critical_keywords_match_regardless_of_configured_case() {
        let reviews: Vec<Review> = (0..5)
            .map(|idx| {
                Review::new(
                    format!("r{idx}"),
                    Rating::new(5.0).unwrap(),
                    "Great food, but a fire hazard by the exit",
                )
            })
            .collect();
        let overall = aggregate_sentiment(&reviews, None);
        assert_eq!(overall.negative_keyword_frequency.get("hazard"), Some(&5));

        let mut config = RiskConfig::default();
        config.critical_keywords = vec!["Hazard".into(), " BUGS ".into()];
        let assessment = scorer_with(config).unwrap().assess(&overall, &restaurant());
        assert_eq!(assessment.score_breakdown.critical_keywords, vec!["hazard".to_string()]);
        assert_eq!(assessment.eligibility, Eligibility::Ineligible);
        assert_eq!(assessment.risk_level, RiskLevel::High);
    }

    #[test]
    fn positive_and_negative_bands_both_apply() {
        let breakdown = DEFAULT_SCORER.score(&sentiment(8, 55.0, 45.0));
        assert_eq!(breakdown.positive_points, -1);
        assert_eq!(breakdown.negative_points, 3);
        assert_eq!(breakdown.total_score, 2);
    }

    #[test]
    fn tier_boundaries() {
        let scorer = &*DEFAULT_SCORER;
        assert_eq!(scorer.tier(-2, false), (RiskLevel::Low, 0.85));
        assert_eq!(scorer.tier(-1, false), (RiskLevel::Medium, 0.75));
        assert_eq!(scorer.tier(1, false), (RiskLevel::Medium, 0.75));
        assert_eq!(scorer.tier(2, false), (RiskLevel::High, 0.80));
        assert_eq!(scorer.tier(-5, true), (RiskLevel::High, 0.80));
    }

    #[test]
    fn high_tier_without_ineligibility_needs_review() {
        let assessment = assess_risk(&sentiment(12, 20.0, 50.0), &restaurant());
        assert_eq!(assessment.risk_level, RiskLevel::High);
        assert_eq!(assessment.eligibility, Eligibility::NeedsReview);
        assert!(assessment.ineligible_criteria.is_empty());
        assert_eq!(
            assessment.negative_factors,
            vec![HIGH_NEGATIVE_FACTOR.to_string()]
        );
    }

    #[test]
    fn fast_food_is_ineligible_even_with_great_reviews() {
        let assessment = assess_risk(&sentiment(9, 90.0, 0.0), &fast_food());
        assert_eq!(assessment.class_code, ClassCode::FastFood);
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert_eq!(assessment.eligibility, Eligibility::Ineligible);
        assert_eq!(
            assessment.ineligible_criteria,
            vec![FAST_FOOD_INELIGIBLE.to_string()]
        );
    }

    #[test]
    fn factor_thresholds_are_asymmetric() {
        let mut overall = sentiment(10, 70.0, 30.0);
        overall.positive_keyword_frequency =
            [("clean".to_string(), 2), ("fresh".to_string(), 1)].into_iter().collect();
        overall.negative_keyword_frequency =
            [("rude".to_string(), 1), ("slow".to_string(), 3)].into_iter().collect();
        let assessment = assess_risk(&overall, &restaurant());
        assert_eq!(
            assessment.positive_factors,
            vec![
                HIGH_POSITIVE_FACTOR.to_string(),
                "Multiple mentions of 'clean'".to_string()
            ]
        );
        assert_eq!(
            assessment.negative_factors,
            vec![
                HIGH_NEGATIVE_FACTOR.to_string(),
                "Mentions of 'rude'".to_string(),
                "Mentions of 'slow'".to_string()
            ]
        );
    }

    #[test]
    fn mostly_five_star_batch_is_low_risk_and_eligible() {
        let mut reviews: Vec<Review> = (0..8)
            .map(|idx| {
                Review::new(
                    format!("five-{idx}"),
                    Rating::new(5.0).unwrap(),
                    "Great food and friendly staff",
                )
            })
            .collect();
        reviews.extend((0..2).map(|idx| {
            Review::new(
                format!("two-{idx}"),
                Rating::new(2.0).unwrap(),
                "Service was slow and the fries were cold",
            )
        }));

        let overall = aggregate_sentiment(&reviews, None);
        assert_eq!(overall.positive_percentage, 80.0);
        assert_eq!(overall.negative_percentage, 20.0);

        let assessment = assess_risk(&overall, &restaurant());
        assert_eq!(assessment.score_breakdown.total_score, -2);
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert_eq!(assessment.eligibility, Eligibility::Eligible);
        assert_eq!(assessment.class_code, ClassCode::FullServiceRestaurant);
        assert!(assessment
            .positive_factors
            .contains(&"Multiple mentions of 'friendly'".to_string()));
        assert_eq!(assessment.negative_factors, vec!["Mentions of 'slow'".to_string()]);
    }

    #[test]
    fn empty_sentiment_scores_as_medium() {
        let assessment = assess_risk(&OverallSentiment::default(), &BusinessDetails::default());
        assert_eq!(assessment.score_breakdown.total_score, 0);
        assert_eq!(assessment.risk_level, RiskLevel::Medium);
        assert_eq!(assessment.eligibility, Eligibility::Eligible);
        assert!(assessment.positive_factors.is_empty());
        assert!(assessment.negative_factors.is_empty());
    }

    #[test]
    fn verdict_enums_serialize_in_report_casing() {
        assert_eq!(
            serde_json::to_string(&Eligibility::NeedsReview).unwrap(),
            "\"NEEDS_REVIEW\""
        );
        assert_eq!(serde_json::to_string(&RiskLevel::Medium).unwrap(), "\"medium\"");
        assert_eq!(Eligibility::Ineligible.to_string(), "INELIGIBLE");
    }
}
