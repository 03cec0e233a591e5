use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Immutable tables and thresholds shared by every stage of the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnderwritingConfig {
    pub sentiment: SentimentConfig,
    pub classifier: ClassifierConfig,
    pub risk: RiskConfig,
}

impl UnderwritingConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.sentiment.validate()?;
        self.classifier.validate()?;
        self.risk.validate()
    }

    /// Critical keywords absent from `sentiment.negative_indicators`. Critical concerns are
    /// looked up in the negative keyword frequencies, so these can never trigger.
    pub fn unreachable_critical_keywords(&self) -> Vec<&str> {
        self.risk
            .critical_keywords
            .iter()
            .map(String::as_str)
            .filter(|keyword| {
                let keyword = keyword.trim();
                !self
                    .sentiment
                    .negative_indicators
                    .iter()
                    .any(|indicator| indicator.trim().eq_ignore_ascii_case(keyword))
            })
            .collect()
    }
}

/// Thresholds and indicator lexicons for review and image sentiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    /// Reviews at or above this compound score are positive.
    pub positive_compound: f64,
    /// Reviews at or below this compound score are negative (unless already positive).
    pub negative_compound: f64,
    /// Reviews rated at or above this are positive regardless of text.
    pub positive_rating: f64,
    /// Reviews rated at or below this are negative unless already positive.
    pub negative_rating: f64,
    pub image_positive_compound: f64,
    pub image_negative_compound: f64,
    pub positive_indicators: Vec<String>,
    pub negative_indicators: Vec<String>,
    /// Extra polarity lexicon in VADER's tab-separated format, such as the published
    /// `vader_lexicon.txt`. Its entries replace built-in valences for the same token.
    pub lexicon_path: Option<PathBuf>,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            positive_compound: 0.2,
            negative_compound: -0.1,
            positive_rating: 4.0,
            negative_rating: 2.0,
            image_positive_compound: 0.05,
            image_negative_compound: -0.05,
            lexicon_path: None,
            positive_indicators: terms(&[
                "professional",
                "clean",
                "safety",
                "maintained",
                "trained",
                "spotless",
                "excellent",
                "organized",
                "well-managed",
                "delicious",
                "attentive",
                "friendly",
                "efficient",
                "prompt",
                "fresh",
                "quality",
                "consistent",
                "hygienic",
                "well-trained",
                "thorough",
                "immaculate",
                "compliant",
                "reliable",
                "careful",
                "diligent",
                "secure",
            ]),
            negative_indicators: terms(&[
                "hazard",
                "dirty",
                "violation",
                "unsafe",
                "equipment failure",
                "bugs",
                "unclean",
                "untrained",
                "messy",
                "accident",
                "unsanitary",
                "dangerous",
                "negligent",
                "broken",
                "contaminated",
                "slow",
                "rude",
                "spoiled",
                "expired",
                "rats",
                "mice",
                "insects",
                "mold",
                "illness",
                "sick",
                "food poisoning",
                "health code",
                "complaint",
                "health department",
                "careless",
                "unhygienic",
                "uncooked",
                "undercooked",
                "fire",
                "damaged",
            ]),
        }
    }
}

impl SentimentConfig {
    fn validate(&self) -> Result<(), ConfigValidationError> {
        validate_terms("sentiment.positive_indicators", &self.positive_indicators)?;
        validate_terms("sentiment.negative_indicators", &self.negative_indicators)?;
        if self.negative_compound > self.positive_compound {
            return Err(ConfigValidationError::InvertedThresholds {
                field: "sentiment.negative_compound".into(),
            });
        }
        if self.image_negative_compound > self.image_positive_compound {
            return Err(ConfigValidationError::InvertedThresholds {
                field: "sentiment.image_negative_compound".into(),
            });
        }
        Ok(())
    }
}

/// Keyword template for one business type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordFamily {
    /// Terms matched against the joined category titles.
    pub category_terms: Vec<String>,
    /// Terms matched against the business name; any hit awards the name bonus once.
    pub name_terms: Vec<String>,
    /// Multiplier applied to the family's category hit count.
    pub weight: i32,
}

impl Default for KeywordFamily {
    fn default() -> Self {
        Self {
            category_terms: Vec::new(),
            name_terms: Vec::new(),
            weight: 1,
        }
    }
}

impl KeywordFamily {
    fn new(weight: i32, category_terms: &[&str], name_terms: &[&str]) -> Self {
        Self {
            category_terms: terms(category_terms),
            name_terms: terms(name_terms),
            weight,
        }
    }
}

/// Business-type templates and tie-break thresholds for class-code selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub nightclub: KeywordFamily,
    /// Alcohol-related terms; drives the bar/tavern score.
    pub bar: KeywordFamily,
    pub fast_food: KeywordFamily,
    pub restaurant: KeywordFamily,
    pub name_bonus: i32,
    /// Added to the fast-food hit count for budget prices and the restaurant hit count for premium prices.
    pub price_bonus: i32,
    pub budget_price: String,
    pub premium_price: String,
    /// A nightclub win below this score is re-decided between bar and restaurant.
    pub nightclub_min_score: i32,
    /// A fast-food win below this score is demoted to restaurant.
    pub fast_food_min_score: i32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            nightclub: KeywordFamily::new(
                3,
                &[
                    "nightclub",
                    "night club",
                    "dance club",
                    "dancing",
                    "cabaret",
                    "disco",
                    "lounge",
                    "nightlife",
                    "entertainment",
                    "dj",
                    "live music",
                    "club",
                ],
                &["club", "lounge", "disco", "dance", "dj", "night"],
            ),
            bar: KeywordFamily::new(
                2,
                &[
                    "bar", "pub", "tavern", "brewery", "cocktail", "beer", "wine", "liquor",
                    "spirits", "whiskey", "vodka", "tequila", "drinks", "alcohol",
                ],
                &[
                    "bar", "pub", "tavern", "brewery", "brew", "beer", "wine", "spirits",
                ],
            ),
            fast_food: KeywordFamily::new(
                2,
                &[
                    "fast food",
                    "quick service",
                    "fast casual",
                    "drive-thru",
                    "drive through",
                    "takeout",
                    "take-out",
                    "take out",
                    "fast-food",
                    "quick-service",
                    "fast",
                    "quick",
                    "express",
                    "counter service",
                    "self-service",
                ],
                &[
                    "fast",
                    "quick",
                    "express",
                    "burger",
                    "pizza",
                    "mcdonald's",
                    "wendy",
                    "kfc",
                    "taco bell",
                    "subway",
                    "chipotle",
                    "drive",
                ],
            ),
            restaurant: KeywordFamily::new(
                1,
                &[
                    "restaurant",
                    "bistro",
                    "café",
                    "cafe",
                    "eatery",
                    "dining",
                    "grill",
                    "kitchen",
                    "chophouse",
                    "steakhouse",
                    "pizza",
                    "sushi",
                    "food",
                ],
                &[
                    "restaurant",
                    "bistro",
                    "café",
                    "cafe",
                    "grill",
                    "kitchen",
                    "steakhouse",
                    "eatery",
                    "dining",
                ],
            ),
            name_bonus: 2,
            price_bonus: 2,
            budget_price: "$".into(),
            premium_price: "$$$$".into(),
            nightclub_min_score: 3,
            fast_food_min_score: 2,
        }
    }
}

impl ClassifierConfig {
    fn validate(&self) -> Result<(), ConfigValidationError> {
        for (name, family) in [
            ("classifier.nightclub", &self.nightclub),
            ("classifier.bar", &self.bar),
            ("classifier.fast_food", &self.fast_food),
            ("classifier.restaurant", &self.restaurant),
        ] {
            validate_terms(&format!("{name}.category_terms"), &family.category_terms)?;
            validate_terms(&format!("{name}.name_terms"), &family.name_terms)?;
        }
        Ok(())
    }
}

/// Points awarded once a percentage reaches `min_percentage`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBand {
    pub min_percentage: f64,
    pub points: i32,
}

impl ScoreBand {
    pub const fn new(min_percentage: f64, points: i32) -> Self {
        Self {
            min_percentage,
            points,
        }
    }
}

/// Guards against implausibly unanimous sentiment on larger review sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanityClamp {
    /// The clamp only applies when strictly more reviews than this are present.
    pub min_reviews: usize,
    pub positive_trigger: f64,
    pub positive_ceiling: f64,
    pub negative_trigger: f64,
    pub negative_floor: f64,
}

impl Default for SanityClamp {
    fn default() -> Self {
        Self {
            min_reviews: 10,
            positive_trigger: 95.0,
            positive_ceiling: 85.0,
            negative_trigger: 5.0,
            negative_floor: 5.0,
        }
    }
}

/// Point system, tier ceilings and factor thresholds for the risk scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub clamp: SanityClamp,
    /// Evaluated highest first; the first band reached contributes its points.
    pub positive_bands: Vec<ScoreBand>,
    pub negative_bands: Vec<ScoreBand>,
    /// Matched case-insensitively against the negative keyword frequencies, so every entry
    /// must also be listed in `sentiment.negative_indicators` to have any effect.
    pub critical_keywords: Vec<String>,
    pub critical_keyword_points: i32,
    /// Highest score still rated low risk.
    pub low_max_score: i32,
    /// Highest score still rated medium risk.
    pub medium_max_score: i32,
    pub low_confidence: f64,
    pub medium_confidence: f64,
    pub high_confidence: f64,
    pub positive_factor_percentage: f64,
    pub negative_factor_percentage: f64,
    pub positive_keyword_min_mentions: usize,
    pub negative_keyword_min_mentions: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            clamp: SanityClamp::default(),
            positive_bands: vec![
                ScoreBand::new(80.0, -3),
                ScoreBand::new(70.0, -2),
                ScoreBand::new(50.0, -1),
            ],
            negative_bands: vec![
                ScoreBand::new(40.0, 3),
                ScoreBand::new(30.0, 2),
                ScoreBand::new(20.0, 1),
            ],
            critical_keywords: terms(&[
                "violation",
                "hazard",
                "unsafe",
                "accident",
                "injury",
                "bugs",
            ]),
            critical_keyword_points: 2,
            low_max_score: -2,
            medium_max_score: 1,
            low_confidence: 0.85,
            medium_confidence: 0.75,
            high_confidence: 0.80,
            positive_factor_percentage: 70.0,
            negative_factor_percentage: 30.0,
            positive_keyword_min_mentions: 2,
            negative_keyword_min_mentions: 1,
        }
    }
}

impl RiskConfig {
    fn validate(&self) -> Result<(), ConfigValidationError> {
        validate_bands("risk.positive_bands", &self.positive_bands)?;
        validate_bands("risk.negative_bands", &self.negative_bands)?;
        if self.critical_keywords.iter().any(|kw| kw.trim().is_empty()) {
            return Err(ConfigValidationError::BlankTerm {
                field: "risk.critical_keywords".into(),
            });
        }
        if self.low_max_score > self.medium_max_score {
            return Err(ConfigValidationError::InvertedThresholds {
                field: "risk.low_max_score".into(),
            });
        }
        for (field, value) in [
            ("risk.low_confidence", self.low_confidence),
            ("risk.medium_confidence", self.medium_confidence),
            ("risk.high_confidence", self.high_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigValidationError::InvalidConfidence {
                    field: field.into(),
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Errors emitted while validating configuration overrides.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigValidationError {
    #[error("`{field}` must contain at least one term")]
    EmptyTerms { field: String },
    #[error("`{field}` must not contain blank terms")]
    BlankTerm { field: String },
    #[error("`{field}` bands must be sorted by descending min_percentage")]
    UnsortedBands { field: String },
    #[error("`{field}` is ordered inconsistently with its counterpart threshold")]
    InvertedThresholds { field: String },
    #[error("`{field}` must be within 0.0..=1.0 (got {value})")]
    InvalidConfidence { field: String, value: f64 },
}

fn terms(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| (*item).to_string()).collect()
}

fn validate_terms(field: &str, terms: &[String]) -> Result<(), ConfigValidationError> {
    if terms.is_empty() {
        return Err(ConfigValidationError::EmptyTerms {
            field: field.into(),
        });
    }
    if terms.iter().any(|term| term.trim().is_empty()) {
        return Err(ConfigValidationError::BlankTerm {
            field: field.into(),
        });
    }
    Ok(())
}

fn validate_bands(field: &str, bands: &[ScoreBand]) -> Result<(), ConfigValidationError> {
    let sorted = bands
        .windows(2)
        .all(|pair| pair[0].min_percentage >= pair[1].min_percentage);
    if sorted {
        Ok(())
    } else {
        Err(ConfigValidationError::UnsortedBands {
            field: field.into(),
        })
    }
}
