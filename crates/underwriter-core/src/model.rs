use anyhow::Result as AnyResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Star rating attached to a review, always within `1.0..=5.0`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Rating(f64);

impl Rating {
    pub const MIN: f64 = 1.0;
    pub const MAX: f64 = 5.0;
    /// Value assumed when a rating is missing or cannot be parsed.
    pub const NEUTRAL: Rating = Rating(3.0);

    /// Construct a rating, rejecting non-finite and out-of-range values.
    pub fn new(value: f64) -> Result<Self, RatingError> {
        if !value.is_finite() {
            return Err(RatingError::Unparseable {
                raw: value.to_string(),
            });
        }
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(RatingError::OutOfRange { value });
        }
        Ok(Self(value))
    }

    /// Parse a loosely typed rating as delivered by upstream sources (numbers or numeric strings).
    pub fn parse(raw: &serde_json::Value) -> Result<Self, RatingError> {
        match raw {
            serde_json::Value::Null => Err(RatingError::Missing),
            serde_json::Value::Number(number) => match number.as_f64() {
                Some(value) => Self::new(value),
                None => Err(RatingError::Unparseable {
                    raw: number.to_string(),
                }),
            },
            serde_json::Value::String(text) => match text.trim().parse::<f64>() {
                Ok(value) => Self::new(value),
                Err(_) => Err(RatingError::Unparseable { raw: text.clone() }),
            },
            other => Err(RatingError::Unparseable {
                raw: other.to_string(),
            }),
        }
    }

    /// Parse a rating, recovering from invalid input instead of failing.
    pub fn parse_or_neutral(raw: &serde_json::Value) -> Self {
        Self::parse(raw).unwrap_or_else(|err| err.recover())
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Whole-star bucket (1..=5) used for rating distributions.
    pub fn stars(self) -> u8 {
        self.0.trunc() as u8
    }
}

impl Default for Rating {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl TryFrom<f64> for Rating {
    type Error = RatingError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for f64 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

/// Reasons a raw rating could not be accepted verbatim.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RatingError {
    #[error("rating is missing")]
    Missing,
    #[error("rating `{raw}` is not numeric")]
    Unparseable { raw: String },
    #[error("rating {value} is outside 1..=5")]
    OutOfRange { value: f64 },
}

impl RatingError {
    /// Recovered rating: out-of-range values clamp into `1..=5`, anything else becomes neutral.
    pub fn recover(&self) -> Rating {
        match self {
            Self::OutOfRange { value } => Rating(value.clamp(Rating::MIN, Rating::MAX)),
            Self::Missing | Self::Unparseable { .. } => Rating::NEUTRAL,
        }
    }
}

/// A single customer review as fetched from an upstream source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub rating: Rating,
    pub text: String,
}

impl Review {
    pub fn new(id: impl Into<String>, rating: Rating, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rating,
            text: text.into(),
        }
    }
}

/// Output of an (external) image-inspection step for one photo of the premises.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageAnalysis {
    pub image_url: String,
    pub observations: Vec<String>,
    pub risk_factors: Vec<String>,
    pub positive_factors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Category {
    pub alias: String,
    pub title: String,
}

impl Category {
    pub fn new(alias: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            title: title.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub address1: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

impl Location {
    /// Single-line postal address (`street, city, state zip`), skipping blank parts.
    pub fn display_address(&self) -> String {
        let state_zip = format!("{} {}", self.state.trim(), self.zip_code.trim());
        [self.address1.trim(), self.city.trim(), state_zip.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Listing metadata for the business being underwritten.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessDetails {
    pub id: Option<String>,
    pub name: String,
    pub rating: Option<f64>,
    pub review_count: u32,
    pub price: Option<String>,
    pub categories: Vec<Category>,
    pub location: Location,
}

impl BusinessDetails {
    /// Category titles joined with spaces, lower-cased for keyword matching.
    pub fn category_text(&self) -> String {
        self.categories
            .iter()
            .map(|category| category.title.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Polarity scores for a piece of text. `compound` lies in `-1.0..=1.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentScores {
    pub compound: f64,
    pub pos: f64,
    pub neg: f64,
    pub neu: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentCategory {
    Positive,
    Neutral,
    Negative,
}

/// Everything the engine needs for one underwriting run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnderwritingCase {
    pub business: BusinessDetails,
    pub reviews: Vec<Review>,
    pub images: Vec<ImageAnalysis>,
}

/// Data-quality conditions surfaced by the engine. None of them are fatal.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnderwritingError {
    #[error("no reviews available for sentiment aggregation; zero-valued defaults apply")]
    InsufficientData,
    #[error("review `{review_id}` has an invalid rating ({error}); using {recovered}")]
    InvalidRating {
        review_id: String,
        #[source]
        error: RatingError,
        recovered: f64,
    },
}

/// Abstraction over case loading so files, HTTP fetchers, or fixtures can be swapped transparently.
#[async_trait]
pub trait CaseRepository: Send + Sync {
    /// Load the business, reviews, and image analyses for a single run.
    async fn load_case(&self) -> AnyResult<UnderwritingCase>;
}
