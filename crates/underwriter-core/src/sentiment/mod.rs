use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::config::SentimentConfig;
use crate::keywords::KeywordSet;
use crate::model::{
    ImageAnalysis, Rating, Review, SentimentCategory, SentimentScores, UnderwritingError,
};

pub mod polarity;

pub use polarity::PolarityScorer;

/// A review with its polarity scores, category and indicator keyword hits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedReview {
    pub review_id: String,
    pub rating: Rating,
    pub text: String,
    pub sentiment_scores: SentimentScores,
    pub sentiment_category: SentimentCategory,
    pub positive_keywords: BTreeSet<String>,
    pub negative_keywords: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedImage {
    pub image_url: String,
    pub observations: Vec<String>,
    pub sentiment_scores: SentimentScores,
    pub sentiment_category: SentimentCategory,
    pub risk_factors: Vec<String>,
    pub positive_factors: Vec<String>,
}

/// Whole-star histogram of review ratings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingDistribution {
    pub rating_counts: BTreeMap<u8, usize>,
    /// Mean of the whole-star buckets, rounded to one decimal.
    pub average_rating: f64,
}

impl Default for RatingDistribution {
    fn default() -> Self {
        Self {
            rating_counts: (1..=5).map(|stars| (stars, 0)).collect(),
            average_rating: 0.0,
        }
    }
}

impl RatingDistribution {
    fn from_reviews(reviews: &[AnalyzedReview]) -> Self {
        let mut distribution = Self::default();
        if reviews.is_empty() {
            return distribution;
        }
        let mut total = 0u64;
        for review in reviews {
            let stars = review.rating.stars().clamp(1, 5);
            *distribution.rating_counts.entry(stars).or_insert(0) += 1;
            total += u64::from(stars);
        }
        distribution.average_rating = round_to(total as f64 / reviews.len() as f64, 1);
        distribution
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSentiment {
    pub total_images: usize,
    pub positive_count: usize,
    pub negative_count: usize,
    pub neutral_count: usize,
    pub positive_percentage: f64,
    pub negative_percentage: f64,
    pub neutral_percentage: f64,
    pub average_compound_score: f64,
    pub risk_factor_frequency: BTreeMap<String, usize>,
    pub positive_factor_frequency: BTreeMap<String, usize>,
}

/// Review and image categories pooled over a shared denominator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedSentiment {
    pub total_items: usize,
    pub overall_positive_percentage: f64,
    pub overall_negative_percentage: f64,
    pub overall_neutral_percentage: f64,
}

/// Batch-level sentiment. Percentages are kept unrounded; rounding happens at presentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallSentiment {
    pub total_reviews: usize,
    pub positive_count: usize,
    pub negative_count: usize,
    pub neutral_count: usize,
    pub positive_percentage: f64,
    pub negative_percentage: f64,
    pub neutral_percentage: f64,
    pub average_compound_score: f64,
    pub positive_keyword_frequency: BTreeMap<String, usize>,
    pub negative_keyword_frequency: BTreeMap<String, usize>,
    pub rating_distribution: RatingDistribution,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_sentiment: Option<ImageSentiment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combined_sentiment: Option<CombinedSentiment>,
}

impl OverallSentiment {
    /// Fails with [`UnderwritingError::InsufficientData`] when no reviews were aggregated.
    ///
    /// The zero-valued aggregate remains usable; callers decide whether to proceed with defaults.
    pub fn require_reviews(&self) -> Result<&Self, UnderwritingError> {
        if self.total_reviews == 0 {
            Err(UnderwritingError::InsufficientData)
        } else {
            Ok(self)
        }
    }
}

#[derive(Debug, Default)]
struct CategoryCounts {
    positive: usize,
    negative: usize,
    neutral: usize,
}

impl CategoryCounts {
    fn tally<'a>(categories: impl IntoIterator<Item = &'a SentimentCategory>) -> Self {
        let mut counts = Self::default();
        for category in categories {
            match category {
                SentimentCategory::Positive => counts.positive += 1,
                SentimentCategory::Negative => counts.negative += 1,
                SentimentCategory::Neutral => counts.neutral += 1,
            }
        }
        counts
    }
}

/// Scores reviews and image analyses and aggregates them into an [`OverallSentiment`].
#[derive(Debug, Clone)]
pub struct SentimentAggregator {
    config: SentimentConfig,
    scorer: PolarityScorer,
    positive_indicators: KeywordSet,
    negative_indicators: KeywordSet,
}

impl SentimentAggregator {
    pub fn new(config: SentimentConfig) -> Result<Self> {
        let scorer = match &config.lexicon_path {
            Some(path) => PolarityScorer::default().with_lexicon_file(path)?,
            None => PolarityScorer::default(),
        };
        Self::with_scorer(config, scorer)
    }

    pub fn with_scorer(config: SentimentConfig, scorer: PolarityScorer) -> Result<Self> {
        let positive_indicators = KeywordSet::new(&config.positive_indicators)?;
        let negative_indicators = KeywordSet::new(&config.negative_indicators)?;
        Ok(Self {
            config,
            scorer,
            positive_indicators,
            negative_indicators,
        })
    }

    /// Rating is the stronger signal: either the text or the rating alone can set the category.
    pub fn review_category(&self, compound: f64, rating: Rating) -> SentimentCategory {
        let rating = rating.value();
        if compound >= self.config.positive_compound || rating >= self.config.positive_rating {
            SentimentCategory::Positive
        } else if compound <= self.config.negative_compound
            || rating <= self.config.negative_rating
        {
            SentimentCategory::Negative
        } else {
            SentimentCategory::Neutral
        }
    }

    /// Any risk factor forces a negative category regardless of the observation text.
    pub fn image_category(&self, compound: f64, has_risk_factors: bool) -> SentimentCategory {
        if compound >= self.config.image_positive_compound && !has_risk_factors {
            SentimentCategory::Positive
        } else if compound <= self.config.image_negative_compound || has_risk_factors {
            SentimentCategory::Negative
        } else {
            SentimentCategory::Neutral
        }
    }

    pub fn analyze_review(&self, review: &Review) -> AnalyzedReview {
        let sentiment_scores = self.scorer.score(&review.text);
        let sentiment_category = self.review_category(sentiment_scores.compound, review.rating);
        let positive_keywords = self
            .positive_indicators
            .matches(&review.text)
            .into_iter()
            .map(str::to_string)
            .collect();
        let negative_keywords = self
            .negative_indicators
            .matches(&review.text)
            .into_iter()
            .map(str::to_string)
            .collect();
        trace!(review_id = %review.id, compound = sentiment_scores.compound, ?sentiment_category, "review analyzed");
        AnalyzedReview {
            review_id: review.id.clone(),
            rating: review.rating,
            text: review.text.clone(),
            sentiment_scores,
            sentiment_category,
            positive_keywords,
            negative_keywords,
        }
    }

    pub fn analyze_image(&self, image: &ImageAnalysis) -> AnalyzedImage {
        let sentiment_scores = self.scorer.score(&image.observations.join(" "));
        let sentiment_category =
            self.image_category(sentiment_scores.compound, !image.risk_factors.is_empty());
        AnalyzedImage {
            image_url: image.image_url.clone(),
            observations: image.observations.clone(),
            sentiment_scores,
            sentiment_category,
            risk_factors: image.risk_factors.clone(),
            positive_factors: image.positive_factors.clone(),
        }
    }

    #[instrument(name = "aggregate_sentiment", skip_all, fields(reviews = reviews.len(), images = images.len()))]
    pub fn aggregate(&self, reviews: &[Review], images: &[ImageAnalysis]) -> OverallSentiment {
        let analyzed: Vec<AnalyzedReview> =
            reviews.iter().map(|review| self.analyze_review(review)).collect();
        let analyzed_images: Vec<AnalyzedImage> =
            images.iter().map(|image| self.analyze_image(image)).collect();
        let overall = summarize(&analyzed, &analyzed_images);
        debug!(
            total_reviews = overall.total_reviews,
            positive = overall.positive_percentage,
            negative = overall.negative_percentage,
            "sentiment aggregated"
        );
        overall
    }
}

/// Aggregate already-analyzed reviews and images.
pub fn summarize(reviews: &[AnalyzedReview], images: &[AnalyzedImage]) -> OverallSentiment {
    let image_sentiment = summarize_images(images);
    let total_reviews = reviews.len();
    if total_reviews == 0 {
        return OverallSentiment {
            image_sentiment,
            ..OverallSentiment::default()
        };
    }

    let counts = CategoryCounts::tally(reviews.iter().map(|review| &review.sentiment_category));
    let average_compound_score = reviews
        .iter()
        .map(|review| review.sentiment_scores.compound)
        .sum::<f64>()
        / total_reviews as f64;

    let combined_sentiment = image_sentiment.as_ref().map(|images| {
        let total_items = total_reviews + images.total_images;
        CombinedSentiment {
            total_items,
            overall_positive_percentage: percentage(
                counts.positive + images.positive_count,
                total_items,
            ),
            overall_negative_percentage: percentage(
                counts.negative + images.negative_count,
                total_items,
            ),
            overall_neutral_percentage: percentage(
                counts.neutral + images.neutral_count,
                total_items,
            ),
        }
    });

    OverallSentiment {
        total_reviews,
        positive_count: counts.positive,
        negative_count: counts.negative,
        neutral_count: counts.neutral,
        positive_percentage: percentage(counts.positive, total_reviews),
        negative_percentage: percentage(counts.negative, total_reviews),
        neutral_percentage: percentage(counts.neutral, total_reviews),
        average_compound_score,
        positive_keyword_frequency: frequency(
            reviews.iter().flat_map(|review| &review.positive_keywords),
        ),
        negative_keyword_frequency: frequency(
            reviews.iter().flat_map(|review| &review.negative_keywords),
        ),
        rating_distribution: RatingDistribution::from_reviews(reviews),
        image_sentiment,
        combined_sentiment,
    }
}

fn summarize_images(images: &[AnalyzedImage]) -> Option<ImageSentiment> {
    if images.is_empty() {
        return None;
    }
    let total_images = images.len();
    let counts = CategoryCounts::tally(images.iter().map(|image| &image.sentiment_category));
    let average_compound_score = images
        .iter()
        .map(|image| image.sentiment_scores.compound)
        .sum::<f64>()
        / total_images as f64;
    Some(ImageSentiment {
        total_images,
        positive_count: counts.positive,
        negative_count: counts.negative,
        neutral_count: counts.neutral,
        positive_percentage: percentage(counts.positive, total_images),
        negative_percentage: percentage(counts.negative, total_images),
        neutral_percentage: percentage(counts.neutral, total_images),
        average_compound_score,
        risk_factor_frequency: frequency(images.iter().flat_map(|image| &image.risk_factors)),
        positive_factor_frequency: frequency(
            images.iter().flat_map(|image| &image.positive_factors),
        ),
    })
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

fn frequency<'a>(items: impl IntoIterator<Item = &'a String>) -> BTreeMap<String, usize> {
    let mut map = BTreeMap::new();
    for item in items {
        *map.entry(item.clone()).or_insert(0) += 1;
    }
    map
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

static DEFAULT_AGGREGATOR: Lazy<SentimentAggregator> = Lazy::new(|| {
    SentimentAggregator::new(SentimentConfig::default())
        .expect("built-in sentiment lexicons compile")
});

/// Aggregate reviews and optional image analyses with the built-in lexicons and thresholds.
pub fn aggregate_sentiment(reviews: &[Review], images: Option<&[ImageAnalysis]>) -> OverallSentiment {
    DEFAULT_AGGREGATOR.aggregate(reviews, images.unwrap_or_default())
}
