use std::collections::BTreeMap;
use std::fmt::{self, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::classifier::ClassCode;
use crate::enrichment::Narrative;
use crate::model::BusinessDetails;
use crate::risk::{Eligibility, RiskAssessment, RiskBreakdown, RiskLevel};
use crate::sentiment::{round_to, CombinedSentiment, ImageSentiment, OverallSentiment, RatingDistribution};

/// Format styles supported in default reporter implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Final underwriting action derived from eligibility and risk tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Recommendation {
    Decline,
    Refer,
    ApproveStandard,
    ApproveWithMonitoring,
}

impl Recommendation {
    pub const ALL: [Recommendation; 4] = [
        Recommendation::Decline,
        Recommendation::Refer,
        Recommendation::ApproveStandard,
        Recommendation::ApproveWithMonitoring,
    ];

    pub fn for_assessment(assessment: &RiskAssessment) -> Self {
        match (assessment.eligibility, assessment.risk_level) {
            (Eligibility::Ineligible, _) => Self::Decline,
            (Eligibility::NeedsReview, _) => Self::Refer,
            (Eligibility::Eligible, RiskLevel::Low) => Self::ApproveStandard,
            (Eligibility::Eligible, RiskLevel::Medium) => Self::ApproveWithMonitoring,
            (Eligibility::Eligible, RiskLevel::High) => {
                // The scorer never emits this pair; hand-built assessments fall back to a referral.
                warn!("eligible assessment carries a high risk tier; referring");
                Self::Refer
            }
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Self::Decline => "Decline coverage due to ineligible criteria.",
            Self::Refer => {
                "Refer to senior underwriter for manual review. Consider additional information gathering."
            }
            Self::ApproveStandard => "Approve coverage with standard terms and pricing.",
            Self::ApproveWithMonitoring => {
                "Approve coverage with enhanced monitoring and potential premium adjustment."
            }
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

impl From<Recommendation> for String {
    fn from(value: Recommendation) -> Self {
        value.text().to_string()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unrecognised recommendation `{0}`")]
pub struct UnknownRecommendation(pub String);

impl TryFrom<String> for Recommendation {
    type Error = UnknownRecommendation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.text() == value.trim())
            .ok_or(UnknownRecommendation(value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessInfo {
    pub name: String,
    pub address: String,
    pub rating: Option<f64>,
    pub review_count: u32,
    pub price_level: Option<String>,
    pub categories: Vec<String>,
}

impl From<&BusinessDetails> for BusinessInfo {
    fn from(business: &BusinessDetails) -> Self {
        Self {
            name: business.name.clone(),
            address: business.location.display_address(),
            rating: business.rating,
            review_count: business.review_count,
            price_level: business.price.clone(),
            categories: business
                .categories
                .iter()
                .map(|category| category.title.clone())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub total_images: usize,
    pub positive_percentage: f64,
    pub negative_percentage: f64,
    pub neutral_percentage: f64,
    pub average_sentiment_score: f64,
    pub risk_factors: BTreeMap<String, usize>,
    pub positive_factors: BTreeMap<String, usize>,
}

impl From<&ImageSentiment> for ImageSummary {
    fn from(images: &ImageSentiment) -> Self {
        Self {
            total_images: images.total_images,
            positive_percentage: round_to(images.positive_percentage, 2),
            negative_percentage: round_to(images.negative_percentage, 2),
            neutral_percentage: round_to(images.neutral_percentage, 2),
            average_sentiment_score: round_to(images.average_compound_score, 2),
            risk_factors: images.risk_factor_frequency.clone(),
            positive_factors: images.positive_factor_frequency.clone(),
        }
    }
}

/// Presentation view of [`OverallSentiment`]; percentages and scores rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub total_reviews: usize,
    pub positive_percentage: f64,
    pub negative_percentage: f64,
    pub neutral_percentage: f64,
    pub average_sentiment_score: f64,
    pub positive_keywords: BTreeMap<String, usize>,
    pub negative_keywords: BTreeMap<String, usize>,
    pub rating_distribution: RatingDistribution,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_sentiment: Option<ImageSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combined_sentiment: Option<CombinedSentiment>,
}

impl From<&OverallSentiment> for SentimentSummary {
    fn from(sentiment: &OverallSentiment) -> Self {
        Self {
            total_reviews: sentiment.total_reviews,
            positive_percentage: round_to(sentiment.positive_percentage, 2),
            negative_percentage: round_to(sentiment.negative_percentage, 2),
            neutral_percentage: round_to(sentiment.neutral_percentage, 2),
            average_sentiment_score: round_to(sentiment.average_compound_score, 2),
            positive_keywords: sentiment.positive_keyword_frequency.clone(),
            negative_keywords: sentiment.negative_keyword_frequency.clone(),
            rating_distribution: sentiment.rating_distribution.clone(),
            image_sentiment: sentiment.image_sentiment.as_ref().map(ImageSummary::from),
            combined_sentiment: sentiment.combined_sentiment.as_ref().map(|combined| {
                CombinedSentiment {
                    total_items: combined.total_items,
                    overall_positive_percentage: round_to(combined.overall_positive_percentage, 2),
                    overall_negative_percentage: round_to(combined.overall_negative_percentage, 2),
                    overall_neutral_percentage: round_to(combined.overall_neutral_percentage, 2),
                }
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSummary {
    pub risk_level: RiskLevel,
    pub primary_class_code: ClassCode,
    pub class_description: String,
    pub eligibility: Eligibility,
    /// Confidence as a percentage, rounded to two decimals.
    pub confidence: f64,
    pub ineligible_criteria: Vec<String>,
    pub positive_factors: Vec<String>,
    pub negative_factors: Vec<String>,
    pub score_breakdown: RiskBreakdown,
}

impl From<&RiskAssessment> for RiskSummary {
    fn from(assessment: &RiskAssessment) -> Self {
        Self {
            risk_level: assessment.risk_level,
            primary_class_code: assessment.class_code,
            class_description: assessment.class_code.description().to_string(),
            eligibility: assessment.eligibility,
            confidence: round_to(assessment.confidence * 100.0, 2),
            ineligible_criteria: assessment.ineligible_criteria.clone(),
            positive_factors: assessment.positive_factors.clone(),
            negative_factors: assessment.negative_factors.clone(),
            score_breakdown: assessment.score_breakdown.clone(),
        }
    }
}

/// Structured underwriting report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub business_info: BusinessInfo,
    pub sentiment_analysis: SentimentSummary,
    pub risk_assessment: RiskSummary,
    pub recommendation: Recommendation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<Narrative>,
}

impl Report {
    pub fn with_narrative(mut self, narrative: Narrative) -> Self {
        self.narrative = Some(narrative);
        self
    }
}

/// Merge the business listing, aggregated sentiment and risk verdict into a [`Report`].
pub fn assemble_report(
    business: &BusinessDetails,
    sentiment: &OverallSentiment,
    assessment: &RiskAssessment,
) -> Report {
    Report {
        business_info: BusinessInfo::from(business),
        sentiment_analysis: SentimentSummary::from(sentiment),
        risk_assessment: RiskSummary::from(assessment),
        recommendation: Recommendation::for_assessment(assessment),
        narrative: None,
    }
}

/// Produce a report string using the desired format.
pub fn render_report(report: &Report, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_human(report),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
    }
}

fn render_human(report: &Report) -> anyhow::Result<String> {
    let mut out = String::new();
    let info = &report.business_info;
    writeln!(out, "Underwriting Report: {}", info.name)?;
    writeln!(out, "  Address: {}", or_na(&info.address))?;
    writeln!(
        out,
        "  Listing: rating {} • {} reviews • price {}",
        info.rating
            .map(|rating| rating.to_string())
            .unwrap_or_else(|| "n/a".into()),
        info.review_count,
        info.price_level.as_deref().unwrap_or("n/a"),
    )?;
    writeln!(out, "  Categories: {}", or_none(&info.categories.join(", ")))?;

    let sentiment = &report.sentiment_analysis;
    writeln!(out)?;
    writeln!(out, "Sentiment Analysis ({} reviews):", sentiment.total_reviews)?;
    writeln!(
        out,
        "  Positive: {:.2}% • Negative: {:.2}% • Neutral: {:.2}%",
        sentiment.positive_percentage, sentiment.negative_percentage, sentiment.neutral_percentage
    )?;
    writeln!(
        out,
        "  Average sentiment score: {:.2}",
        sentiment.average_sentiment_score
    )?;
    let distribution = &sentiment.rating_distribution;
    let buckets = distribution
        .rating_counts
        .iter()
        .map(|(stars, count)| format!("{stars}★ {count}"))
        .collect::<Vec<_>>()
        .join(" | ");
    writeln!(
        out,
        "  Ratings: {buckets} (avg {:.1})",
        distribution.average_rating
    )?;
    writeln!(
        out,
        "  Positive keywords: {}",
        or_none(&frequency_list(&sentiment.positive_keywords))
    )?;
    writeln!(
        out,
        "  Negative keywords: {}",
        or_none(&frequency_list(&sentiment.negative_keywords))
    )?;
    if let Some(images) = &sentiment.image_sentiment {
        writeln!(
            out,
            "  Images ({}): Positive: {:.2}% • Negative: {:.2}% • Neutral: {:.2}%",
            images.total_images,
            images.positive_percentage,
            images.negative_percentage,
            images.neutral_percentage
        )?;
        if !images.risk_factors.is_empty() {
            writeln!(
                out,
                "    Risk factors: {}",
                frequency_list(&images.risk_factors)
            )?;
        }
    }
    if let Some(combined) = &sentiment.combined_sentiment {
        writeln!(
            out,
            "  Combined ({} items): Positive: {:.2}% • Negative: {:.2}% • Neutral: {:.2}%",
            combined.total_items,
            combined.overall_positive_percentage,
            combined.overall_negative_percentage,
            combined.overall_neutral_percentage
        )?;
    }

    let risk = &report.risk_assessment;
    let breakdown = &risk.score_breakdown;
    writeln!(out)?;
    writeln!(out, "Risk Assessment:")?;
    writeln!(out, "  Risk level: {}", risk.risk_level)?;
    writeln!(
        out,
        "  Class code: {} ({})",
        risk.primary_class_code, risk.class_description
    )?;
    writeln!(out, "  Eligibility: {}", risk.eligibility)?;
    writeln!(out, "  Confidence: {:.2}%", risk.confidence)?;
    writeln!(
        out,
        "  Score: {} (positive {:+}, negative {:+}, critical {:+})",
        breakdown.total_score,
        breakdown.positive_points,
        breakdown.negative_points,
        breakdown.critical_points
    )?;
    if breakdown.clamped {
        writeln!(
            out,
            "  Sanity clamp applied: positive {:.2}%, negative {:.2}%",
            breakdown.effective_positive_percentage, breakdown.effective_negative_percentage
        )?;
    }
    write_list(&mut out, "Ineligible criteria", &risk.ineligible_criteria)?;
    write_list(&mut out, "Positive factors", &risk.positive_factors)?;
    write_list(&mut out, "Negative factors", &risk.negative_factors)?;

    writeln!(out)?;
    writeln!(out, "Recommendation: {}", report.recommendation)?;

    if let Some(narrative) = &report.narrative {
        writeln!(out)?;
        writeln!(out, "Narrative:")?;
        writeln!(out, "  {}", narrative.executive_summary)?;
        let findings = &narrative.detailed_findings;
        for (label, text) in [
            ("Business profile", &findings.business_profile),
            ("Sentiment", &findings.sentiment),
            ("Safety", &findings.safety),
            ("Compliance", &findings.compliance),
        ] {
            writeln!(out, "  {label}: {text}")?;
        }
        write_list(
            &mut out,
            "Coverage recommendations",
            &narrative.coverage_recommendations,
        )?;
        if let Some(advisory) = &narrative.advisory_classification {
            writeln!(
                out,
                "  Advisory class code: {} ({})",
                advisory.class_code,
                if advisory.agrees_with_engine {
                    "agrees with engine"
                } else {
                    "differs from engine; not applied"
                }
            )?;
            if !advisory.rationale.trim().is_empty() {
                writeln!(out, "    {}", advisory.rationale)?;
            }
        }
    }

    Ok(out)
}

fn write_list(out: &mut String, label: &str, items: &[String]) -> fmt::Result {
    if items.is_empty() {
        return writeln!(out, "  {label}: none");
    }
    writeln!(out, "  {label}:")?;
    for item in items {
        writeln!(out, "    - {item}")?;
    }
    Ok(())
}

fn frequency_list(frequency: &BTreeMap<String, usize>) -> String {
    frequency
        .iter()
        .map(|(keyword, count)| format!("{keyword} ({count})"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn or_none(value: &str) -> &str {
    if value.is_empty() {
        "none"
    } else {
        value
    }
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "n/a"
    } else {
        value
    }
}
