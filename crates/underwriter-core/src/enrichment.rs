//! Narrative enrichment of finished reports.
//!
//! Providers (a language model, a template engine, a human-in-the-loop queue) produce prose on
//! top of a deterministic [`Report`]. Nothing a provider returns changes the risk assessment: a
//! proposed class code is kept as an advisory annotation and compared against the engine's
//! own decision.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classifier::ClassCode;
use crate::report::Report;
use crate::risk::{Eligibility, RiskLevel};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailedFindings {
    pub business_profile: String,
    pub sentiment: String,
    pub safety: String,
    pub compliance: String,
}

/// Class code proposed by a narrative provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryClassification {
    pub class_code: ClassCode,
    #[serde(default)]
    pub rationale: String,
    /// Whether the proposal matches the engine's class code. Set by [`enrich_report`].
    #[serde(default)]
    pub agrees_with_engine: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narrative {
    /// Label of the provider that wrote the narrative.
    pub provider: String,
    pub executive_summary: String,
    pub detailed_findings: DetailedFindings,
    pub coverage_recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advisory_classification: Option<AdvisoryClassification>,
}

impl Narrative {
    pub const FALLBACK_PROVIDER: &'static str = "fallback";

    /// Minimal narrative derived from the report alone; used when a provider fails.
    pub fn fallback(report: &Report) -> Self {
        Self {
            provider: Self::FALLBACK_PROVIDER.into(),
            executive_summary: executive_summary(report),
            detailed_findings: DetailedFindings {
                business_profile: business_profile(report),
                sentiment: sentiment_findings(report),
                safety: "Narrative provider unavailable; see risk factors above.".into(),
                compliance: "Narrative provider unavailable; see eligibility above.".into(),
            },
            coverage_recommendations: vec![report.recommendation.text().to_string()],
            advisory_classification: None,
        }
    }
}

/// Source of narrative text for a finished report.
#[async_trait]
pub trait NarrativeProvider: Send + Sync {
    /// Short label recorded on narratives produced by this provider.
    fn name(&self) -> &str;

    async fn narrate(&self, report: &Report) -> Result<Narrative>;
}

/// Template-driven provider that needs no network access.
#[derive(Debug, Default, Clone)]
pub struct HeuristicNarrativeProvider;

#[async_trait]
impl NarrativeProvider for HeuristicNarrativeProvider {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn narrate(&self, report: &Report) -> Result<Narrative> {
        Ok(Narrative {
            provider: self.name().to_string(),
            executive_summary: executive_summary(report),
            detailed_findings: DetailedFindings {
                business_profile: business_profile(report),
                sentiment: sentiment_findings(report),
                safety: safety_findings(report),
                compliance: compliance_findings(report),
            },
            coverage_recommendations: coverage_recommendations(report),
            advisory_classification: None,
        })
    }
}

/// Attach a narrative to `report`, falling back to [`Narrative::fallback`] when the provider errors.
///
/// Advisory classifications are labelled against the report's class code and never applied.
pub async fn enrich_report(report: Report, provider: &dyn NarrativeProvider) -> Report {
    let mut narrative = match provider.narrate(&report).await {
        Ok(narrative) => narrative,
        Err(err) => {
            warn!(
                provider = provider.name(),
                error = %err,
                "narrative provider failed; using fallback narrative"
            );
            Narrative::fallback(&report)
        }
    };
    let engine_code = report.risk_assessment.primary_class_code;
    if let Some(advisory) = narrative.advisory_classification.as_mut() {
        advisory.agrees_with_engine = advisory.class_code == engine_code;
        if !advisory.agrees_with_engine {
            debug!(
                advisory = %advisory.class_code,
                engine = %engine_code,
                "advisory classification differs from engine; keeping engine decision"
            );
        }
    }
    report.with_narrative(narrative)
}

fn executive_summary(report: &Report) -> String {
    let risk = &report.risk_assessment;
    format!(
        "{} is classified as {} (class {}) with {} risk and is {}. {}",
        report.business_info.name,
        risk.class_description,
        risk.primary_class_code,
        risk.risk_level,
        eligibility_phrase(risk.eligibility),
        report.recommendation
    )
}

fn eligibility_phrase(eligibility: Eligibility) -> &'static str {
    match eligibility {
        Eligibility::Eligible => "eligible for coverage",
        Eligibility::Ineligible => "ineligible for coverage",
        Eligibility::NeedsReview => "pending manual review",
    }
}

fn business_profile(report: &Report) -> String {
    let info = &report.business_info;
    let categories = if info.categories.is_empty() {
        "no listed categories".to_string()
    } else {
        info.categories.join(", ")
    };
    let rating = info
        .rating
        .map(|rating| format!("a listing rating of {rating}"))
        .unwrap_or_else(|| "no listing rating".into());
    format!(
        "Listed under {categories} with {rating} across {} reviews.",
        info.review_count
    )
}

fn sentiment_findings(report: &Report) -> String {
    let sentiment = &report.sentiment_analysis;
    if sentiment.total_reviews == 0 {
        return "No reviews were available; sentiment defaults to neutral.".into();
    }
    format!(
        "{} reviews analysed: {:.2}% positive, {:.2}% negative, {:.2}% neutral (average score {:.2}).",
        sentiment.total_reviews,
        sentiment.positive_percentage,
        sentiment.negative_percentage,
        sentiment.neutral_percentage,
        sentiment.average_sentiment_score
    )
}

fn safety_findings(report: &Report) -> String {
    let critical = &report.risk_assessment.score_breakdown.critical_keywords;
    let image_risks = report
        .sentiment_analysis
        .image_sentiment
        .as_ref()
        .map(|images| images.risk_factors.keys().cloned().collect::<Vec<_>>())
        .unwrap_or_default();
    match (critical.is_empty(), image_risks.is_empty()) {
        (true, true) => "No critical safety keywords or image risk factors were identified.".into(),
        (false, true) => format!("Reviews mention critical safety terms: {}.", critical.join(", ")),
        (true, false) => format!("Image inspection flagged: {}.", image_risks.join(", ")),
        (false, false) => format!(
            "Reviews mention critical safety terms ({}) and image inspection flagged: {}.",
            critical.join(", "),
            image_risks.join(", ")
        ),
    }
}

fn compliance_findings(report: &Report) -> String {
    let criteria = &report.risk_assessment.ineligible_criteria;
    if criteria.is_empty() {
        "No ineligibility criteria apply.".into()
    } else {
        format!("Ineligibility criteria: {}.", criteria.join("; "))
    }
}

fn coverage_recommendations(report: &Report) -> Vec<String> {
    let risk = &report.risk_assessment;
    let mut recommendations = vec![report.recommendation.text().to_string()];
    if !risk.score_breakdown.critical_keywords.is_empty() {
        recommendations
            .push("Require a premises safety inspection before any reconsideration.".into());
    }
    if risk.primary_class_code == ClassCode::Nightclub || risk.primary_class_code == ClassCode::BarTavern
    {
        recommendations.push("Confirm liquor liability limits and security arrangements.".into());
    }
    if risk.risk_level == RiskLevel::Medium && risk.eligibility == Eligibility::Eligible {
        recommendations.push("Schedule a review of customer complaints at renewal.".into());
    }
    recommendations
}
