use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::classifier::{ClassCodeClassifier, Classification};
use crate::config::UnderwritingConfig;
use crate::enrichment::{enrich_report, NarrativeProvider};
use crate::model::UnderwritingCase;
use crate::report::{assemble_report, Report};
use crate::risk::RiskScorer;
use crate::sentiment::{OverallSentiment, SentimentAggregator};

/// End-to-end engine: sentiment aggregation, classification, risk scoring and report assembly
/// built from a single configuration.
#[derive(Debug, Clone)]
pub struct Underwriter {
    aggregator: SentimentAggregator,
    classifier: ClassCodeClassifier,
    scorer: RiskScorer,
}

impl Underwriter {
    pub fn new(config: UnderwritingConfig) -> Result<Self> {
        config
            .validate()
            .context("underwriting configuration is invalid")?;
        for keyword in config.unreachable_critical_keywords() {
            warn!(
                keyword,
                "critical keyword is not a negative indicator and will never be reported"
            );
        }
        let classifier = ClassCodeClassifier::new(config.classifier)?;
        Ok(Self {
            aggregator: SentimentAggregator::new(config.sentiment)?,
            scorer: RiskScorer::new(config.risk, classifier.clone()),
            classifier,
        })
    }

    pub fn classify(&self, case: &UnderwritingCase) -> Classification {
        self.classifier.classify(&case.business)
    }

    pub fn sentiment(&self, case: &UnderwritingCase) -> OverallSentiment {
        let sentiment = self.aggregator.aggregate(&case.reviews, &case.images);
        if let Err(issue) = sentiment.require_reviews() {
            warn!(business = %case.business.name, %issue, "continuing with default sentiment");
        }
        sentiment
    }

    #[instrument(skip_all, fields(business = %case.business.name))]
    pub fn underwrite(&self, case: &UnderwritingCase) -> Report {
        let sentiment = self.sentiment(case);
        let assessment = self.scorer.assess(&sentiment, &case.business);
        let report = assemble_report(&case.business, &sentiment, &assessment);
        info!(
            class_code = %report.risk_assessment.primary_class_code,
            risk_level = %report.risk_assessment.risk_level,
            eligibility = %report.risk_assessment.eligibility,
            "underwriting complete"
        );
        report
    }

    /// Underwrite and attach a narrative from `provider`.
    pub async fn underwrite_enriched(
        &self,
        case: &UnderwritingCase,
        provider: &dyn NarrativeProvider,
    ) -> Report {
        enrich_report(self.underwrite(case), provider).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassCode;
    use crate::enrichment::HeuristicNarrativeProvider;
    use crate::model::{BusinessDetails, Category, Rating, Review};
    use crate::report::Recommendation;
    use crate::risk::{Eligibility, RiskLevel};

    fn case(titles: &[&str], reviews: Vec<Review>) -> UnderwritingCase {
        UnderwritingCase {
            business: BusinessDetails {
                name: "Lakeside Grill".into(),
                categories: titles
                    .iter()
                    .map(|title| Category::new(title.to_lowercase(), *title))
                    .collect(),
                ..BusinessDetails::default()
            },
            reviews,
            images: Vec::new(),
        }
    }

    fn five_star(count: usize) -> Vec<Review> {
        (0..count)
            .map(|idx| Review::new(format!("r{idx}"), Rating::new(5.0).unwrap(), "Delicious and clean"))
            .collect()
    }

    #[test]
    fn default_engine_approves_well_reviewed_restaurant() {
        let underwriter = Underwriter::new(UnderwritingConfig::default()).unwrap();
        let report = underwriter.underwrite(&case(&["American (New)", "Grill"], five_star(6)));
        assert_eq!(report.risk_assessment.primary_class_code, ClassCode::FullServiceRestaurant);
        assert_eq!(report.risk_assessment.risk_level, RiskLevel::Low);
        assert_eq!(report.risk_assessment.eligibility, Eligibility::Eligible);
        assert_eq!(report.recommendation, Recommendation::ApproveStandard);
    }

    #[test]
    fn empty_review_set_still_produces_report() {
        let underwriter = Underwriter::new(UnderwritingConfig::default()).unwrap();
        let report = underwriter.underwrite(&case(&[], Vec::new()));
        assert_eq!(report.sentiment_analysis.total_reviews, 0);
        assert_eq!(report.risk_assessment.risk_level, RiskLevel::Medium);
        assert_eq!(report.recommendation, Recommendation::ApproveWithMonitoring);
    }

    #[test]
    fn configuration_flows_into_scoring() {
        let mut config = UnderwritingConfig::default();
        config.risk.critical_keywords.push("clean".into());
        config.sentiment.negative_indicators.push("clean".into());
        let underwriter = Underwriter::new(config).unwrap();
        let report = underwriter.underwrite(&case(&["Grill"], five_star(3)));
        assert_eq!(report.risk_assessment.eligibility, Eligibility::Ineligible);
        assert_eq!(
            report.risk_assessment.score_breakdown.critical_keywords,
            vec!["clean".to_string()]
        );
    }

    #[test]
    fn mixed_case_critical_keyword_still_declines() {
        let mut config = UnderwritingConfig::default();
        config.risk.critical_keywords = vec!["Hazard".into()];
        let underwriter = Underwriter::new(config).unwrap();
        let reviews = (0..5)
            .map(|idx| {
                Review::new(
                    format!("r{idx}"),
                    Rating::new(5.0).unwrap(),
                    "Great food, but a fire hazard by the exit",
                )
            })
            .collect();
        let report = underwriter.underwrite(&case(&["Grill"], reviews));
        assert_eq!(report.risk_assessment.eligibility, Eligibility::Ineligible);
        assert_eq!(report.recommendation, Recommendation::Decline);
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let mut config = UnderwritingConfig::default();
        config.risk.low_max_score = 5;
        let err = Underwriter::new(config).unwrap_err();
        assert!(err.to_string().contains("configuration is invalid"));
    }

    #[tokio::test]
    async fn enriched_underwriting_attaches_narrative() {
        let underwriter = Underwriter::new(UnderwritingConfig::default()).unwrap();
        let case = case(&["Grill"], five_star(2));
        let plain = underwriter.underwrite(&case);
        let enriched = underwriter
            .underwrite_enriched(&case, &HeuristicNarrativeProvider)
            .await;
        let narrative = enriched.narrative.as_ref().expect("narrative attached");
        assert_eq!(narrative.provider, "heuristic");
        assert_eq!(enriched.risk_assessment, plain.risk_assessment);
    }
}
