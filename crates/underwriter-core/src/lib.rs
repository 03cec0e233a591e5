pub mod classifier;
pub mod config;
pub mod enrichment;
pub mod file_repository;
pub mod keywords;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod risk;
pub mod sentiment;

pub use classifier::{
    classify_business, BusinessType, ClassCode, ClassCodeClassifier, ClassScores, Classification,
};
pub use config::{ConfigValidationError, UnderwritingConfig};
pub use enrichment::{
    enrich_report, AdvisoryClassification, HeuristicNarrativeProvider, Narrative,
    NarrativeProvider,
};
pub use file_repository::FileCaseRepository;
pub use model::{
    BusinessDetails, CaseRepository, ImageAnalysis, Rating, RatingError, Review,
    UnderwritingCase, UnderwritingError,
};
pub use pipeline::Underwriter;
pub use report::{assemble_report, render_report, OutputFormat, Recommendation, Report};
pub use risk::{assess_risk, Eligibility, RiskAssessment, RiskLevel, RiskScorer};
pub use sentiment::{aggregate_sentiment, OverallSentiment, SentimentAggregator};
