use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::model::{
    BusinessDetails, CaseRepository, ImageAnalysis, Rating, Review, UnderwritingCase,
    UnderwritingError,
};

/// Loads a case from `business.json`, `reviews.json` and `images.json` under a base directory.
///
/// Only `business.json` is mandatory; missing review or image files yield empty lists.
pub struct FileCaseRepository {
    base_path: PathBuf,
    cache: OnceCell<UnderwritingCase>,
}

impl FileCaseRepository {
    /// Create a repository rooted at the given directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            cache: OnceCell::new(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn business_path(&self) -> PathBuf {
        self.base_path.join("business.json")
    }

    fn reviews_path(&self) -> PathBuf {
        self.base_path.join("reviews.json")
    }

    fn images_path(&self) -> PathBuf {
        self.base_path.join("images.json")
    }

    fn load_business(&self) -> Result<BusinessDetails> {
        let path = self.business_path();
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read business details at {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid business details JSON at {}", path.display()))
    }

    fn load_reviews(&self) -> Result<Vec<Review>> {
        let path = self.reviews_path();
        if !path.exists() {
            debug!(path = %path.display(), "no review file; continuing without reviews");
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read reviews at {}", path.display()))?;
        let items: Vec<RawReview> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid JSON structure in review file at {}", path.display()))?;
        Ok(normalize_reviews(items))
    }

    fn load_images(&self) -> Result<Vec<ImageAnalysis>> {
        let path = self.images_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read image analyses at {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid JSON structure in image file at {}", path.display()))
    }
}

#[async_trait]
impl CaseRepository for FileCaseRepository {
    async fn load_case(&self) -> Result<UnderwritingCase> {
        let case = self.cache.get_or_try_init(|| {
            let case = UnderwritingCase {
                business: self.load_business()?,
                reviews: self.load_reviews()?,
                images: self.load_images()?,
            };
            debug!(
                base_path = %self.base_path.display(),
                reviews = case.reviews.len(),
                images = case.images.len(),
                "case loaded"
            );
            Ok::<_, anyhow::Error>(case)
        })?;
        Ok(case.clone())
    }
}

/// Review as stored on disk, before boundary validation.
#[derive(Debug, Deserialize)]
struct RawReview {
    #[serde(default, alias = "review_id")]
    id: Option<String>,
    #[serde(default)]
    rating: serde_json::Value,
    #[serde(default)]
    text: Option<String>,
}

/// Drop reviews without text, recover invalid ratings and fill in missing ids.
fn normalize_reviews(items: Vec<RawReview>) -> Vec<Review> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(idx, item)| {
            let id = item
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| format!("review_{idx}"));
            let text = item.text.unwrap_or_default();
            if text.trim().is_empty() {
                debug!(review_id = %id, "skipping review without text");
                return None;
            }
            let rating = match Rating::parse(&item.rating) {
                Ok(rating) => rating,
                Err(error) => {
                    let recovered = error.recover();
                    let issue = UnderwritingError::InvalidRating {
                        review_id: id.clone(),
                        error,
                        recovered: recovered.value(),
                    };
                    warn!(%issue, "recovered invalid review rating");
                    recovered
                }
            };
            Some(Review::new(id, rating, text))
        })
        .collect()
}
