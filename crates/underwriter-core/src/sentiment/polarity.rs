//! Rule-based polarity scoring.
//!
//! Word valences use a ±4 scale. Per-word valence is adjusted for nearby boosters, dampeners
//! and negations, the clause after a contrastive "but" outweighs the clause before it, and
//! exclamation marks add emphasis. The summed valence is normalised into a `compound` score
//! in `-1.0..=1.0` with `sum / sqrt(sum² + 15)`.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::SentimentScores;

const NORMALIZATION_ALPHA: f64 = 15.0;
const BOOSTER_INCREMENT: f64 = 0.293;
const NEGATION_SCALAR: f64 = -0.74;
const EXCLAMATION_INCREMENT: f64 = 0.292;
const MAX_EXCLAMATIONS: usize = 4;
const LOOKBACK: usize = 3;

static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\p{L}[\p{L}'\-]*").expect("token pattern is a valid regex"));

/// Built-in valences, one `token<TAB>valence` entry per line.
const BUILTIN_LEXICON: &str = include_str!("lexicon.txt");

static BUILTIN_VALENCES: Lazy<HashMap<String, f64>> = Lazy::new(|| {
    parse_lexicon(BUILTIN_LEXICON).expect("built-in lexicon is well formed")
});

const NEGATIONS: &[&str] = &[
    "aren't", "barely", "can't", "cannot", "didn't", "doesn't", "don't", "hardly", "isn't",
    "neither", "never", "no", "none", "nor", "not", "nothing", "wasn't", "weren't", "without",
    "won't", "wouldn't", "couldn't", "shouldn't",
];

const BOOSTERS: &[(&str, f64)] = &[
    ("absolutely", BOOSTER_INCREMENT),
    ("extremely", BOOSTER_INCREMENT),
    ("highly", BOOSTER_INCREMENT),
    ("incredibly", BOOSTER_INCREMENT),
    ("really", BOOSTER_INCREMENT),
    ("so", BOOSTER_INCREMENT),
    ("super", BOOSTER_INCREMENT),
    ("totally", BOOSTER_INCREMENT),
    ("truly", BOOSTER_INCREMENT),
    ("very", BOOSTER_INCREMENT),
    ("marginally", -BOOSTER_INCREMENT),
    ("partly", -BOOSTER_INCREMENT),
    ("slightly", -BOOSTER_INCREMENT),
    ("somewhat", -BOOSTER_INCREMENT),
];

/// Lexicon-backed scorer producing `compound`, `pos`, `neg` and `neu` for free text.
#[derive(Debug, Clone)]
pub struct PolarityScorer {
    valences: HashMap<String, f64>,
    boosters: HashMap<String, f64>,
}

impl Default for PolarityScorer {
    fn default() -> Self {
        Self {
            valences: BUILTIN_VALENCES.clone(),
            boosters: BOOSTERS
                .iter()
                .map(|(word, scalar)| ((*word).to_string(), *scalar))
                .collect(),
        }
    }
}

impl PolarityScorer {
    /// Add or replace a lexicon entry.
    pub fn with_term(mut self, word: &str, valence: f64) -> Self {
        self.valences.insert(word.to_lowercase(), valence);
        self
    }

    /// Merge a lexicon file in VADER's format (`token<TAB>mean<TAB>...`). Entries replace
    /// built-in valences for the same token.
    pub fn with_lexicon_file(mut self, path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read sentiment lexicon {}", path.display()))?;
        let entries = parse_lexicon(&source)
            .with_context(|| format!("invalid sentiment lexicon {}", path.display()))?;
        self.valences.extend(entries);
        Ok(self)
    }

    pub fn lexicon_len(&self) -> usize {
        self.valences.len()
    }

    pub fn valence(&self, word: &str) -> Option<f64> {
        self.valences.get(&word.to_lowercase()).copied()
    }

    pub fn score(&self, text: &str) -> SentimentScores {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = TOKEN_PATTERN
            .find_iter(&lowered)
            .map(|token| token.as_str())
            .collect();
        if tokens.is_empty() {
            return SentimentScores::default();
        }

        let mut valences: Vec<f64> = tokens
            .iter()
            .enumerate()
            .map(|(idx, token)| self.token_valence(&tokens, idx, token))
            .collect();
        apply_contrast(&tokens, &mut valences);

        let sum: f64 = valences.iter().sum();
        let emphasis = exclamation_emphasis(text);
        let signed_sum = if sum > 0.0 {
            sum + emphasis
        } else if sum < 0.0 {
            sum - emphasis
        } else {
            sum
        };

        let (pos, neg, neu) = proportions(&valences, emphasis);
        SentimentScores {
            compound: normalize(signed_sum),
            pos,
            neg,
            neu,
        }
    }

    fn token_valence(&self, tokens: &[&str], idx: usize, token: &str) -> f64 {
        let Some(mut valence) = self.valences.get(token).copied() else {
            return 0.0;
        };
        let window = &tokens[idx.saturating_sub(LOOKBACK)..idx];
        for (distance, previous) in window.iter().rev().enumerate() {
            if let Some(scalar) = self.boosters.get(*previous) {
                let decay = match distance {
                    0 => 1.0,
                    1 => 0.95,
                    _ => 0.9,
                };
                let directed = if valence < 0.0 { -scalar } else { *scalar };
                valence += directed * decay;
            }
        }
        if window.iter().any(|previous| is_negation(previous)) {
            valence *= NEGATION_SCALAR;
        }
        valence
    }
}

fn parse_lexicon(source: &str) -> Result<HashMap<String, f64>> {
    let mut valences = HashMap::new();
    for (idx, line) in source.lines().enumerate() {
        let mut fields = line.split('\t');
        let token = fields.next().unwrap_or_default().trim();
        if token.is_empty() {
            continue;
        }
        let raw = fields
            .next()
            .ok_or_else(|| anyhow!("line {}: missing valence for {token:?}", idx + 1))?;
        let valence: f64 = raw
            .trim()
            .parse()
            .with_context(|| format!("line {}: invalid valence {raw:?}", idx + 1))?;
        valences.insert(token.to_lowercase(), valence);
    }
    Ok(valences)
}

fn is_negation(token: &str) -> bool {
    NEGATIONS.contains(&token) || token.ends_with("n't")
}

fn apply_contrast(tokens: &[&str], valences: &mut [f64]) {
    let Some(pivot) = tokens.iter().position(|token| *token == "but") else {
        return;
    };
    for (idx, valence) in valences.iter_mut().enumerate() {
        if idx < pivot {
            *valence *= 0.5;
        } else if idx > pivot {
            *valence *= 1.5;
        }
    }
}

fn exclamation_emphasis(text: &str) -> f64 {
    let count = text.matches('!').count().min(MAX_EXCLAMATIONS);
    count as f64 * EXCLAMATION_INCREMENT
}

fn normalize(sum: f64) -> f64 {
    (sum / (sum * sum + NORMALIZATION_ALPHA).sqrt()).clamp(-1.0, 1.0)
}

fn proportions(valences: &[f64], emphasis: f64) -> (f64, f64, f64) {
    let mut pos_sum = 0.0;
    let mut neg_sum = 0.0;
    let mut neutral = 0.0;
    for valence in valences {
        if *valence > 0.0 {
            pos_sum += valence + 1.0;
        } else if *valence < 0.0 {
            neg_sum += valence - 1.0;
        } else {
            neutral += 1.0;
        }
    }
    if pos_sum > neg_sum.abs() {
        pos_sum += emphasis;
    } else if pos_sum < neg_sum.abs() {
        neg_sum -= emphasis;
    }
    let total = pos_sum + neg_sum.abs() + neutral;
    if total == 0.0 {
        return (0.0, 0.0, 0.0);
    }
    (pos_sum / total, neg_sum.abs() / total, neutral / total)
}
