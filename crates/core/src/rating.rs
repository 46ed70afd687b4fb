//! Categorical match ratings produced by the analyzer.

use serde::{Deserialize, Serialize};

/// Rating labels understood by the pipeline.
///
/// Two vocabularies are in use (prompt templates have changed over time), so
/// several labels share an ordinal score.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchRating {
    Poor,
    Unlikely,
    Marginal,
    Mediocre,
    Competitive,
    Decent,
    Strong,
    Good,
    Excellent,
}

impl MatchRating {
    /// Parse a label, ignoring case and surrounding whitespace.
    pub fn parse(label: &str) -> Option<Self> {
        let rating = match label.trim().to_ascii_uppercase().as_str() {
            "POOR" => Self::Poor,
            "UNLIKELY" => Self::Unlikely,
            "MARGINAL" => Self::Marginal,
            "MEDIOCRE" => Self::Mediocre,
            "COMPETITIVE" => Self::Competitive,
            "DECENT" => Self::Decent,
            "STRONG" => Self::Strong,
            "GOOD" => Self::Good,
            "EXCELLENT" => Self::Excellent,
            _ => return None,
        };
        Some(rating)
    }

    /// Ordinal score in `0..=5`.
    pub fn score(self) -> u8 {
        match self {
            Self::Poor => 0,
            Self::Unlikely => 1,
            Self::Marginal | Self::Mediocre => 2,
            Self::Competitive | Self::Decent => 3,
            Self::Strong | Self::Good => 4,
            Self::Excellent => 5,
        }
    }
}

/// Map any label to its ordinal score. Unrecognized labels score 0.
pub fn rating_score(label: &str) -> u8 {
    MatchRating::parse(label).map_or(0, MatchRating::score)
}
