use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::classify::{NarrativeKind, NarrativeTag};
use crate::error::ConfigError;
use crate::normalize::NormalizedFeatures;
use crate::scoring::weights::{
    FeatureWeights, NarrativeBonus, NarrativeBonusTable, ScorerWeights, MAX_NARRATIVE_BONUS,
    SUBTOTAL_CEILING,
};

pub const MAX_SCORE: f64 = SUBTOTAL_CEILING + MAX_NARRATIVE_BONUS;

pub const FACTOR_ENGAGEMENT: &str = "engagement_intensity";
pub const FACTOR_DISCUSSION: &str = "discussion_density";
pub const FACTOR_CONSENSUS: &str = "consensus_strength";
pub const FACTOR_RECENCY: &str = "recency_decay";
pub const FACTOR_NARRATIVE: &str = "narrative_bonus";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreTier {
    Low,
    Moderate,
    High,
    Breakout,
}

impl ScoreTier {
    pub fn label(self) -> &'static str {
        match self {
            ScoreTier::Low => "Low",
            ScoreTier::Moderate => "Moderate",
            ScoreTier::High => "High",
            ScoreTier::Breakout => "Breakout",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViralityScore {
    /// 0..=20, one decimal place.
    pub total: f64,
    /// Unrounded contribution of every term; sums to `total` within 0.05.
    pub breakdown: BTreeMap<String, f64>,
}

impl ViralityScore {
    pub fn tier(&self) -> ScoreTier {
        if self.total < 8.0 {
            ScoreTier::Low
        } else if self.total < 12.0 {
            ScoreTier::Moderate
        } else if self.total < 16.0 {
            ScoreTier::High
        } else {
            ScoreTier::Breakout
        }
    }

    pub fn contribution(&self, factor: &str) -> f64 {
        self.breakdown.get(factor).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViralityScorer {
    weights: FeatureWeights,
    bonus: NarrativeBonus,
}

impl ViralityScorer {
    pub fn new(weights: FeatureWeights, bonus: NarrativeBonus) -> Self {
        Self { weights, bonus }
    }

    pub fn from_config(
        weights: &ScorerWeights,
        bonus: &NarrativeBonusTable,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            FeatureWeights::from_config(weights)?,
            NarrativeBonus::from_config(bonus)?,
        ))
    }

    pub fn weights(&self) -> &FeatureWeights {
        &self.weights
    }

    pub fn score(&self, features: &NormalizedFeatures, tag: &NarrativeTag) -> ViralityScore {
        let terms = [
            (
                FACTOR_ENGAGEMENT,
                features.engagement_intensity * self.weights.engagement_intensity(),
            ),
            (
                FACTOR_DISCUSSION,
                features.discussion_density * self.weights.discussion_density(),
            ),
            (
                FACTOR_CONSENSUS,
                features.consensus_strength * self.weights.consensus_strength(),
            ),
            (
                FACTOR_RECENCY,
                features.recency_decay * self.weights.recency_decay(),
            ),
            (FACTOR_NARRATIVE, self.bonus.bonus(tag.kind)),
        ];

        let mut breakdown = BTreeMap::new();
        let mut raw = 0.0;
        for (factor, contribution) in terms {
            let contribution = if contribution.is_finite() {
                contribution.max(0.0)
            } else {
                0.0
            };
            raw += contribution;
            breakdown.insert(factor.to_string(), contribution);
        }

        ViralityScore {
            total: round_tenth(raw.clamp(0.0, MAX_SCORE)),
            breakdown,
        }
    }

    pub fn narrative_bonus(&self, kind: NarrativeKind) -> f64 {
        self.bonus.bonus(kind)
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
