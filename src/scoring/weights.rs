use serde::{Deserialize, Serialize};

use crate::classify::NarrativeKind;
use crate::error::ConfigError;

/// Ceiling of the weighted feature sub-total. Weights must sum to exactly this.
pub const SUBTOTAL_CEILING: f64 = 16.0;
/// Largest narrative bonus a tag may receive.
pub const MAX_NARRATIVE_BONUS: f64 = 4.0;

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Weight table as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScorerWeights {
    pub engagement_intensity: f64,
    pub discussion_density: f64,
    pub consensus_strength: f64,
    pub recency_decay: f64,
}

impl Default for ScorerWeights {
    fn default() -> Self {
        Self {
            engagement_intensity: 6.0,
            discussion_density: 5.0,
            consensus_strength: 3.0,
            recency_decay: 2.0,
        }
    }
}

/// Feature weights whose sum is guaranteed to equal [`SUBTOTAL_CEILING`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureWeights {
    engagement_intensity: f64,
    discussion_density: f64,
    consensus_strength: f64,
    recency_decay: f64,
}

impl FeatureWeights {
    pub fn new(
        engagement_intensity: f64,
        discussion_density: f64,
        consensus_strength: f64,
        recency_decay: f64,
    ) -> Result<Self, ConfigError> {
        let named = [
            ("engagement_intensity", engagement_intensity),
            ("discussion_density", discussion_density),
            ("consensus_strength", consensus_strength),
            ("recency_decay", recency_decay),
        ];
        for (factor, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { factor, value });
            }
        }

        let actual: f64 = named.iter().map(|(_, value)| value).sum();
        if (actual - SUBTOTAL_CEILING).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigError::WeightSum {
                expected: SUBTOTAL_CEILING,
                actual,
            });
        }

        Ok(Self {
            engagement_intensity,
            discussion_density,
            consensus_strength,
            recency_decay,
        })
    }

    pub fn from_config(weights: &ScorerWeights) -> Result<Self, ConfigError> {
        Self::new(
            weights.engagement_intensity,
            weights.discussion_density,
            weights.consensus_strength,
            weights.recency_decay,
        )
    }

    pub fn engagement_intensity(&self) -> f64 {
        self.engagement_intensity
    }

    pub fn discussion_density(&self) -> f64 {
        self.discussion_density
    }

    pub fn consensus_strength(&self) -> f64 {
        self.consensus_strength
    }

    pub fn recency_decay(&self) -> f64 {
        self.recency_decay
    }
}

impl Default for FeatureWeights {
    fn default() -> Self {
        let defaults = ScorerWeights::default();
        Self {
            engagement_intensity: defaults.engagement_intensity,
            discussion_density: defaults.discussion_density,
            consensus_strength: defaults.consensus_strength,
            recency_decay: defaults.recency_decay,
        }
    }
}

/// Narrative bonus lookup as written in configuration. `unknown` always
/// receives zero and is not configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NarrativeBonusTable {
    pub storytelling: f64,
    pub confession: f64,
    pub debate: f64,
    pub informational: f64,
}

impl Default for NarrativeBonusTable {
    fn default() -> Self {
        Self {
            storytelling: 4.0,
            confession: 4.0,
            debate: 3.0,
            informational: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NarrativeBonus {
    table: [f64; 4],
}

impl NarrativeBonus {
    pub fn from_config(table: &NarrativeBonusTable) -> Result<Self, ConfigError> {
        let named = [
            ("storytelling", table.storytelling),
            ("confession", table.confession),
            ("debate", table.debate),
            ("informational", table.informational),
        ];
        for (tag, value) in named {
            if !value.is_finite() || !(0.0..=MAX_NARRATIVE_BONUS).contains(&value) {
                return Err(ConfigError::InvalidBonus {
                    tag,
                    value,
                    max: MAX_NARRATIVE_BONUS,
                });
            }
        }
        Ok(Self {
            table: [
                table.storytelling,
                table.confession,
                table.debate,
                table.informational,
            ],
        })
    }

    pub fn bonus(&self, kind: NarrativeKind) -> f64 {
        match kind {
            NarrativeKind::Storytelling => self.table[0],
            NarrativeKind::Confession => self.table[1],
            NarrativeKind::Debate => self.table[2],
            NarrativeKind::Informational => self.table[3],
            NarrativeKind::Unknown => 0.0,
        }
    }
}

impl Default for NarrativeBonus {
    fn default() -> Self {
        let defaults = NarrativeBonusTable::default();
        Self {
            table: [
                defaults.storytelling,
                defaults.confession,
                defaults.debate,
                defaults.informational,
            ],
        }
    }
}
