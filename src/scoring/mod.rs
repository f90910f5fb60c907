pub mod virality;
pub mod weights;

pub use virality::{ScoreTier, ViralityScore, ViralityScorer, MAX_SCORE};
pub use weights::{
    FeatureWeights, NarrativeBonus, NarrativeBonusTable, ScorerWeights, MAX_NARRATIVE_BONUS,
    SUBTOTAL_CEILING,
};
