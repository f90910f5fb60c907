use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classify::ClassifierConfig;
use crate::discovery::DiscoveryConfig;
use crate::error::ConfigError;
use crate::normalize::NormalizerConfig;
use crate::pipeline::OrchestratorConfig;
use crate::scoring::{NarrativeBonusTable, ScorerWeights, ViralityScorer};
use crate::synthesis::{SynthesisConfig, SynthesisSettings};

/// Key of the fallback hook pool.
pub const GENERIC_POOL: &str = "generic";

/// Every option the pipeline recognizes, as read from TOML. Nothing here is
/// trusted until [`PipelineConfig::validate`] turns it into a
/// [`ValidatedConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub scorer_weights: ScorerWeights,
    pub narrative_bonus_table: NarrativeBonusTable,
    pub hook_templates: BTreeMap<String, Vec<String>>,
    pub pattern_interrupt_pool: Vec<String>,
    pub cta_pool: Vec<String>,
    pub cta_by_tag: BTreeMap<String, Vec<String>>,
    pub max_script_length: usize,
    pub min_body_length: usize,
    pub recency_half_life_hours: f64,
    pub normalizer: NormalizerConfig,
    pub classifier: ClassifierConfig,
    pub synthesis: SynthesisConfig,
    pub pipeline: OrchestratorConfig,
    pub discovery: DiscoveryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scorer_weights: ScorerWeights::default(),
            narrative_bonus_table: NarrativeBonusTable::default(),
            hook_templates: default_hook_templates(),
            pattern_interrupt_pool: strings(&[
                "But here's where it gets interesting...",
                "Now pay attention to what happens next...",
                "This is the part most people miss...",
                "You might want to see this part...",
                "But that's not even the craziest part...",
            ]),
            cta_pool: strings(&[
                "Follow for more unbelievable stories.",
                "Like and follow for more content that will blow your mind.",
                "Let me know in the comments if you've experienced something similar.",
                "Share this with someone who needs to see this.",
                "Comment if you want to see more like this.",
            ]),
            cta_by_tag: default_cta_by_tag(),
            max_script_length: 500,
            min_body_length: 50,
            recency_half_life_hours: 48.0,
            normalizer: NormalizerConfig::default(),
            classifier: ClassifierConfig::default(),
            synthesis: SynthesisConfig::default(),
            pipeline: OrchestratorConfig::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

/// Configuration whose invariants have been checked. Built only through
/// [`PipelineConfig::validate`].
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub scorer: ViralityScorer,
    pub normalizer: NormalizerConfig,
    pub recency_half_life: Duration,
    pub classifier: ClassifierConfig,
    pub synthesis: SynthesisSettings,
    pub orchestrator: OrchestratorConfig,
}

impl PipelineConfig {
    /// Reads the TOML file (or defaults) and applies env overrides. Call
    /// [`PipelineConfig::validate`] before use.
    pub fn load(path: Option<PathBuf>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let config_path = path.or_else(default_config_path);
        let mut config = if let Some(path) = config_path.as_ref() {
            if path.exists() {
                let contents = std::fs::read_to_string(path)
                    .map_err(|err| ConfigError::Read(err.to_string()))?;
                toml::from_str(&contents).map_err(|err| ConfigError::Parse(err.to_string()))?
            } else {
                PipelineConfig::default()
            }
        } else {
            PipelineConfig::default()
        };

        config.apply_env_overrides();
        Ok((config, config_path))
    }

    pub fn write(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| ConfigError::Write(err.to_string()))?;
        }
        let payload =
            toml::to_string_pretty(self).map_err(|err| ConfigError::Write(err.to_string()))?;
        std::fs::write(path, payload).map_err(|err| ConfigError::Write(err.to_string()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        let scorer =
            ViralityScorer::from_config(&self.scorer_weights, &self.narrative_bonus_table)?;

        if !self.recency_half_life_hours.is_finite() || self.recency_half_life_hours <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "recency_half_life_hours",
                reason: format!(
                    "must be a positive number of hours, got {}",
                    self.recency_half_life_hours
                ),
            });
        }
        let recency_half_life = Duration::from_secs_f64(self.recency_half_life_hours * 3600.0);

        self.normalizer.validate()?;
        self.classifier.validate()?;
        self.pipeline.validate()?;
        let synthesis = SynthesisSettings::from_config(self)?;

        Ok(ValidatedConfig {
            scorer,
            normalizer: self.normalizer.clone(),
            recency_half_life,
            classifier: self.classifier.clone(),
            synthesis,
            orchestrator: self.pipeline.clone(),
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var("PIPELINE_MAX_SCRIPT_LENGTH") {
            if let Ok(value) = value.parse::<usize>() {
                self.max_script_length = value;
            }
        }
        if let Ok(value) = env::var("PIPELINE_MIN_BODY_LENGTH") {
            if let Ok(value) = value.parse::<usize>() {
                self.min_body_length = value;
            }
        }
        if let Ok(value) = env::var("PIPELINE_HALF_LIFE_HOURS") {
            if let Ok(value) = value.parse::<f64>() {
                self.recency_half_life_hours = value;
            }
        }
        if let Ok(value) = env::var("PIPELINE_MAX_CONCURRENCY") {
            if let Ok(value) = value.parse::<usize>() {
                self.pipeline.max_concurrency = value;
            }
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    env::var("PIPELINE_CONFIG_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| Some(PathBuf::from("config/pipeline.toml")))
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn default_hook_templates() -> BTreeMap<String, Vec<String>> {
    let mut table = BTreeMap::new();
    table.insert(
        GENERIC_POOL.to_string(),
        strings(&[
            "You won't believe what happened when {subject} {action}...",
            "Watch how {subject} {action} and changed everything...",
            "This is why {subject} will never {action} again...",
            "{subject} thought nobody would notice when they {action}...",
            "The real reason why {subject} decided to {action}...",
        ]),
    );
    table.insert(
        "storytelling".to_string(),
        strings(&[
            "{title}... and it only got worse from there.",
            "{score} people couldn't stop reading this story.",
            "Nobody in r/{community} saw this ending coming.",
        ]),
    );
    table.insert(
        "confession".to_string(),
        strings(&[
            "Someone finally admitted it: {title}",
            "This confession got {score} upvotes overnight.",
        ]),
    );
    table.insert(
        "debate".to_string(),
        strings(&[
            "{comments} people are fighting about this right now.",
            "The internet can't agree on this one: {title}",
        ]),
    );
    table.insert(
        "informational".to_string(),
        strings(&[
            "The shocking truth about {subject}...",
            "Here's a fact that might surprise you: {title}",
        ]),
    );
    table
}

fn default_cta_by_tag() -> BTreeMap<String, Vec<String>> {
    let mut table = BTreeMap::new();
    table.insert(
        "debate".to_string(),
        strings(&["Which side are you on? Tell me in the comments."]),
    );
    table.insert(
        "confession".to_string(),
        strings(&["Would you have kept the secret? Let me know below."]),
    );
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_round_trips_through_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pipeline.toml");
        let mut config = PipelineConfig::default();
        config.max_script_length = 640;
        config.write(&path).unwrap();

        let (loaded, loaded_path) = PipelineConfig::load(Some(path.clone())).unwrap();
        assert_eq!(loaded.max_script_length, 640);
        assert_eq!(loaded_path, Some(path));
    }

    #[test]
    fn load_defers_validation_to_the_caller() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        let mut config = PipelineConfig::default();
        config.synthesis.body_budget = 3;
        config.write(&path).unwrap();

        let (loaded, _) = PipelineConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.synthesis.body_budget, 3);
        assert!(matches!(
            loaded.validate(),
            Err(ConfigError::InvalidValue { field: "synthesis.body_budget", .. })
        ));
    }

    #[test]
    fn body_budget_must_leave_room_past_the_marker() {
        let mut config = PipelineConfig::default();
        config.synthesis.body_budget = 4;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "synthesis.body_budget", .. })
        ));

        config.synthesis.body_budget = 5;
        assert!(config.validate().is_ok());

        config.synthesis.body_budget = 1;
        config.synthesis.continuation_marker = "  ".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            min_body_length = 80

            [scorer_weights]
            engagement_intensity = 8.0
            discussion_density = 4.0
            consensus_strength = 2.0
            recency_decay = 2.0
            "#,
        )
        .unwrap();
        assert_eq!(config.min_body_length, 80);
        assert_eq!(config.max_script_length, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_weight_factor_is_rejected() {
        let result: Result<PipelineConfig, _> = toml::from_str(
            r#"
            [scorer_weights]
            engagement_intensity = 6.0
            discussion_density = 5.0
            consensus_strength = 3.0
            recency_decay = 1.0
            virality_vibes = 1.0
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn non_positive_half_life_is_rejected() {
        let mut config = PipelineConfig::default();
        config.recency_half_life_hours = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "recency_half_life_hours", .. })
        ));
    }

    #[test]
    fn missing_generic_hooks_fail_validation() {
        let mut config = PipelineConfig::default();
        config.hook_templates.remove(GENERIC_POOL);
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::EmptyPool(GENERIC_POOL.to_string())
        );
    }
}
