use std::fs;
use std::path::{Path, PathBuf};

use bevy_utils::tracing::{info, warn};
use serde::{Deserialize, Serialize};

use crate::rules::registry::DEFAULT_RULESET_ID;
use crate::simulation::evolution::EvolutionConfig;
use crate::simulation::scenario::DEFAULT_KEY_CHAIN_LIMIT;

pub const DEFAULT_CONFIG_PATH: &str = "./assets/config/engine.json";
pub const DEFAULT_GRAPH_PATH: &str = "./assets/data/knowledge_graph.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    /// Event name the evolution agent seeds its population from.
    pub seed_event: Option<String>,
    pub interval_ticks: u64,
    pub backoff_ticks: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "agent".to_string(),
            seed_event: None,
            interval_ticks: 1,
            backoff_ticks: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub evolution: AgentConfig,
    pub impact_watch: AgentConfig,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            evolution: AgentConfig {
                name: "evolution".to_string(),
                seed_event: Some("Market shock".to_string()),
                interval_ticks: 2,
                backoff_ticks: 5,
            },
            impact_watch: AgentConfig {
                name: "impact-watch".to_string(),
                seed_event: None,
                interval_ticks: 1,
                backoff_ticks: 3,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub graph_path: Option<PathBuf>,
    pub rule_paths: Vec<PathBuf>,
    pub default_ruleset_id: String,
    pub trace_depth: usize,
    pub key_chain_limit: usize,
    pub evolution: EvolutionConfig,
    pub agents: AgentsConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            graph_path: Some(PathBuf::from(DEFAULT_GRAPH_PATH)),
            rule_paths: Vec::new(),
            default_ruleset_id: DEFAULT_RULESET_ID.to_string(),
            trace_depth: 2,
            key_chain_limit: DEFAULT_KEY_CHAIN_LIMIT,
            evolution: EvolutionConfig::default(),
            agents: AgentsConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trace_depth == 0 {
            return Err(ConfigError::Validation(
                "trace_depth must be at least 1".to_string(),
            ));
        }
        let evolution = &self.evolution;
        for (name, value) in [
            ("mutation_rate", evolution.mutation_rate),
            ("elite_fraction", evolution.elite_fraction),
            ("analysis_weight", evolution.analysis_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "evolution.{} {} outside [0, 1]",
                    name, value
                )));
            }
        }
        if evolution.min_horizon_days < 0 || evolution.min_horizon_days > evolution.max_horizon_days {
            return Err(ConfigError::Validation(format!(
                "evolution horizon {}..={} is not a valid day range",
                evolution.min_horizon_days, evolution.max_horizon_days
            )));
        }
        for agent in [&self.agents.evolution, &self.agents.impact_watch] {
            if agent.interval_ticks == 0 {
                return Err(ConfigError::Validation(format!(
                    "agent {} interval_ticks must be at least 1",
                    agent.name
                )));
            }
        }
        Ok(())
    }

    /// Load the file, or fall back to defaults with a warning.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match load_engine_config(path) {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "engine config unavailable; using defaults");
                Self::default()
            }
        }
    }
}

pub fn load_engine_config(path: impl AsRef<Path>) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config: EngineConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
        path: path.display().to_string(),
        source,
    })?;
    config.validate()?;
    info!(path = %path.display(), "engine config loaded");
    Ok(config)
}
