use std::sync::Arc;

use bevy_ecs::prelude::*;
use bevy_utils::tracing::{info, warn};
use rand::Rng;

use crate::core::config::EngineConfig;
use crate::graph::entity::Entity;
use crate::graph::loader::{load_knowledge_graph, GraphDataError};
use crate::graph::model::KnowledgeGraph;
use crate::rules::registry::RuleRegistry;
use crate::simulation::evolution::{EvolutionConfig, GeneticEvolutionEngine};
use crate::simulation::impact::{ImpactAnalyzer, ImpactRecord};
use crate::simulation::scenario::{EventSpec, ScenarioDefinition, ScenarioModeler, ScenarioOutcome};

/// Entry point the outer layers call into: one shared graph, one shared
/// rule registry, and the analyzers built over them.
#[derive(Resource, Debug, Clone)]
pub struct ReasoningCore {
    graph: Arc<KnowledgeGraph>,
    analyzer: ImpactAnalyzer,
    modeler: ScenarioModeler,
    trace_depth: usize,
    evolution: EvolutionConfig,
}

impl ReasoningCore {
    pub fn new(graph: Arc<KnowledgeGraph>, rules: Arc<RuleRegistry>, config: &EngineConfig) -> Self {
        let analyzer = ImpactAnalyzer::new(rules);
        let modeler = ScenarioModeler::new(analyzer.clone())
            .with_key_chain_limit(config.key_chain_limit);
        Self {
            graph,
            analyzer,
            modeler,
            trace_depth: config.trace_depth.max(1),
            evolution: config.evolution.clone(),
        }
    }

    /// Load the graph and rule files named by `config`. A missing graph path
    /// yields an empty graph; unreadable rule files fall back to built-ins.
    pub fn from_config(config: &EngineConfig) -> Result<Self, GraphDataError> {
        let graph = match &config.graph_path {
            Some(path) => load_knowledge_graph(path)?,
            None => {
                warn!("no graph path configured; starting with an empty graph");
                KnowledgeGraph::default()
            }
        };
        let rules = RuleRegistry::from_paths(&config.rule_paths)
            .with_default_id(config.default_ruleset_id.clone());
        info!(
            entities = graph.entities().len(),
            rulesets = ?rules.ruleset_ids(),
            "reasoning core ready"
        );
        Ok(Self::new(Arc::new(graph), Arc::new(rules), config))
    }

    pub fn graph(&self) -> &Arc<KnowledgeGraph> {
        &self.graph
    }

    pub fn analyzer(&self) -> &ImpactAnalyzer {
        &self.analyzer
    }

    pub fn analyze_impact(&self, seed: &Entity) -> Vec<ImpactRecord> {
        self.analyzer
            .trace_impacts(seed, &self.graph, self.trace_depth, None)
    }

    /// `analyze_impact` for a seed already in the graph. `None` if the id is unknown.
    pub fn analyze_entity(&self, entity_id: &str) -> Option<Vec<ImpactRecord>> {
        self.graph
            .entity(entity_id)
            .map(|seed| self.analyze_impact(seed))
    }

    pub fn simulate_scenario(&self, name: &str, events: Vec<EventSpec>) -> ScenarioOutcome {
        self.run_what_if(&ScenarioDefinition {
            name: name.to_string(),
            description: String::new(),
            events_to_introduce: events,
        })
    }

    pub fn run_what_if(&self, scenario: &ScenarioDefinition) -> ScenarioOutcome {
        self.modeler
            .run_what_if(&self.graph, scenario, self.trace_depth)
    }

    /// A fresh evolution engine over the shared graph. Each caller owns its engine.
    pub fn evolution_engine<R: Rng>(&self, rng: R) -> GeneticEvolutionEngine<R> {
        GeneticEvolutionEngine::new(
            self.analyzer.clone(),
            Arc::clone(&self.graph),
            self.evolution.clone(),
            rng,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn core() -> ReasoningCore {
        let config = EngineConfig {
            graph_path: Some(
                concat!(env!("CARGO_MANIFEST_DIR"), "/assets/data/knowledge_graph.json").into(),
            ),
            rule_paths: vec![
                concat!(env!("CARGO_MANIFEST_DIR"), "/assets/rules/macro_shocks.json").into(),
            ],
            ..Default::default()
        };
        ReasoningCore::from_config(&config).unwrap()
    }

    #[test]
    fn analyzes_sample_news() {
        let records = core().analyze_entity("news_alpha_upbeat").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target_entity_id, "comp_alpha");
        assert!(core().analyze_entity("news_missing").is_none());
    }

    #[test]
    fn scenario_leaves_shared_graph_alone() {
        let core = core();
        let before = (**core.graph()).clone();
        let outcome = core.simulate_scenario(
            "Chip export ban",
            vec![EventSpec::new("PoliticalEvent", "pol_chip_ban", "Chip export ban")
                .with_attribute("event_subtype", "TradeRestrictionInitiated")
                .with_attribute("affected_sectors", vec!["ind_tech"])],
        );
        assert_eq!(**core.graph(), before);
        assert!(outcome.full_impact_chain_count >= 1);
        assert_eq!(outcome.key_impact_chains[0].target_entity_id, "ind_tech");
    }

    #[test]
    fn evolution_engines_are_independent() {
        let core = core();
        let mut a = core.evolution_engine(StdRng::seed_from_u64(1));
        let b = core.evolution_engine(StdRng::seed_from_u64(1));
        a.initialize_population("pol_tariffs");
        assert_eq!(a.population().len(), 10);
        assert!(b.population().is_empty());
    }
}
