use std::collections::VecDeque;
use std::sync::Arc;

use bevy_utils::tracing::debug;
use bevy_utils::HashSet;
use serde::{Deserialize, Serialize};

use crate::graph::entity::Entity;
use crate::graph::model::KnowledgeGraph;
use crate::rules::catalog::{ImpactDefinition, Rule};
use crate::rules::registry::RuleRegistry;
use crate::simulation::event::{ConceptualEvent, TraceEvent};
use crate::simulation::targets::resolve_targets;

/// One hop of an impact chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactRecord {
    pub source_event_id: String,
    pub target_entity_id: String,
    pub impact_type: String,
    /// 1 for direct impacts, n for impacts reached through n-1 conceptual hops.
    pub order_in_chain: usize,
    pub probability: f64,
    pub magnitude: String,
    pub justification_rule_id: String,
    /// Seed id first, then every target id on the way here, this target last.
    pub full_path_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timescale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

struct Frontier {
    event: TraceEvent,
    depth: usize,
    path: Vec<String>,
}

/// Breadth-first rule propagation from a seed event.
///
/// Stateless between calls: the registry is shared read-only, so one
/// analyzer can serve concurrent traces over different graphs.
#[derive(Debug, Clone)]
pub struct ImpactAnalyzer {
    rules: Arc<RuleRegistry>,
}

impl ImpactAnalyzer {
    pub fn new(rules: Arc<RuleRegistry>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    pub fn trace_impacts(
        &self,
        seed: &Entity,
        graph: &KnowledgeGraph,
        depth_levels: usize,
        ruleset_id: Option<&str>,
    ) -> Vec<ImpactRecord> {
        self.trace_event(TraceEvent::Entity(seed.clone()), graph, depth_levels, ruleset_id)
    }

    pub fn trace_event(
        &self,
        seed: TraceEvent,
        graph: &KnowledgeGraph,
        depth_levels: usize,
        ruleset_id: Option<&str>,
    ) -> Vec<ImpactRecord> {
        if depth_levels == 0 {
            return Vec::new();
        }
        let catalog = self.rules.resolve(ruleset_id);
        let seed_id = seed.id().to_string();

        let mut records = Vec::new();
        let mut visited: HashSet<(String, usize)> = HashSet::default();
        let mut queue = VecDeque::new();
        queue.push_back(Frontier {
            path: vec![seed_id.clone()],
            event: seed,
            depth: 0,
        });

        while let Some(Frontier { event, depth, path }) = queue.pop_front() {
            if depth >= depth_levels || !visited.insert((event.id().to_string(), depth)) {
                continue;
            }
            for rule in catalog.matching(event.event_type(), &event) {
                for impact in &rule.impacts {
                    for target in resolve_targets(graph, impact, &event) {
                        let mut full_path = path.clone();
                        full_path.push(target.id().to_string());
                        records.push(build_record(&event, target, rule, impact, depth + 1, &full_path));
                        if depth + 1 < depth_levels {
                            queue.push_back(Frontier {
                                event: TraceEvent::Conceptual(ConceptualEvent::from_impact(
                                    &impact.impact_type,
                                    target,
                                    &rule.rule_id,
                                    impact.probability,
                                    &impact.magnitude_qualitative,
                                )),
                                depth: depth + 1,
                                path: full_path,
                            });
                        }
                    }
                }
            }
        }

        debug!(
            seed = %seed_id,
            ruleset = %catalog.ruleset_id,
            depth_levels,
            records = records.len(),
            "impact trace complete"
        );
        records
    }
}

fn build_record(
    event: &TraceEvent,
    target: &Entity,
    rule: &Rule,
    impact: &ImpactDefinition,
    order_in_chain: usize,
    full_path: &[String],
) -> ImpactRecord {
    ImpactRecord {
        source_event_id: event.id().to_string(),
        target_entity_id: target.id().to_string(),
        impact_type: impact.impact_type.clone(),
        order_in_chain,
        probability: impact.probability,
        magnitude: impact.magnitude_qualitative.clone(),
        justification_rule_id: rule.rule_id.clone(),
        full_path_ids: full_path.to_vec(),
        timescale: impact.timescale.clone(),
        explanation: impact
            .explanation_template
            .as_deref()
            .map(|template| render_explanation(template, event, target, impact)),
    }
}

fn render_explanation(
    template: &str,
    event: &TraceEvent,
    target: &Entity,
    impact: &ImpactDefinition,
) -> String {
    template
        .replace("{source_name}", event.name())
        .replace("{target_name}", target.name())
        .replace("{impact_type}", &impact.impact_type)
        .replace("{probability}", &format!("{:.2}", impact.probability))
}
