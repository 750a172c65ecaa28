use bevy_utils::tracing::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::entity::{Attributes, Entity, EntityCore, EntityKind};
use crate::graph::model::KnowledgeGraph;
use crate::simulation::event::{ConceptualEvent, TraceEvent};
use crate::simulation::impact::{ImpactAnalyzer, ImpactRecord};

pub const DEFAULT_KEY_CHAIN_LIMIT: usize = 5;

/// A hypothetical event to introduce. `event_type` is an entity variant
/// name for concrete events; anything else becomes a conceptual event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSpec {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub attributes: Attributes,
    /// Overlay `attributes` onto this existing entity instead of adding a new one.
    #[serde(default)]
    pub changes_to_existing_entity_id: Option<String>,
}

impl EventSpec {
    pub fn new(event_type: impl Into<String>, entity_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            entity_id: entity_id.into(),
            name: name.into(),
            attributes: Attributes::new(),
            changes_to_existing_entity_id: None,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn changing(mut self, entity_id: impl Into<String>) -> Self {
        self.changes_to_existing_entity_id = Some(entity_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub events_to_introduce: Vec<EventSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub scenario_name: String,
    pub description: String,
    pub triggers_processed: Vec<String>,
    pub key_impact_chains: Vec<ImpactRecord>,
    pub full_impact_chain_count: usize,
    pub narrative_summary: String,
}

/// What-if runner. The caller's graph is never touched: each run works on
/// its own deep copy.
#[derive(Debug, Clone)]
pub struct ScenarioModeler {
    analyzer: ImpactAnalyzer,
    key_chain_limit: usize,
    ruleset_id: Option<String>,
}

impl ScenarioModeler {
    pub fn new(analyzer: ImpactAnalyzer) -> Self {
        Self {
            analyzer,
            key_chain_limit: DEFAULT_KEY_CHAIN_LIMIT,
            ruleset_id: None,
        }
    }

    pub fn with_key_chain_limit(mut self, limit: usize) -> Self {
        self.key_chain_limit = limit;
        self
    }

    pub fn with_ruleset(mut self, ruleset_id: Option<String>) -> Self {
        self.ruleset_id = ruleset_id;
        self
    }

    pub fn run_what_if(
        &self,
        base_graph: &KnowledgeGraph,
        scenario: &ScenarioDefinition,
        target_depth: usize,
    ) -> ScenarioOutcome {
        if scenario.events_to_introduce.is_empty() {
            return ScenarioOutcome {
                scenario_name: scenario.name.clone(),
                description: format!(
                    "{} (no events to introduce; nothing was simulated)",
                    scenario.description
                )
                .trim_start()
                .to_string(),
                triggers_processed: Vec::new(),
                key_impact_chains: Vec::new(),
                full_impact_chain_count: 0,
                narrative_summary: format!(
                    "Scenario '{}' introduced no events, so no impacts were traced.",
                    scenario.name
                ),
            };
        }

        let mut scratch = base_graph.clone();
        let triggers: Vec<TraceEvent> = scenario
            .events_to_introduce
            .iter()
            .enumerate()
            .map(|(position, spec)| introduce(&mut scratch, spec, position))
            .collect();

        let mut records = Vec::new();
        for trigger in &triggers {
            let traced = self.analyzer.trace_event(
                trigger.clone(),
                &scratch,
                target_depth,
                self.ruleset_id.as_deref(),
            );
            debug!(trigger = trigger.id(), records = traced.len(), "scenario trigger traced");
            records.extend(traced);
        }

        let full_impact_chain_count = records.len();
        let triggers_processed: Vec<String> =
            triggers.iter().map(|trigger| trigger.id().to_string()).collect();
        let narrative_summary = summarize(&scenario.name, &triggers_processed, &records);
        records.truncate(self.key_chain_limit);

        info!(
            scenario = %scenario.name,
            triggers = triggers_processed.len(),
            impacts = full_impact_chain_count,
            "what-if scenario complete"
        );
        ScenarioOutcome {
            scenario_name: scenario.name.clone(),
            description: scenario.description.clone(),
            triggers_processed,
            key_impact_chains: records,
            full_impact_chain_count,
            narrative_summary,
        }
    }
}

/// Materialize one `EventSpec` against the scratch graph.
fn introduce(scratch: &mut KnowledgeGraph, spec: &EventSpec, position: usize) -> TraceEvent {
    let id = if spec.entity_id.trim().is_empty() {
        format!("scenario_event_{}", position + 1)
    } else {
        spec.entity_id.clone()
    };
    let name = if spec.name.trim().is_empty() {
        id.clone()
    } else {
        spec.name.clone()
    };
    let mut attributes = spec.attributes.clone();

    if let Some(existing) = &spec.changes_to_existing_entity_id {
        if !scratch.merge_attributes(existing, &spec.attributes) {
            warn!(entity_id = %existing, "scenario change targets an unknown entity");
        }
        attributes.insert(
            "changes_to_existing_entity_id".to_string(),
            Value::from(existing.as_str()),
        );
        attributes
            .entry("key_entities_mentioned_ids".to_string())
            .or_insert_with(|| Value::from(vec![existing.clone()]));
    }

    match spec.event_type.parse::<EntityKind>() {
        Ok(kind) => {
            let entity = Entity::from_parts(
                kind,
                EntityCore {
                    attributes,
                    ..EntityCore::new(id, name)
                },
            );
            if spec.changes_to_existing_entity_id.is_none() {
                if scratch.contains(entity.id()) {
                    warn!(entity_id = entity.id(), "scenario event id already in graph; not inserted");
                } else {
                    scratch.insert_entity(entity.clone());
                }
            }
            TraceEvent::Entity(entity)
        }
        Err(_) => TraceEvent::Conceptual(ConceptualEvent {
            id,
            name,
            event_type: spec.event_type.clone(),
            attributes,
            subject_id: spec.changes_to_existing_entity_id.clone(),
        }),
    }
}

fn summarize(name: &str, triggers: &[String], records: &[ImpactRecord]) -> String {
    if records.is_empty() {
        return format!(
            "Scenario '{}' processed {} trigger event(s); no rule produced an impact.",
            name,
            triggers.len()
        );
    }
    let deepest = records
        .iter()
        .map(|record| record.order_in_chain)
        .max()
        .unwrap_or(1);
    let top = &records[0];
    format!(
        "Scenario '{}' starting with {} produced {} impact(s) up to order {}; leading impact: {} on {} (p={:.2}).",
        name,
        triggers.first().map(String::as_str).unwrap_or("no trigger"),
        records.len(),
        deepest,
        top.impact_type,
        top.target_entity_id,
        top.probability
    )
}
