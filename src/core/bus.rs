use bevy_ecs::prelude::*;
use serde::Serialize;

use crate::simulation::evolution::FutureScenario;
use crate::simulation::impact::ImpactRecord;

/// Messages agents publish for outer layers to consume.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "topic", rename_all = "snake_case")]
pub enum BusMessage {
    AgentStarted {
        agent: String,
        role: String,
    },
    EvolutionUpdate {
        agent: String,
        generation: u64,
        best_scenario: Option<FutureScenario>,
        fitness: Option<f64>,
    },
    ImpactAnalysis {
        agent: String,
        seed_id: String,
        record_count: usize,
        top_impact: Option<ImpactRecord>,
    },
    AgentError {
        agent: String,
        message: String,
    },
}

impl BusMessage {
    pub fn topic(&self) -> &'static str {
        match self {
            BusMessage::AgentStarted { .. } => "agent_started",
            BusMessage::EvolutionUpdate { .. } => "evolution_update",
            BusMessage::ImpactAnalysis { .. } => "impact_analysis",
            BusMessage::AgentError { .. } => "agent_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub tick: u64,
    #[serde(flatten)]
    pub message: BusMessage,
}

/// Resource collecting published messages until a caller drains them.
#[derive(Resource, Debug, Default)]
pub struct EventBus(pub Vec<Envelope>);

impl EventBus {
    pub fn publish(&mut self, tick: u64, message: BusMessage) {
        self.0.push(Envelope { tick, message });
    }

    pub fn drain(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.0)
    }

    pub fn count(&self, topic: &str) -> usize {
        self.0
            .iter()
            .filter(|envelope| envelope.message.topic() == topic)
            .count()
    }
}
