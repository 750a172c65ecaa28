use std::collections::VecDeque;

use bevy_ecs::prelude::*;
use bevy_utils::tracing::{debug, warn};
use rand::rngs::StdRng;

use crate::core::bus::{BusMessage, EventBus};
use crate::core::config::AgentConfig;
use crate::core::service::ReasoningCore;
use crate::simulation::evolution::{EvolutionState, GeneticEvolutionEngine};

/// Global tick counter for agent scheduling.
#[derive(Resource, Debug, Default, Clone)]
pub struct AgentClock {
    pub tick: u64,
}

/// Seed entity ids waiting to be handed to the impact watcher.
#[derive(Resource, Debug, Default)]
pub struct AgentInbox(pub Vec<String>);

/// Wake-up bookkeeping: run every `interval_ticks`, wait `backoff_ticks`
/// after a failed wake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSchedule {
    pub interval_ticks: u64,
    pub backoff_ticks: u64,
    pub next_wake: u64,
    pub failures: u32,
}

impl AgentSchedule {
    pub fn new(interval_ticks: u64, backoff_ticks: u64) -> Self {
        Self {
            interval_ticks: interval_ticks.max(1),
            backoff_ticks,
            next_wake: 0,
            failures: 0,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.interval_ticks, config.backoff_ticks)
    }

    pub fn is_due(&self, tick: u64) -> bool {
        tick >= self.next_wake
    }

    pub fn record_success(&mut self, tick: u64) {
        self.failures = 0;
        self.next_wake = tick + self.interval_ticks;
    }

    pub fn record_failure(&mut self, tick: u64) {
        self.failures += 1;
        self.next_wake = tick + self.backoff_ticks.max(1);
    }
}

#[derive(Resource, Debug)]
pub struct EvolutionAgent {
    pub name: String,
    pub seed_event: String,
    pub schedule: AgentSchedule,
    pub engine: GeneticEvolutionEngine<StdRng>,
    started: bool,
}

impl EvolutionAgent {
    pub fn new(config: &AgentConfig, engine: GeneticEvolutionEngine<StdRng>) -> Self {
        Self {
            name: config.name.clone(),
            seed_event: config.seed_event.clone().unwrap_or_default(),
            schedule: AgentSchedule::from_config(config),
            engine,
            started: false,
        }
    }
}

#[derive(Resource, Debug)]
pub struct ImpactWatchAgent {
    pub name: String,
    pub schedule: AgentSchedule,
    pub pending: VecDeque<String>,
    started: bool,
}

impl ImpactWatchAgent {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            name: config.name.clone(),
            schedule: AgentSchedule::from_config(config),
            pending: VecDeque::new(),
            started: false,
        }
    }
}

pub fn agent_intake_system(mut inbox: ResMut<AgentInbox>, mut watcher: ResMut<ImpactWatchAgent>) {
    watcher.pending.extend(inbox.0.drain(..));
}

pub fn evolution_agent_system(
    clock: Res<AgentClock>,
    mut agent: ResMut<EvolutionAgent>,
    mut bus: ResMut<EventBus>,
) {
    run_evolution_agent(clock.tick, &mut agent, &mut bus);
}

/// Seed on the first wake, then one generation per wake.
pub fn run_evolution_agent(tick: u64, agent: &mut EvolutionAgent, bus: &mut EventBus) {
    if !agent.schedule.is_due(tick) {
        return;
    }
    announce(&mut agent.started, &agent.name, "evolution", tick, bus);

    if agent.engine.state() == EvolutionState::Uninitialized {
        if agent.seed_event.trim().is_empty() {
            fail(&mut agent.schedule, &agent.name, "no seed event configured", tick, bus);
            return;
        }
        let seeded = agent.engine.initialize_population(&agent.seed_event).len();
        if seeded == 0 {
            fail(&mut agent.schedule, &agent.name, "population_size is zero", tick, bus);
            return;
        }
    }

    agent.engine.run_generation();
    let status = agent.engine.evolution_status();
    debug!(agent = %agent.name, generation = status.generation, "evolution agent stepped");
    bus.publish(
        tick,
        BusMessage::EvolutionUpdate {
            agent: agent.name.clone(),
            generation: status.generation,
            best_scenario: status.best_scenario,
            fitness: status.fitness,
        },
    );
    agent.schedule.record_success(tick);
}

pub fn impact_watch_agent_system(
    clock: Res<AgentClock>,
    core: Res<ReasoningCore>,
    mut agent: ResMut<ImpactWatchAgent>,
    mut bus: ResMut<EventBus>,
) {
    run_impact_watch(clock.tick, &core, &mut agent, &mut bus);
}

/// Analyze one queued seed per wake.
pub fn run_impact_watch(
    tick: u64,
    core: &ReasoningCore,
    agent: &mut ImpactWatchAgent,
    bus: &mut EventBus,
) {
    if !agent.schedule.is_due(tick) {
        return;
    }
    announce(&mut agent.started, &agent.name, "impact_watch", tick, bus);

    let Some(seed_id) = agent.pending.pop_front() else {
        agent.schedule.record_success(tick);
        return;
    };
    match core.analyze_entity(&seed_id) {
        Some(records) => {
            bus.publish(
                tick,
                BusMessage::ImpactAnalysis {
                    agent: agent.name.clone(),
                    seed_id,
                    record_count: records.len(),
                    top_impact: records.into_iter().next(),
                },
            );
            agent.schedule.record_success(tick);
        }
        None => {
            let message = format!("unknown seed entity {}", seed_id);
            fail(&mut agent.schedule, &agent.name, &message, tick, bus);
        }
    }
}

pub fn advance_clock_system(mut clock: ResMut<AgentClock>) {
    clock.tick += 1;
}

fn announce(started: &mut bool, name: &str, role: &str, tick: u64, bus: &mut EventBus) {
    if *started {
        return;
    }
    *started = true;
    bus.publish(
        tick,
        BusMessage::AgentStarted {
            agent: name.to_string(),
            role: role.to_string(),
        },
    );
}

fn fail(schedule: &mut AgentSchedule, name: &str, message: &str, tick: u64, bus: &mut EventBus) {
    warn!(agent = %name, failures = schedule.failures + 1, "{}", message);
    bus.publish(
        tick,
        BusMessage::AgentError {
            agent: name.to_string(),
            message: message.to_string(),
        },
    );
    schedule.record_failure(tick);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EngineConfig;
    use crate::graph::model::KnowledgeGraph;
    use crate::rules::registry::RuleRegistry;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn core() -> ReasoningCore {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/data/knowledge_graph.json");
        let graph = crate::graph::loader::load_knowledge_graph(path).unwrap();
        ReasoningCore::new(
            Arc::new(graph),
            Arc::new(RuleRegistry::with_builtin()),
            &EngineConfig::default(),
        )
    }

    fn agent_config(seed: Option<&str>) -> AgentConfig {
        AgentConfig {
            name: "test-agent".to_string(),
            seed_event: seed.map(str::to_string),
            interval_ticks: 2,
            backoff_ticks: 5,
        }
    }

    #[test]
    fn schedule_waits_interval_then_backoff() {
        let mut schedule = AgentSchedule::new(2, 5);
        assert!(schedule.is_due(0));
        schedule.record_success(0);
        assert!(!schedule.is_due(1));
        assert!(schedule.is_due(2));
        schedule.record_failure(2);
        assert_eq!(schedule.failures, 1);
        assert!(!schedule.is_due(6));
        assert!(schedule.is_due(7));
    }

    #[test]
    fn evolution_agent_seeds_then_steps() {
        let core = core();
        let engine = core.evolution_engine(StdRng::seed_from_u64(9));
        let mut agent = EvolutionAgent::new(&agent_config(Some("New Trade Tariffs Announced")), engine);
        let mut bus = EventBus::default();

        run_evolution_agent(0, &mut agent, &mut bus);
        run_evolution_agent(1, &mut agent, &mut bus);
        run_evolution_agent(2, &mut agent, &mut bus);

        assert_eq!(bus.count("agent_started"), 1);
        assert_eq!(bus.count("evolution_update"), 2);
        assert_eq!(agent.engine.generation(), 2);
        let last = bus.drain().pop().unwrap();
        match last.message {
            BusMessage::EvolutionUpdate { generation, fitness, .. } => {
                assert_eq!(generation, 2);
                assert!(fitness.unwrap() >= 0.0);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn evolution_agent_without_seed_backs_off() {
        let core = core();
        let engine = core.evolution_engine(StdRng::seed_from_u64(9));
        let mut agent = EvolutionAgent::new(&agent_config(None), engine);
        let mut bus = EventBus::default();
        run_evolution_agent(0, &mut agent, &mut bus);
        assert_eq!(bus.count("agent_error"), 1);
        assert_eq!(agent.schedule.next_wake, 5);
    }

    #[test]
    fn impact_watcher_reports_and_backs_off_on_unknown_ids() {
        let core = core();
        let mut agent = ImpactWatchAgent::new(&AgentConfig {
            interval_ticks: 1,
            backoff_ticks: 3,
            ..agent_config(None)
        });
        agent.pending.push_back("news_alpha_upbeat".to_string());
        agent.pending.push_back("news_missing".to_string());
        let mut bus = EventBus::default();

        run_impact_watch(0, &core, &mut agent, &mut bus);
        run_impact_watch(1, &core, &mut agent, &mut bus);
        assert_eq!(bus.count("impact_analysis"), 1);
        assert_eq!(bus.count("agent_error"), 1);
        assert_eq!(agent.schedule.next_wake, 4);
    }

    #[test]
    fn empty_graph_still_runs_evolution() {
        let core = ReasoningCore::new(
            Arc::new(KnowledgeGraph::default()),
            Arc::new(RuleRegistry::with_builtin()),
            &EngineConfig::default(),
        );
        let engine = core.evolution_engine(StdRng::seed_from_u64(2));
        let mut agent = EvolutionAgent::new(&agent_config(Some("Unseen shock")), engine);
        let mut bus = EventBus::default();
        run_evolution_agent(0, &mut agent, &mut bus);
        assert_eq!(bus.count("evolution_update"), 1);
    }
}
