use std::sync::Arc;

use bevy_ecs::prelude::*;
use bevy_ecs::schedule::SystemSet;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::core::bus::EventBus;
use crate::core::config::EngineConfig;
use crate::core::service::ReasoningCore;
use crate::simulation::clock::Clock;
use crate::systems::agents::{
    advance_clock_system, agent_intake_system, evolution_agent_system, impact_watch_agent_system,
    AgentClock, AgentInbox, EvolutionAgent, ImpactWatchAgent,
};

/// Canonical tick ordering for the agent loops.
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum TickSet {
    Intake,
    Agents,
    Time,
}

/// Build the ECS world with the core, the bus and one of each agent.
pub fn create_world(
    core: ReasoningCore,
    config: &EngineConfig,
    seed: u64,
    clock: Arc<dyn Clock>,
) -> World {
    let engine = core
        .evolution_engine(StdRng::seed_from_u64(seed))
        .with_clock(clock);

    let mut world = World::new();
    world.insert_resource(AgentClock::default());
    world.insert_resource(AgentInbox::default());
    world.insert_resource(EventBus::default());
    world.insert_resource(EvolutionAgent::new(&config.agents.evolution, engine));
    world.insert_resource(ImpactWatchAgent::new(&config.agents.impact_watch));
    world.insert_resource(core);
    world
}

/// Build the system schedule in the canonical order.
pub fn create_schedule() -> Schedule {
    let mut schedule = Schedule::default();

    schedule.configure_sets((TickSet::Intake, TickSet::Agents, TickSet::Time).chain());

    schedule.add_systems((
        agent_intake_system.in_set(TickSet::Intake),
        (evolution_agent_system, impact_watch_agent_system)
            .chain()
            .in_set(TickSet::Agents),
        advance_clock_system.in_set(TickSet::Time),
    ));

    schedule
}
