use std::sync::Arc;

use bevy_ecs::prelude::*;

use crate::core::bus::{Envelope, EventBus};
use crate::core::config::EngineConfig;
use crate::core::ecs::{create_schedule, create_world};
use crate::core::service::ReasoningCore;
use crate::simulation::clock::{Clock, SystemClock};
use crate::simulation::evolution::EvolutionStatus;
use crate::systems::agents::{AgentClock, AgentInbox, EvolutionAgent};

/// Wrapper around the ECS world and schedule hosting the agent loops.
pub struct AgentRuntime {
    world: World,
    schedule: Schedule,
}

impl AgentRuntime {
    pub fn new(core: ReasoningCore, config: &EngineConfig, seed: u64) -> Self {
        Self::with_clock(core, config, seed, Arc::new(SystemClock))
    }

    pub fn with_clock(
        core: ReasoningCore,
        config: &EngineConfig,
        seed: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            world: create_world(core, config, seed, clock),
            schedule: create_schedule(),
        }
    }

    /// Queue seed entity ids for the impact watcher.
    pub fn submit_seeds<I, S>(&mut self, seeds: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inbox = self.world.resource_mut::<AgentInbox>();
        inbox.0.extend(seeds.into_iter().map(Into::into));
    }

    /// Run one tick and return everything published during it.
    pub fn tick(&mut self) -> Vec<Envelope> {
        self.schedule.run(&mut self.world);
        self.world.resource_mut::<EventBus>().drain()
    }

    pub fn current_tick(&self) -> u64 {
        self.world.resource::<AgentClock>().tick
    }

    pub fn evolution_status(&self) -> EvolutionStatus {
        self.world.resource::<EvolutionAgent>().engine.evolution_status()
    }
}
