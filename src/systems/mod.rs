pub mod agents;

pub use agents::{
    AgentClock, AgentInbox, AgentSchedule, EvolutionAgent, ImpactWatchAgent,
};
