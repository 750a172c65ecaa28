// Re-export core modules for use by the binary or other consumers
pub mod core;
pub mod graph;
pub mod rules;
pub mod simulation;
pub mod systems;

// Expose the service facade and the agent runtime wrapper
pub use crate::core::config::EngineConfig;
pub use crate::core::service::ReasoningCore;
pub use crate::core::world::AgentRuntime;
