pub mod bus;
pub mod config;
pub mod ecs;
pub mod service;
pub mod world;

pub use bus::{BusMessage, Envelope, EventBus};
pub use config::{load_engine_config, AgentConfig, AgentsConfig, ConfigError, EngineConfig};
pub use service::ReasoningCore;
pub use world::AgentRuntime;
