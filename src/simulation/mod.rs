pub mod clock;
pub mod event;
pub mod evolution;
pub mod fitness;
pub mod impact;
pub mod scenario;
pub mod targets;

pub use clock::{Clock, FixedClock, SystemClock};
pub use event::{ConceptualEvent, TraceEvent};
pub use evolution::{
    EvolutionConfig, EvolutionState, EvolutionStatus, FutureScenario, GeneticEvolutionEngine,
    DRIVER_POOL, MUTATION_MARKER,
};
pub use fitness::FitnessWeights;
pub use impact::{ImpactAnalyzer, ImpactRecord};
pub use scenario::{
    EventSpec, ScenarioDefinition, ScenarioModeler, ScenarioOutcome, DEFAULT_KEY_CHAIN_LIMIT,
};
pub use targets::{referenced_ids, resolve_targets};
