use std::sync::Arc;

use bevy_utils::tracing::{debug, info};
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::graph::entity::{Entity, EntityCore, EntityKind};
use crate::graph::model::KnowledgeGraph;
use crate::simulation::clock::{Clock, SystemClock};
use crate::simulation::fitness::FitnessWeights;
use crate::simulation::impact::{ImpactAnalyzer, ImpactRecord};

pub const DRIVER_POOL: [&str; 4] = ["Inflation", "Geopolitics", "Tech Disruption", "Regulation"];
pub const MUTATION_MARKER: &str = "[MUTATED]";
const DRIVER_ANNOTATION: &str = " | driven by ";
const MAX_CHILD_DRIVERS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FutureScenario {
    pub scenario_id: String,
    pub base_date: NaiveDate,
    pub target_date: NaiveDate,
    pub trigger_event: String,
    pub projected_state: String,
    pub likelihood: f64,
    pub key_drivers: Vec<String>,
    pub fitness_score: f64,
}

impl FutureScenario {
    pub fn horizon_days(&self) -> i64 {
        (self.target_date - self.base_date).num_days()
    }

    pub fn is_mutated(&self) -> bool {
        self.projected_state.contains(MUTATION_MARKER)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population_size: usize,
    pub mutation_rate: f64,
    pub elite_fraction: f64,
    /// Chance a seeded candidate is built from a traced impact rather than a template.
    pub analysis_weight: f64,
    pub min_horizon_days: i64,
    pub max_horizon_days: i64,
    pub trace_depth: usize,
    pub ruleset_id: Option<String>,
    pub fitness: FitnessWeights,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 10,
            mutation_rate: 0.2,
            elite_fraction: 0.2,
            analysis_weight: 0.7,
            min_horizon_days: 30,
            max_horizon_days: 180,
            trace_depth: 2,
            ruleset_id: None,
            fitness: FitnessWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvolutionState {
    Uninitialized,
    Seeded,
    Evolving,
}

/// Read-only snapshot of an engine's current best individual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionStatus {
    pub generation: u64,
    pub state: EvolutionState,
    pub best_scenario: Option<FutureScenario>,
    pub fitness: Option<f64>,
}

/// Elitist genetic search over future scenarios.
///
/// One instance owns its population exclusively; share it only behind
/// external locking. All randomness comes from the injected `R`.
#[derive(Debug)]
pub struct GeneticEvolutionEngine<R = StdRng> {
    analyzer: ImpactAnalyzer,
    graph: Arc<KnowledgeGraph>,
    config: EvolutionConfig,
    clock: Arc<dyn Clock>,
    rng: R,
    population: Vec<FutureScenario>,
    parent_pool: Vec<FutureScenario>,
    generation: u64,
    state: EvolutionState,
    serial: u64,
}

impl<R: Rng> GeneticEvolutionEngine<R> {
    pub fn new(
        analyzer: ImpactAnalyzer,
        graph: Arc<KnowledgeGraph>,
        config: EvolutionConfig,
        rng: R,
    ) -> Self {
        Self {
            analyzer,
            graph,
            config,
            clock: Arc::new(SystemClock),
            rng,
            population: Vec::new(),
            parent_pool: Vec::new(),
            generation: 0,
            state: EvolutionState::Uninitialized,
            serial: 0,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn population(&self) -> &[FutureScenario] {
        &self.population
    }

    /// Elites selected by the most recent generation step.
    pub fn parent_pool(&self) -> &[FutureScenario] {
        &self.parent_pool
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> EvolutionState {
        self.state
    }

    pub fn evolution_status(&self) -> EvolutionStatus {
        let best = self.population.first().cloned();
        EvolutionStatus {
            generation: self.generation,
            state: self.state,
            fitness: best.as_ref().map(|scenario| scenario.fitness_score),
            best_scenario: best,
        }
    }

    /// Seed from an event name: a graph entity with that id or name, else a
    /// synthetic news item carrying the name.
    pub fn initialize_population(&mut self, seed_event_name: &str) -> &[FutureScenario] {
        let seed = self
            .graph
            .entities()
            .iter()
            .find(|entity| entity.id() == seed_event_name || entity.name() == seed_event_name)
            .cloned()
            .unwrap_or_else(|| synthetic_seed(seed_event_name));
        self.initialize_population_from(&seed)
    }

    pub fn initialize_population_from(&mut self, seed: &Entity) -> &[FutureScenario] {
        let records = self.analyzer.trace_impacts(
            seed,
            &self.graph,
            self.config.trace_depth,
            self.config.ruleset_id.as_deref(),
        );
        let base_date = self.clock.today();

        self.population.clear();
        self.parent_pool.clear();
        self.generation = 0;
        for _ in 0..self.config.population_size {
            let candidate = self.seed_candidate(seed.name(), base_date, &records);
            self.population.push(candidate);
        }
        sort_by_fitness(&mut self.population);
        self.state = EvolutionState::Seeded;

        info!(
            seed = seed.id(),
            impacts = records.len(),
            population = self.population.len(),
            "evolution population seeded"
        );
        &self.population
    }

    /// One generation: rescore, keep the elites, refill with mutated
    /// offspring. An empty population stays empty.
    pub fn run_generation(&mut self) -> &[FutureScenario] {
        if self.population.is_empty() {
            debug!("run_generation on an empty population; nothing to do");
            return &self.population;
        }
        for scenario in &mut self.population {
            scenario.fitness_score = self.config.fitness.score(scenario);
        }
        sort_by_fitness(&mut self.population);

        let size = self.config.population_size;
        let elite_count = ((size as f64 * self.config.elite_fraction).floor() as usize)
            .max(1)
            .min(self.population.len());
        let parents: Vec<FutureScenario> = self.population[..elite_count].to_vec();
        let mutation_rate = chance(self.config.mutation_rate);

        self.generation += 1;
        let mut next = parents.clone();
        while next.len() < size {
            let first = &parents[self.rng.gen_range(0..parents.len())];
            let second = &parents[self.rng.gen_range(0..parents.len())];
            let id = self.next_id();
            let mut child = crossover(first, second, id);
            if self.rng.gen_bool(mutation_rate) {
                mutate(&mut child, &mut self.rng);
            }
            child.fitness_score = self.config.fitness.score(&child);
            next.push(child);
        }
        sort_by_fitness(&mut next);

        self.population = next;
        self.parent_pool = parents;
        self.state = EvolutionState::Evolving;

        debug!(
            generation = self.generation,
            best = self.population.first().map(|s| s.fitness_score).unwrap_or(0.0),
            "generation complete"
        );
        &self.population
    }

    fn next_id(&mut self) -> String {
        self.serial += 1;
        format!("fs_g{}_{:04}", self.generation, self.serial)
    }

    fn seed_candidate(
        &mut self,
        trigger: &str,
        base_date: NaiveDate,
        records: &[ImpactRecord],
    ) -> FutureScenario {
        let (low, high) = if self.config.min_horizon_days <= self.config.max_horizon_days {
            (self.config.min_horizon_days, self.config.max_horizon_days)
        } else {
            (self.config.max_horizon_days, self.config.min_horizon_days)
        };
        let horizon = self.rng.gen_range(low..=high);
        let from_analysis = !records.is_empty()
            && self
                .rng
                .gen_bool(chance(self.config.analysis_weight));

        let (projected_state, likelihood, key_drivers) = if from_analysis {
            let record = &records[self.rng.gen_range(0..records.len())];
            let jitter: f64 = self.rng.gen_range(-0.1..=0.1);
            (
                format!(
                    "{} on {} with {} magnitude",
                    record.impact_type, record.target_entity_id, record.magnitude
                ),
                (record.probability + jitter).clamp(0.0, 1.0),
                vec![record.impact_type.clone(), record.target_entity_id.clone()],
            )
        } else {
            let likelihood: f64 = self.rng.gen();
            let driver = DRIVER_POOL[self.rng.gen_range(0..DRIVER_POOL.len())];
            (
                templated_state(likelihood, trigger),
                likelihood,
                vec![driver.to_string()],
            )
        };

        let mut scenario = FutureScenario {
            scenario_id: self.next_id(),
            base_date,
            target_date: base_date + Duration::days(horizon),
            trigger_event: trigger.to_string(),
            projected_state,
            likelihood,
            key_drivers,
            fitness_score: 0.0,
        };
        scenario.fitness_score = self.config.fitness.score(&scenario);
        scenario
    }
}

fn synthetic_seed(name: &str) -> Entity {
    let slug: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    Entity::from_parts(
        EntityKind::NewsItem,
        EntityCore::new(format!("seed_{}", slug), name).with_attribute("headline", name),
    )
}

fn templated_state(likelihood: f64, trigger: &str) -> String {
    if likelihood >= 0.66 {
        format!("High volatility surge following {}", trigger)
    } else if likelihood >= 0.33 {
        format!("Moderate repricing following {}", trigger)
    } else {
        format!("Market absorbs {} with limited impact", trigger)
    }
}

/// Projected-state text without crossover annotation or mutation marker.
fn state_template(state: &str) -> &str {
    let base = state.split(DRIVER_ANNOTATION).next().unwrap_or(state);
    base.trim_end()
        .strip_suffix(MUTATION_MARKER)
        .unwrap_or(base)
        .trim_end()
}

fn crossover(first: &FutureScenario, second: &FutureScenario, scenario_id: String) -> FutureScenario {
    let driver = first
        .key_drivers
        .first()
        .map(String::as_str)
        .unwrap_or("Unknown Driver");
    let mut key_drivers: Vec<String> = Vec::with_capacity(MAX_CHILD_DRIVERS);
    for candidate in first.key_drivers.iter().chain(&second.key_drivers) {
        if key_drivers.len() == MAX_CHILD_DRIVERS {
            break;
        }
        if !key_drivers.contains(candidate) {
            key_drivers.push(candidate.clone());
        }
    }
    FutureScenario {
        scenario_id,
        base_date: first.base_date,
        target_date: first.target_date,
        trigger_event: first.trigger_event.clone(),
        projected_state: format!(
            "{}{}{}",
            state_template(&second.projected_state),
            DRIVER_ANNOTATION,
            driver
        ),
        likelihood: (first.likelihood + second.likelihood) / 2.0,
        key_drivers,
        fitness_score: 0.0,
    }
}

fn mutate<R: Rng>(scenario: &mut FutureScenario, rng: &mut R) {
    scenario.likelihood = rng.gen();
    let driver = DRIVER_POOL[rng.gen_range(0..DRIVER_POOL.len())];
    if !scenario.key_drivers.iter().any(|known| known == driver) {
        scenario.key_drivers.push(driver.to_string());
    }
    if !scenario.is_mutated() {
        scenario.projected_state.push(' ');
        scenario.projected_state.push_str(MUTATION_MARKER);
    }
}

/// Probability usable with `gen_bool`; non-finite rates count as never.
fn chance(rate: f64) -> f64 {
    if rate.is_finite() {
        rate.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn sort_by_fitness(population: &mut [FutureScenario]) {
    population.sort_by(|a, b| b.fitness_score.total_cmp(&a.fitness_score));
}
