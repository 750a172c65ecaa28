use std::sync::Arc;

use chrono::NaiveDate;
use market_narrative_engine::core::config::EngineConfig;
use market_narrative_engine::graph::{
    load_knowledge_graph, Entity, EntityCore, KnowledgeGraph, NewsItem, PoliticalEvent,
    RegulatoryChange,
};
use market_narrative_engine::rules::RuleRegistry;
use market_narrative_engine::simulation::{
    EventSpec, EvolutionConfig, FitnessWeights, FixedClock, FutureScenario,
    GeneticEvolutionEngine, ImpactAnalyzer, ScenarioDefinition, ScenarioModeler,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;

const GRAPH_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/data/knowledge_graph.json");
const MACRO_RULES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/rules/macro_shocks.json");
const MENTIONABLE: [&str; 6] = ["comp_alpha", "comp_beta", "comp_gamma", "ind_auto", "ind_tech", "comp_omega"];

fn sample_graph() -> KnowledgeGraph {
    load_knowledge_graph(GRAPH_PATH).expect("bundled graph loads")
}

fn analyzer() -> ImpactAnalyzer {
    ImpactAnalyzer::new(Arc::new(RuleRegistry::from_paths(&[MACRO_RULES_PATH])))
}

fn seed_event() -> impl Strategy<Value = Entity> {
    let mentions = proptest::sample::subsequence(MENTIONABLE.to_vec(), 0..=3);
    prop_oneof![
        (-1.0_f64..=1.0, mentions.clone()).prop_map(|(sentiment, mentions)| {
            Entity::NewsItem(NewsItem {
                core: EntityCore::new("news_prop", "Generated coverage"),
                sentiment_score: Some(sentiment),
                source_name: None,
                key_entities_mentioned_ids: mentions.into_iter().map(str::to_string).collect(),
            })
        }),
        (
            prop::sample::select(vec!["TradeRestrictionInitiated", "Election", "tradeRESTRICTION"]),
            mentions.clone()
        )
            .prop_map(|(subtype, sectors)| {
                Entity::PoliticalEvent(PoliticalEvent {
                    core: EntityCore::new("pol_prop", "Generated policy")
                        .with_attribute("affected_sectors", json!(sectors)),
                    event_subtype: Some(subtype.to_string()),
                    ..Default::default()
                })
            }),
        (prop::sample::select(vec!["Enacted", "Proposed"]), mentions).prop_map(
            |(status, industries)| {
                Entity::RegulatoryChange(RegulatoryChange {
                    core: EntityCore::new("reg_prop", "Generated regulation"),
                    status: Some(status.to_string()),
                    jurisdiction: None,
                    industries_affected_ids: industries.into_iter().map(str::to_string).collect(),
                })
            }
        ),
    ]
}

fn fixed_engine(config: EvolutionConfig, seed: u64) -> GeneticEvolutionEngine<StdRng> {
    let date = NaiveDate::from_ymd_opt(2025, 1, 2).expect("valid date");
    GeneticEvolutionEngine::new(
        analyzer(),
        Arc::new(sample_graph()),
        config,
        StdRng::seed_from_u64(seed),
    )
    .with_clock(Arc::new(FixedClock(date)))
}

#[test]
fn sample_graph_seeds_trace_as_documented() {
    let graph = sample_graph();
    let tariffs = graph.entity("pol_tariffs").expect("tariff event present");
    let records = analyzer().trace_impacts(tariffs, &graph, 2, None);

    let first_order: Vec<&str> = records
        .iter()
        .filter(|record| record.order_in_chain == 1)
        .map(|record| record.target_entity_id.as_str())
        .collect();
    assert_eq!(first_order, vec!["ind_auto", "ind_tech"]);
    assert!(records
        .iter()
        .any(|record| record.order_in_chain == 2 && record.target_entity_id == "comp_beta"));
}

#[test]
fn macro_ruleset_chains_into_securities() {
    let graph = sample_graph();
    let rate = graph.entity("mi_policy_rate").expect("rate decision present");
    let records = analyzer().trace_impacts(rate, &graph, 2, Some("rs_macro_shocks_v1"));

    let leveraged: Vec<&str> = records
        .iter()
        .filter(|record| record.impact_type == "HigherFinancingCost")
        .map(|record| record.target_entity_id.as_str())
        .collect();
    assert_eq!(leveraged, vec!["comp_beta", "comp_delta"]);

    let securities: Vec<&str> = records
        .iter()
        .filter(|record| record.impact_type == "EquityValuationPressure")
        .map(|record| record.target_entity_id.as_str())
        .collect();
    assert_eq!(securities, vec!["sec_beta", "sec_dlta"]);
}

#[test]
fn scenario_defaults_come_from_config() {
    let config = EngineConfig::default();
    let modeler = ScenarioModeler::new(analyzer()).with_key_chain_limit(config.key_chain_limit);
    let scenario = ScenarioDefinition {
        name: "Broad tariffs".to_string(),
        description: String::new(),
        events_to_introduce: vec![EventSpec::new("PoliticalEvent", "pol_broad", "Broad tariffs")
            .with_attribute("event_subtype", "TradeRestrictionInitiated")
            .with_attribute("affected_sectors", vec!["ind_auto", "ind_tech", "ind_retail"])],
    };
    let outcome = modeler.run_what_if(&sample_graph(), &scenario, 2);
    assert!(outcome.key_impact_chains.len() <= 5);
    assert!(outcome.full_impact_chain_count >= outcome.key_impact_chains.len());
}

proptest! {
    #[test]
    fn orders_stay_within_depth(seed in seed_event(), depth in 0_usize..5) {
        let graph = sample_graph();
        let records = analyzer().trace_impacts(&seed, &graph, depth, None);
        if depth == 0 {
            prop_assert!(records.is_empty());
        }
        for record in &records {
            prop_assert!(record.order_in_chain >= 1);
            prop_assert!(record.order_in_chain <= depth);
            prop_assert_eq!(record.full_path_ids.len(), record.order_in_chain + 1);
            prop_assert_eq!(record.full_path_ids.first().map(String::as_str), Some(seed.id()));
        }
    }

    #[test]
    fn tracing_is_pure(seed in seed_event(), depth in 1_usize..4) {
        let graph = sample_graph();
        let analyzer = analyzer();
        let first = analyzer.trace_impacts(&seed, &graph, depth, None);
        let second = analyzer.trace_impacts(&seed, &graph, depth, None);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn what_if_never_touches_base_graph(
        sentiment in -1.0_f64..=1.0,
        change in any::<bool>(),
        depth in 1_usize..4,
    ) {
        let base = sample_graph();
        let before = base.clone();
        let mut event = EventSpec::new("NewsItem", "news_hypo", "Hypothetical coverage")
            .with_attribute("sentiment_score", sentiment)
            .with_attribute("key_entities_mentioned_ids", vec!["comp_gamma"]);
        if change {
            event = event.changing("comp_gamma");
        }
        let scenario = ScenarioDefinition {
            name: "Hypothetical".to_string(),
            description: String::new(),
            events_to_introduce: vec![event],
        };
        let outcome = ScenarioModeler::new(analyzer()).run_what_if(&base, &scenario, depth);
        prop_assert_eq!(&base, &before);
        prop_assert!(outcome.key_impact_chains.len() <= 5);
    }

    #[test]
    fn population_size_is_invariant(size in 1_usize..16, seed in any::<u64>(), generations in 1_usize..6) {
        let config = EvolutionConfig { population_size: size, ..Default::default() };
        let mut engine = fixed_engine(config, seed);
        prop_assert_eq!(engine.initialize_population("New Trade Tariffs Announced").len(), size);
        for _ in 0..generations {
            prop_assert_eq!(engine.run_generation().len(), size);
        }
    }

    #[test]
    fn best_fitness_never_regresses(seed in any::<u64>(), generations in 1_usize..8) {
        let mut engine = fixed_engine(EvolutionConfig::default(), seed);
        engine.initialize_population("pol_tariffs");
        for _ in 0..generations {
            let best_before = engine
                .population()
                .iter()
                .map(|scenario| scenario.fitness_score)
                .fold(0.0_f64, f64::max);
            engine.run_generation();
            let pool_best = engine
                .parent_pool()
                .iter()
                .map(|scenario| scenario.fitness_score)
                .fold(0.0_f64, f64::max);
            prop_assert!(pool_best >= best_before);
        }
    }

    #[test]
    fn fitness_is_never_negative(
        likelihood in 0.0_f64..=1.0,
        horizon in 0_i64..1000,
        state in "[A-Za-z ]{0,40}",
    ) {
        let base = NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date");
        let scenario = FutureScenario {
            scenario_id: "prop".to_string(),
            base_date: base,
            target_date: base + chrono::Duration::days(horizon),
            trigger_event: "prop".to_string(),
            projected_state: state,
            likelihood,
            key_drivers: Vec::new(),
            fitness_score: 0.0,
        };
        prop_assert!(FitnessWeights::default().score(&scenario) >= 0.0);
    }
}
