use std::env;
use std::path::PathBuf;

use market_narrative_engine::core::bus::Envelope;
use market_narrative_engine::core::config::{EngineConfig, DEFAULT_CONFIG_PATH};
use market_narrative_engine::graph::EntityKind;
use market_narrative_engine::simulation::{EventSpec, ImpactRecord, ScenarioDefinition};
use market_narrative_engine::{AgentRuntime, ReasoningCore};

/// Entity kinds whose instances are demo trigger events.
const EVENT_KINDS: [EntityKind; 5] = [
    EntityKind::NewsItem,
    EntityKind::PoliticalEvent,
    EntityKind::RegulatoryChange,
    EntityKind::FinancialReportItem,
    EntityKind::MacroIndicator,
];

struct CliArgs {
    config_path: PathBuf,
    graph_path: Option<PathBuf>,
    rule_paths: Vec<PathBuf>,
    seed: u64,
    ticks: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = parse_args(env::args().collect());
    let mut config = EngineConfig::load_or_default(&args.config_path);
    if let Some(graph_path) = args.graph_path {
        config.graph_path = Some(graph_path);
    }
    config.rule_paths.extend(args.rule_paths);

    let core = match ReasoningCore::from_config(&config) {
        Ok(core) => core,
        Err(err) => {
            eprintln!("Failed to load knowledge graph: {}", err);
            std::process::exit(1);
        }
    };

    println!("== Impact traces ==");
    let seeds: Vec<String> = core
        .graph()
        .entities()
        .iter()
        .filter(|entity| EVENT_KINDS.contains(&entity.kind()))
        .map(|entity| entity.id().to_string())
        .collect();
    for seed_id in &seeds {
        let records = core.analyze_entity(seed_id).unwrap_or_default();
        println!("{} -> {} impact(s)", seed_id, records.len());
        for record in &records {
            print_record(record);
        }
    }

    println!();
    println!("== What-if ==");
    let outcome = core.run_what_if(&demo_scenario());
    println!("{}", outcome.narrative_summary);
    for record in &outcome.key_impact_chains {
        print_record(record);
    }
    if outcome.full_impact_chain_count > outcome.key_impact_chains.len() {
        println!(
            "  ... {} more",
            outcome.full_impact_chain_count - outcome.key_impact_chains.len()
        );
    }

    println!();
    println!("== Agents ({} ticks) ==", args.ticks);
    let mut runtime = AgentRuntime::new(core, &config, args.seed);
    runtime.submit_seeds(seeds);
    for _ in 0..args.ticks {
        for envelope in runtime.tick() {
            print_envelope(&envelope);
        }
    }
}

fn demo_scenario() -> ScenarioDefinition {
    ScenarioDefinition {
        name: "Semiconductor export controls".to_string(),
        description: "Export restrictions on advanced chips hit the technology supply chain."
            .to_string(),
        events_to_introduce: vec![
            EventSpec::new("PoliticalEvent", "pol_chip_controls", "Chip Export Controls")
                .with_attribute("event_subtype", "TradeRestrictionInitiated")
                .with_attribute("affected_sectors", vec!["ind_tech"]),
            EventSpec::new("NewsItem", "news_beta_recall", "Beta Motors Recall Widens")
                .with_attribute("sentiment_score", -0.7)
                .changing("comp_beta"),
        ],
    }
}

fn print_record(record: &ImpactRecord) {
    println!(
        "  [{}] {} -> {}: {} (p={:.2}, {}) via {}",
        record.order_in_chain,
        record.source_event_id,
        record.target_entity_id,
        record.impact_type,
        record.probability,
        record.magnitude,
        record.justification_rule_id
    );
    if let Some(explanation) = &record.explanation {
        println!("      {}", explanation);
    }
}

fn print_envelope(envelope: &Envelope) {
    match serde_json::to_string(envelope) {
        Ok(line) => println!("{}", line),
        Err(err) => eprintln!("Failed to encode bus message: {}", err),
    }
}

fn parse_args(args: Vec<String>) -> CliArgs {
    let mut iter = args.iter();
    let mut parsed = CliArgs {
        config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        graph_path: None,
        rule_paths: Vec::new(),
        seed: 42,
        ticks: 6,
    };
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                if let Some(value) = iter.next() {
                    parsed.config_path = PathBuf::from(value);
                }
            }
            "--graph" => {
                if let Some(value) = iter.next() {
                    parsed.graph_path = Some(PathBuf::from(value));
                }
            }
            "--rules" => {
                if let Some(value) = iter.next() {
                    parsed.rule_paths.push(PathBuf::from(value));
                }
            }
            "--seed" => {
                if let Some(value) = iter.next().and_then(|value| value.parse().ok()) {
                    parsed.seed = value;
                }
            }
            "--ticks" => {
                if let Some(value) = iter.next().and_then(|value| value.parse().ok()) {
                    parsed.ticks = value;
                }
            }
            _ => {}
        }
    }
    parsed
}
