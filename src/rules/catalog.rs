use std::fs;
use std::path::Path;

use bevy_utils::tracing::{debug, warn};
use bevy_utils::HashSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::entity::EntityKind;
use crate::rules::condition::{all_hold, Condition, FieldSource};

#[derive(Debug, thiserror::Error)]
pub enum RuleDataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    /// Entity variant tag, or an impact type when chaining off a conceptual event.
    pub event_type: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactDefinition {
    /// Hop at which the author expects this impact to appear. Informational.
    #[serde(default = "default_order")]
    pub order: u32,
    pub target_entity_type: EntityKind,
    #[serde(default)]
    pub target_selector_conditions: Vec<Condition>,
    pub impact_type: String,
    pub probability: f64,
    #[serde(default = "default_magnitude")]
    pub magnitude_qualitative: String,
    #[serde(default)]
    pub timescale: Option<String>,
    #[serde(default)]
    pub explanation_template: Option<String>,
}

fn default_order() -> u32 {
    1
}

fn default_magnitude() -> String {
    "Unspecified".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: String,
    #[serde(default)]
    pub description: String,
    pub trigger: Trigger,
    pub impacts: Vec<ImpactDefinition>,
}

impl Rule {
    pub fn validate(&self) -> Result<(), RuleDataError> {
        if self.rule_id.trim().is_empty() {
            return Err(RuleDataError::Validation(
                "rule id cannot be empty".to_string(),
            ));
        }
        if self.trigger.event_type.trim().is_empty() {
            return Err(RuleDataError::Validation(format!(
                "rule {} missing trigger event_type",
                self.rule_id
            )));
        }
        if self.impacts.is_empty() {
            return Err(RuleDataError::Validation(format!(
                "rule {} has no impacts",
                self.rule_id
            )));
        }
        for impact in &self.impacts {
            if impact.impact_type.trim().is_empty() {
                return Err(RuleDataError::Validation(format!(
                    "rule {} has an impact without impact_type",
                    self.rule_id
                )));
            }
            if !(0.0..=1.0).contains(&impact.probability) {
                return Err(RuleDataError::Validation(format!(
                    "rule {} impact {} probability {} outside [0, 1]",
                    self.rule_id, impact.impact_type, impact.probability
                )));
            }
            if impact.order == 0 {
                return Err(RuleDataError::Validation(format!(
                    "rule {} impact {} order must be at least 1",
                    self.rule_id, impact.impact_type
                )));
            }
        }
        Ok(())
    }

    /// Type tag equality plus every trigger condition holding on the event.
    pub fn matches<E>(&self, event_type: &str, event: &E) -> bool
    where
        E: FieldSource + ?Sized,
    {
        self.trigger.event_type == event_type && all_hold(&self.trigger.conditions, event, None)
    }
}

/// A validated, immutable set of rules.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleCatalog {
    pub ruleset_id: String,
    pub description: String,
    pub rules: Vec<Rule>,
}

/// Newest catalog layout this loader understands.
pub const RULE_SCHEMA_VERSION: u32 = 1;

fn current_schema_version() -> u32 {
    RULE_SCHEMA_VERSION
}

fn schema_supported(version: u32) -> bool {
    (1..=RULE_SCHEMA_VERSION).contains(&version)
}

#[derive(Debug, Deserialize)]
struct RuleCatalogFile {
    #[serde(default = "current_schema_version")]
    schema_version: u32,
    ruleset_id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    rules: Vec<Value>,
}

pub fn load_rule_catalog(path: impl AsRef<Path>) -> Result<RuleCatalog, RuleDataError> {
    let path = path.as_ref();
    let origin = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| RuleDataError::Io {
        path: origin.clone(),
        source,
    })?;
    parse_rule_catalog(&raw, &origin)
}

/// Parse a catalog document. The document itself must be well formed; a
/// rule inside it that fails to parse or validate is skipped with a warning.
pub fn parse_rule_catalog(raw: &str, origin: &str) -> Result<RuleCatalog, RuleDataError> {
    let file: RuleCatalogFile =
        serde_json::from_str(raw).map_err(|source| RuleDataError::Json {
            path: origin.to_string(),
            source,
        })?;
    if file.ruleset_id.trim().is_empty() {
        return Err(RuleDataError::Validation(format!(
            "{} has an empty ruleset_id",
            origin
        )));
    }

    if !schema_supported(file.schema_version) {
        warn!(
            ruleset = %file.ruleset_id,
            schema_version = file.schema_version,
            supported = RULE_SCHEMA_VERSION,
            "unsupported rule schema version; loading rules as version {}",
            RULE_SCHEMA_VERSION
        );
    }

    let mut ids = HashSet::default();
    let mut rules = Vec::with_capacity(file.rules.len());
    for (position, raw_rule) in file.rules.into_iter().enumerate() {
        let rule = match serde_json::from_value::<Rule>(raw_rule) {
            Ok(rule) => rule,
            Err(err) => {
                warn!(ruleset = %file.ruleset_id, position, error = %err, "skipping malformed rule");
                continue;
            }
        };
        if let Err(err) = rule.validate() {
            warn!(ruleset = %file.ruleset_id, error = %err, "skipping invalid rule");
            continue;
        }
        if !ids.insert(rule.rule_id.clone()) {
            warn!(ruleset = %file.ruleset_id, rule_id = %rule.rule_id, "skipping duplicate rule id");
            continue;
        }
        rules.push(rule);
    }

    debug!(ruleset = %file.ruleset_id, rules = rules.len(), "rule catalog parsed from {}", origin);
    Ok(RuleCatalog {
        ruleset_id: file.ruleset_id,
        description: file.description,
        rules,
    })
}

impl RuleCatalog {
    pub fn rule(&self, rule_id: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.rule_id == rule_id)
    }

    /// Rules triggered by `event`, in catalog order.
    pub fn matching<'a, E>(
        &'a self,
        event_type: &'a str,
        event: &'a E,
    ) -> impl Iterator<Item = &'a Rule> + 'a
    where
        E: FieldSource + ?Sized,
    {
        self.rules
            .iter()
            .filter(move |rule| rule.matches(event_type, event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::entity::{Entity, EntityCore, NewsItem};
    use serde_json::json;

    fn catalog_json() -> String {
        json!({
            "schema_version": 1,
            "ruleset_id": "rs_test",
            "rules": [
                {
                    "rule_id": "rule_good",
                    "trigger": {
                        "event_type": "NewsItem",
                        "conditions": [
                            { "field": "sentiment_score", "operator": "greater_than_or_equal_to", "value": 0.7 }
                        ]
                    },
                    "impacts": [
                        { "target_entity_type": "Company", "impact_type": "PositiveShortTermOutlook", "probability": 0.6 }
                    ]
                },
                { "rule_id": "rule_no_trigger", "impacts": [] },
                {
                    "rule_id": "rule_bad_probability",
                    "trigger": { "event_type": "NewsItem" },
                    "impacts": [
                        { "target_entity_type": "Company", "impact_type": "X", "probability": 1.5 }
                    ]
                },
                {
                    "rule_id": "rule_bad_target",
                    "trigger": { "event_type": "NewsItem" },
                    "impacts": [
                        { "target_entity_type": "Planet", "impact_type": "X", "probability": 0.5 }
                    ]
                },
                {
                    "rule_id": "rule_good",
                    "trigger": { "event_type": "NewsItem" },
                    "impacts": [
                        { "target_entity_type": "Company", "impact_type": "Y", "probability": 0.5 }
                    ]
                }
            ]
        })
        .to_string()
    }

    #[test]
    fn malformed_rules_are_skipped_not_fatal() {
        let catalog = parse_rule_catalog(&catalog_json(), "inline").unwrap();
        assert_eq!(catalog.ruleset_id, "rs_test");
        assert_eq!(catalog.rules.len(), 1);
        let rule = catalog.rule("rule_good").unwrap();
        assert_eq!(rule.impacts[0].order, 1);
        assert_eq!(rule.impacts[0].magnitude_qualitative, "Unspecified");
    }

    #[test]
    fn newer_schema_version_still_loads() {
        assert!(schema_supported(RULE_SCHEMA_VERSION));
        assert!(!schema_supported(0));
        assert!(!schema_supported(RULE_SCHEMA_VERSION + 1));

        let raw = catalog_json().replacen("\"schema_version\":1", "\"schema_version\":9", 1);
        assert!(raw.contains("\"schema_version\":9"));
        let catalog = parse_rule_catalog(&raw, "inline").unwrap();
        assert_eq!(catalog.rules.len(), 1);

        let unversioned = parse_rule_catalog(r#"{"ruleset_id": "rs_bare"}"#, "inline").unwrap();
        assert!(unversioned.rules.is_empty());
    }

    #[test]
    fn broken_document_is_an_error() {
        assert!(matches!(
            parse_rule_catalog("{ not json", "inline"),
            Err(RuleDataError::Json { .. })
        ));
        assert!(matches!(
            parse_rule_catalog(r#"{"ruleset_id": " ", "rules": []}"#, "inline"),
            Err(RuleDataError::Validation(_))
        ));
    }

    #[test]
    fn matching_filters_on_type_and_conditions() {
        let catalog = parse_rule_catalog(&catalog_json(), "inline").unwrap();
        let upbeat = Entity::NewsItem(NewsItem {
            core: EntityCore::new("n1", "Upbeat"),
            sentiment_score: Some(0.9),
            ..Default::default()
        });
        let flat = Entity::NewsItem(NewsItem {
            core: EntityCore::new("n2", "Flat"),
            sentiment_score: Some(0.1),
            ..Default::default()
        });
        assert_eq!(catalog.matching("NewsItem", &upbeat).count(), 1);
        assert_eq!(catalog.matching("NewsItem", &flat).count(), 0);
        assert_eq!(catalog.matching("Company", &upbeat).count(), 0);
    }
}
