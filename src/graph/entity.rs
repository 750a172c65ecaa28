use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Open-ended attribute bag carried by every entity.
pub type Attributes = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Company,
    Industry,
    MacroIndicator,
    NewsItem,
    PoliticalEvent,
    FinancialReportItem,
    MarketSignal,
    RegulatoryChange,
    Security,
}

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Company,
        EntityKind::Industry,
        EntityKind::MacroIndicator,
        EntityKind::NewsItem,
        EntityKind::PoliticalEvent,
        EntityKind::FinancialReportItem,
        EntityKind::MarketSignal,
        EntityKind::RegulatoryChange,
        EntityKind::Security,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Company => "Company",
            EntityKind::Industry => "Industry",
            EntityKind::MacroIndicator => "MacroIndicator",
            EntityKind::NewsItem => "NewsItem",
            EntityKind::PoliticalEvent => "PoliticalEvent",
            EntityKind::FinancialReportItem => "FinancialReportItem",
            EntityKind::MarketSignal => "MarketSignal",
            EntityKind::RegulatoryChange => "RegulatoryChange",
            EntityKind::Security => "Security",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown entity type: {value}")]
pub struct ParseKindError {
    pub value: String,
}

impl FromStr for EntityKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseKindError {
                value: s.to_string(),
            })
    }
}

/// Fields shared by every entity variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityCore {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl EntityCore {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Company {
    #[serde(flatten)]
    pub core: EntityCore,
    #[serde(default)]
    pub ticker_symbol: Option<String>,
    #[serde(default)]
    pub industry_id: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Industry {
    #[serde(flatten)]
    pub core: EntityCore,
    #[serde(default)]
    pub sector: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroIndicator {
    #[serde(flatten)]
    pub core: EntityCore,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub indicator_code: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub change: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    #[serde(flatten)]
    pub core: EntityCore,
    #[serde(default)]
    pub sentiment_score: Option<f64>,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub key_entities_mentioned_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoliticalEvent {
    #[serde(flatten)]
    pub core: EntityCore,
    #[serde(default)]
    pub event_subtype: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub perceived_impact_area: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialReportItem {
    #[serde(flatten)]
    pub core: EntityCore,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub report_type: Option<String>,
    #[serde(default)]
    pub key_metrics: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSignal {
    #[serde(flatten)]
    pub core: EntityCore,
    #[serde(default)]
    pub signal_type: Option<String>,
    #[serde(default)]
    pub security_id: Option<String>,
    #[serde(default)]
    pub strength: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegulatoryChange {
    #[serde(flatten)]
    pub core: EntityCore,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub industries_affected_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Security {
    #[serde(flatten)]
    pub core: EntityCore,
    #[serde(default)]
    pub ticker_symbol: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
}

/// A knowledge-graph node. The `type` tag on the wire is the variant name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Entity {
    Company(Company),
    Industry(Industry),
    MacroIndicator(MacroIndicator),
    NewsItem(NewsItem),
    PoliticalEvent(PoliticalEvent),
    FinancialReportItem(FinancialReportItem),
    MarketSignal(MarketSignal),
    RegulatoryChange(RegulatoryChange),
    Security(Security),
}

/// Result of resolving a condition field against an event.
///
/// `Null` means the field is known but carries no value; `Missing` means
/// nothing by that name exists on the event at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Number(f64),
    Bool(bool),
    TextList(&'a [String]),
    Json(&'a Value),
    Null,
    Missing,
}

impl<'a> FieldValue<'a> {
    /// Collapse scalar JSON values into the matching typed variant.
    pub fn from_json(value: &'a Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::String(text) => FieldValue::Text(text),
            Value::Bool(flag) => FieldValue::Bool(*flag),
            Value::Number(number) => number
                .as_f64()
                .map(FieldValue::Number)
                .unwrap_or(FieldValue::Json(value)),
            Value::Array(_) | Value::Object(_) => FieldValue::Json(value),
        }
    }

    pub fn is_present(&self) -> bool {
        !matches!(self, FieldValue::Null | FieldValue::Missing)
    }

    pub fn to_json(&self) -> Option<Value> {
        match *self {
            FieldValue::Text(text) => Some(Value::String(text.to_string())),
            FieldValue::Number(number) => Some(Value::from(number)),
            FieldValue::Bool(flag) => Some(Value::Bool(flag)),
            FieldValue::TextList(items) => Some(Value::from(items.to_vec())),
            FieldValue::Json(value) => Some(value.clone()),
            FieldValue::Null | FieldValue::Missing => None,
        }
    }

    /// Every string carried by the value: a single text or the text members of a list.
    pub fn texts(&self) -> Vec<&'a str> {
        match *self {
            FieldValue::Text(text) => vec![text],
            FieldValue::TextList(items) => items.iter().map(String::as_str).collect(),
            FieldValue::Json(Value::Array(items)) => {
                items.iter().filter_map(Value::as_str).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn text(value: &Option<String>) -> FieldValue<'_> {
    value
        .as_deref()
        .map(FieldValue::Text)
        .unwrap_or(FieldValue::Null)
}

fn number(value: Option<f64>) -> FieldValue<'static> {
    value.map(FieldValue::Number).unwrap_or(FieldValue::Null)
}

fn list(values: &[String]) -> FieldValue<'_> {
    if values.is_empty() {
        FieldValue::Null
    } else {
        FieldValue::TextList(values)
    }
}

/// Walk a dotted path through the attribute map and nested JSON objects.
pub fn attribute_path<'a>(attributes: &'a Attributes, path: &str) -> FieldValue<'a> {
    let mut segments = path.split('.');
    let Some(head) = segments.next() else {
        return FieldValue::Missing;
    };
    let Some(mut current) = attributes.get(head) else {
        return FieldValue::Missing;
    };
    for segment in segments {
        match current.get(segment) {
            Some(next) => current = next,
            None => return FieldValue::Missing,
        }
    }
    FieldValue::from_json(current)
}

/// Resolve a field: `attributes.` prefix goes straight to the map, known
/// fields win next, and an unset known field still consults the attributes.
pub fn resolve_field<'a>(
    known: Option<FieldValue<'a>>,
    attributes: &'a Attributes,
    path: &str,
) -> FieldValue<'a> {
    if let Some(rest) = path.strip_prefix("attributes.") {
        return attribute_path(attributes, rest);
    }
    match known {
        Some(FieldValue::Null) => match attribute_path(attributes, path) {
            FieldValue::Missing => FieldValue::Null,
            found => found,
        },
        Some(found) => found,
        None => attribute_path(attributes, path),
    }
}

impl Entity {
    /// Build a variant with only its shared fields populated.
    pub fn from_parts(kind: EntityKind, core: EntityCore) -> Self {
        match kind {
            EntityKind::Company => Entity::Company(Company {
                core,
                ..Default::default()
            }),
            EntityKind::Industry => Entity::Industry(Industry {
                core,
                ..Default::default()
            }),
            EntityKind::MacroIndicator => Entity::MacroIndicator(MacroIndicator {
                core,
                ..Default::default()
            }),
            EntityKind::NewsItem => Entity::NewsItem(NewsItem {
                core,
                ..Default::default()
            }),
            EntityKind::PoliticalEvent => Entity::PoliticalEvent(PoliticalEvent {
                core,
                ..Default::default()
            }),
            EntityKind::FinancialReportItem => {
                Entity::FinancialReportItem(FinancialReportItem {
                    core,
                    ..Default::default()
                })
            }
            EntityKind::MarketSignal => Entity::MarketSignal(MarketSignal {
                core,
                ..Default::default()
            }),
            EntityKind::RegulatoryChange => Entity::RegulatoryChange(RegulatoryChange {
                core,
                ..Default::default()
            }),
            EntityKind::Security => Entity::Security(Security {
                core,
                ..Default::default()
            }),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Company(_) => EntityKind::Company,
            Entity::Industry(_) => EntityKind::Industry,
            Entity::MacroIndicator(_) => EntityKind::MacroIndicator,
            Entity::NewsItem(_) => EntityKind::NewsItem,
            Entity::PoliticalEvent(_) => EntityKind::PoliticalEvent,
            Entity::FinancialReportItem(_) => EntityKind::FinancialReportItem,
            Entity::MarketSignal(_) => EntityKind::MarketSignal,
            Entity::RegulatoryChange(_) => EntityKind::RegulatoryChange,
            Entity::Security(_) => EntityKind::Security,
        }
    }

    pub fn core(&self) -> &EntityCore {
        match self {
            Entity::Company(e) => &e.core,
            Entity::Industry(e) => &e.core,
            Entity::MacroIndicator(e) => &e.core,
            Entity::NewsItem(e) => &e.core,
            Entity::PoliticalEvent(e) => &e.core,
            Entity::FinancialReportItem(e) => &e.core,
            Entity::MarketSignal(e) => &e.core,
            Entity::RegulatoryChange(e) => &e.core,
            Entity::Security(e) => &e.core,
        }
    }

    pub fn core_mut(&mut self) -> &mut EntityCore {
        match self {
            Entity::Company(e) => &mut e.core,
            Entity::Industry(e) => &mut e.core,
            Entity::MacroIndicator(e) => &mut e.core,
            Entity::NewsItem(e) => &mut e.core,
            Entity::PoliticalEvent(e) => &mut e.core,
            Entity::FinancialReportItem(e) => &mut e.core,
            Entity::MarketSignal(e) => &mut e.core,
            Entity::RegulatoryChange(e) => &mut e.core,
            Entity::Security(e) => &mut e.core,
        }
    }

    pub fn id(&self) -> &str {
        &self.core().id
    }

    pub fn name(&self) -> &str {
        &self.core().name
    }

    pub fn attributes(&self) -> &Attributes {
        &self.core().attributes
    }

    /// Industry this entity belongs to, when it is a company.
    pub fn industry_id(&self) -> Option<&str> {
        match self {
            Entity::Company(company) => company.industry_id.as_deref().or_else(|| {
                company
                    .core
                    .attributes
                    .get("industry_id")
                    .and_then(Value::as_str)
            }),
            _ => None,
        }
    }

    pub fn field(&self, path: &str) -> FieldValue<'_> {
        resolve_field(self.known_field(path), self.attributes(), path)
    }

    /// Typed lookup over the fixed field set of the variant. `None` when the
    /// name is not a field of this variant.
    fn known_field(&self, name: &str) -> Option<FieldValue<'_>> {
        let core = self.core();
        match name {
            "id" => return Some(FieldValue::Text(&core.id)),
            "name" => return Some(FieldValue::Text(&core.name)),
            "type" => return Some(FieldValue::Text(self.kind().as_str())),
            "description" => return Some(text(&core.description)),
            "tags" => return Some(list(&core.tags)),
            _ => {}
        }
        match (self, name) {
            (Entity::Company(e), "ticker_symbol") => Some(text(&e.ticker_symbol)),
            (Entity::Company(e), "industry_id") => Some(text(&e.industry_id)),
            (Entity::Company(e), "country") => Some(text(&e.country)),
            (Entity::Industry(e), "sector") => Some(text(&e.sector)),
            (Entity::MacroIndicator(e), "region") => Some(text(&e.region)),
            (Entity::MacroIndicator(e), "indicator_code") => Some(text(&e.indicator_code)),
            (Entity::MacroIndicator(e), "value") => Some(number(e.value)),
            (Entity::MacroIndicator(e), "change") => Some(number(e.change)),
            (Entity::NewsItem(e), "sentiment_score") => Some(number(e.sentiment_score)),
            (Entity::NewsItem(e), "source_name") => Some(text(&e.source_name)),
            (Entity::NewsItem(e), "key_entities_mentioned_ids") => {
                Some(list(&e.key_entities_mentioned_ids))
            }
            (Entity::PoliticalEvent(e), "event_subtype") => Some(text(&e.event_subtype)),
            (Entity::PoliticalEvent(e), "location") => Some(text(&e.location)),
            (Entity::PoliticalEvent(e), "perceived_impact_area") => {
                Some(text(&e.perceived_impact_area))
            }
            (Entity::FinancialReportItem(e), "company_id") => Some(text(&e.company_id)),
            (Entity::FinancialReportItem(e), "report_type") => Some(text(&e.report_type)),
            (Entity::FinancialReportItem(e), path) if path.starts_with("key_metrics.") => {
                let metric = &path["key_metrics.".len()..];
                Some(number(e.key_metrics.get(metric).copied()))
            }
            (Entity::MarketSignal(e), "signal_type") => Some(text(&e.signal_type)),
            (Entity::MarketSignal(e), "security_id") => Some(text(&e.security_id)),
            (Entity::MarketSignal(e), "strength") => Some(number(e.strength)),
            (Entity::RegulatoryChange(e), "status") => Some(text(&e.status)),
            (Entity::RegulatoryChange(e), "jurisdiction") => Some(text(&e.jurisdiction)),
            (Entity::RegulatoryChange(e), "industries_affected_ids") => {
                Some(list(&e.industries_affected_ids))
            }
            (Entity::Security(e), "ticker_symbol") => Some(text(&e.ticker_symbol)),
            (Entity::Security(e), "company_id") => Some(text(&e.company_id)),
            (Entity::Security(e), "exchange") => Some(text(&e.exchange)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn news() -> Entity {
        Entity::NewsItem(NewsItem {
            core: EntityCore::new("news_1", "Upbeat coverage")
                .with_attribute("desk", json!({ "region": "EMEA" })),
            sentiment_score: Some(0.85),
            source_name: None,
            key_entities_mentioned_ids: vec!["comp_alpha".to_string()],
        })
    }

    #[test]
    fn kind_round_trips_through_from_str() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>(), Ok(kind));
        }
        assert!("Planet".parse::<EntityKind>().is_err());
    }

    #[test]
    fn known_fields_resolve_before_attributes() {
        let entity = news();
        assert_eq!(entity.field("sentiment_score"), FieldValue::Number(0.85));
        assert_eq!(entity.field("type"), FieldValue::Text("NewsItem"));
        assert_eq!(
            entity.field("attributes.desk.region"),
            FieldValue::Text("EMEA")
        );
    }

    #[test]
    fn unset_known_field_is_null_and_unknown_field_is_missing() {
        let entity = news();
        assert_eq!(entity.field("source_name"), FieldValue::Null);
        assert_eq!(entity.field("volume"), FieldValue::Missing);
    }

    #[test]
    fn unset_known_field_falls_back_to_attributes() {
        let entity = Entity::from_parts(
            EntityKind::NewsItem,
            EntityCore::new("news_2", "Synthetic").with_attribute("sentiment_score", 0.9),
        );
        assert_eq!(entity.field("sentiment_score"), FieldValue::Number(0.9));
    }

    #[test]
    fn deserializes_with_type_tag() {
        let raw = json!({
            "type": "Company",
            "id": "comp_alpha",
            "name": "AlphaCorp",
            "industry_id": "ind_tech",
            "attributes": { "debt_to_equity": 1.8 }
        });
        let entity: Entity = serde_json::from_value(raw).unwrap();
        assert_eq!(entity.kind(), EntityKind::Company);
        assert_eq!(entity.industry_id(), Some("ind_tech"));
        assert_eq!(entity.field("debt_to_equity"), FieldValue::Number(1.8));
    }
}
