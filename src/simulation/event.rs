use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::entity::{resolve_field, Attributes, Entity, FieldValue};
use crate::rules::condition::FieldSource;

/// Derived event standing for an impact that has landed on an entity, so
/// downstream rules can trigger on the impact type as an event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptualEvent {
    pub id: String,
    pub name: String,
    pub event_type: String,
    #[serde(default)]
    pub attributes: Attributes,
    /// Graph entity the event is about, when there is one.
    #[serde(default)]
    pub subject_id: Option<String>,
}

impl ConceptualEvent {
    pub fn from_impact(
        impact_type: &str,
        target: &Entity,
        rule_id: &str,
        probability: f64,
        magnitude: &str,
    ) -> Self {
        let mut attributes = target.attributes().clone();
        attributes.insert("target_entity_id".into(), Value::from(target.id()));
        attributes.insert(
            "target_entity_type".into(),
            Value::from(target.kind().as_str()),
        );
        attributes.insert("target_entity_name".into(), Value::from(target.name()));
        attributes.insert("source_rule_id".into(), Value::from(rule_id));
        attributes.insert("probability".into(), Value::from(probability));
        attributes.insert("magnitude".into(), Value::from(magnitude));
        Self {
            id: format!("{}@{}", impact_type, target.id()),
            name: format!("{} on {}", impact_type, target.name()),
            event_type: impact_type.to_string(),
            attributes,
            subject_id: Some(target.id().to_string()),
        }
    }

    pub fn field(&self, path: &str) -> FieldValue<'_> {
        let known = match path {
            "id" => Some(FieldValue::Text(&self.id)),
            "name" => Some(FieldValue::Text(&self.name)),
            "type" => Some(FieldValue::Text(&self.event_type)),
            "subject_id" => Some(
                self.subject_id
                    .as_deref()
                    .map(FieldValue::Text)
                    .unwrap_or(FieldValue::Null),
            ),
            _ => None,
        };
        resolve_field(known, &self.attributes, path)
    }
}

/// Unit of work in an impact trace: a concrete entity or a derived event.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    Entity(Entity),
    Conceptual(ConceptualEvent),
}

impl From<Entity> for TraceEvent {
    fn from(entity: Entity) -> Self {
        TraceEvent::Entity(entity)
    }
}

impl From<ConceptualEvent> for TraceEvent {
    fn from(event: ConceptualEvent) -> Self {
        TraceEvent::Conceptual(event)
    }
}

impl TraceEvent {
    pub fn id(&self) -> &str {
        match self {
            TraceEvent::Entity(entity) => entity.id(),
            TraceEvent::Conceptual(event) => &event.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TraceEvent::Entity(entity) => entity.name(),
            TraceEvent::Conceptual(event) => &event.name,
        }
    }

    /// Tag rules trigger on: the variant name or the conceptual impact type.
    pub fn event_type(&self) -> &str {
        match self {
            TraceEvent::Entity(entity) => entity.kind().as_str(),
            TraceEvent::Conceptual(event) => &event.event_type,
        }
    }

    pub fn subject_id(&self) -> Option<&str> {
        match self {
            TraceEvent::Entity(_) => None,
            TraceEvent::Conceptual(event) => event.subject_id.as_deref(),
        }
    }

    pub fn is_conceptual(&self) -> bool {
        matches!(self, TraceEvent::Conceptual(_))
    }
}

impl FieldSource for ConceptualEvent {
    fn field(&self, path: &str) -> FieldValue<'_> {
        ConceptualEvent::field(self, path)
    }
}

impl FieldSource for TraceEvent {
    fn field(&self, path: &str) -> FieldValue<'_> {
        match self {
            TraceEvent::Entity(entity) => entity.field(path),
            TraceEvent::Conceptual(event) => event.field(path),
        }
    }
}
