use bevy_utils::tracing::warn;
use bevy_utils::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::entity::{Attributes, Entity, EntityKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImpactPotential {
    Score(f64),
    Qualitative(String),
}

/// A named causal factor. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub impact_potential: Option<ImpactPotential>,
    #[serde(default)]
    pub influence_pattern: Option<String>,
    #[serde(default)]
    pub related_entity_types: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Directed edge between two entity or driver ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub strength: Option<f64>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub explanation_template: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

/// Wire shape of a graph snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub drivers: Vec<Driver>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

/// In-memory graph snapshot indexed by id and by relationship endpoint.
///
/// Entity order is insertion order; every "first match" heuristic in the
/// engine relies on it. Ids are unique: later duplicates are dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "GraphSnapshot", into = "GraphSnapshot")]
pub struct KnowledgeGraph {
    entities: Vec<Entity>,
    drivers: Vec<Driver>,
    relationships: Vec<Relationship>,
    entity_index: HashMap<String, usize>,
    driver_index: HashMap<String, usize>,
    outgoing: HashMap<String, Vec<usize>>,
    incoming: HashMap<String, Vec<usize>>,
}

impl PartialEq for KnowledgeGraph {
    fn eq(&self, other: &Self) -> bool {
        self.entities == other.entities
            && self.drivers == other.drivers
            && self.relationships == other.relationships
    }
}

impl From<GraphSnapshot> for KnowledgeGraph {
    fn from(snapshot: GraphSnapshot) -> Self {
        Self::new(snapshot.entities, snapshot.drivers, snapshot.relationships)
    }
}

impl From<KnowledgeGraph> for GraphSnapshot {
    fn from(graph: KnowledgeGraph) -> Self {
        Self {
            entities: graph.entities,
            drivers: graph.drivers,
            relationships: graph.relationships,
        }
    }
}

impl KnowledgeGraph {
    pub fn new(
        entities: Vec<Entity>,
        drivers: Vec<Driver>,
        relationships: Vec<Relationship>,
    ) -> Self {
        let mut graph = Self::default();
        for entity in entities {
            if graph.entity_index.contains_key(entity.id()) {
                warn!(entity_id = entity.id(), "duplicate entity id dropped");
                continue;
            }
            graph
                .entity_index
                .insert(entity.id().to_string(), graph.entities.len());
            graph.entities.push(entity);
        }
        for driver in drivers {
            if graph.driver_index.contains_key(&driver.id) {
                warn!(driver_id = %driver.id, "duplicate driver id dropped");
                continue;
            }
            graph
                .driver_index
                .insert(driver.id.clone(), graph.drivers.len());
            graph.drivers.push(driver);
        }
        for relationship in relationships {
            let index = graph.relationships.len();
            graph
                .outgoing
                .entry(relationship.source_id.clone())
                .or_default()
                .push(index);
            graph
                .incoming
                .entry(relationship.target_id.clone())
                .or_default()
                .push(index);
            graph.relationships.push(relationship);
        }
        graph
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn drivers(&self) -> &[Driver] {
        &self.drivers
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entity_index.get(id).map(|&index| &self.entities[index])
    }

    pub fn driver(&self, id: &str) -> Option<&Driver> {
        self.driver_index.get(id).map(|&index| &self.drivers[index])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entity_index.contains_key(id) || self.driver_index.contains_key(id)
    }

    pub fn entities_of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> + '_ {
        self.entities
            .iter()
            .filter(move |entity| entity.kind() == kind)
    }

    pub fn relationships_from(&self, id: &str) -> impl Iterator<Item = &Relationship> + '_ {
        self.edges(&self.outgoing, id)
    }

    pub fn relationships_to(&self, id: &str) -> impl Iterator<Item = &Relationship> + '_ {
        self.edges(&self.incoming, id)
    }

    fn edges<'a>(
        &'a self,
        index: &'a HashMap<String, Vec<usize>>,
        id: &str,
    ) -> impl Iterator<Item = &'a Relationship> + 'a {
        index
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(move |&position| &self.relationships[position])
    }

    /// True when a relationship connects the two ids in either direction.
    pub fn are_linked(&self, a: &str, b: &str) -> bool {
        self.relationships_from(a).any(|rel| rel.target_id == b)
            || self.relationships_to(a).any(|rel| rel.source_id == b)
    }

    /// Relationships whose endpoints do not resolve to a known entity or driver.
    pub fn dangling_relationships(&self) -> Vec<&Relationship> {
        self.relationships
            .iter()
            .filter(|rel| !self.contains(&rel.source_id) || !self.contains(&rel.target_id))
            .collect()
    }

    /// Replace an entity with the same id or append it. Returns true on replace.
    pub fn insert_entity(&mut self, entity: Entity) -> bool {
        if let Some(&index) = self.entity_index.get(entity.id()) {
            self.entities[index] = entity;
            return true;
        }
        self.entity_index
            .insert(entity.id().to_string(), self.entities.len());
        self.entities.push(entity);
        false
    }

    /// Overlay attribute values onto an existing entity.
    pub fn merge_attributes(&mut self, id: &str, delta: &Attributes) -> bool {
        let Some(&index) = self.entity_index.get(id) else {
            return false;
        };
        let attributes = &mut self.entities[index].core_mut().attributes;
        for (key, value) in delta {
            attributes.insert(key.clone(), value.clone());
        }
        true
    }

    pub fn attribute(&self, id: &str, key: &str) -> Option<&Value> {
        self.entity(id).and_then(|entity| entity.attributes().get(key))
    }
}
