use std::fs;
use std::path::Path;

use bevy_utils::tracing::{info, warn};
use bevy_utils::HashSet;

use crate::graph::model::{GraphSnapshot, KnowledgeGraph};

#[derive(Debug, thiserror::Error)]
pub enum GraphDataError {
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

pub fn load_knowledge_graph(path: impl AsRef<Path>) -> Result<KnowledgeGraph, GraphDataError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| GraphDataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let snapshot: GraphSnapshot =
        serde_json::from_str(&raw).map_err(|source| GraphDataError::Json {
            path: path.display().to_string(),
            source,
        })?;
    snapshot.validate()?;
    let graph = KnowledgeGraph::from(snapshot);
    for relationship in graph.dangling_relationships() {
        warn!(
            relationship_id = %relationship.id,
            source_id = %relationship.source_id,
            target_id = %relationship.target_id,
            "relationship references an unknown id"
        );
    }
    info!(
        entities = graph.entities().len(),
        drivers = graph.drivers().len(),
        relationships = graph.relationships().len(),
        "knowledge graph loaded from {}",
        path.display()
    );
    Ok(graph)
}

impl GraphSnapshot {
    pub fn validate(&self) -> Result<(), GraphDataError> {
        let mut ids = HashSet::default();
        let entity_ids = self.entities.iter().map(|entity| entity.id());
        let driver_ids = self.drivers.iter().map(|driver| driver.id.as_str());
        for id in entity_ids.chain(driver_ids) {
            if id.trim().is_empty() {
                return Err(GraphDataError::Validation(
                    "graph node id cannot be empty".to_string(),
                ));
            }
            if !ids.insert(id) {
                return Err(GraphDataError::Validation(format!(
                    "duplicate graph node id {}",
                    id
                )));
            }
        }
        for relationship in &self.relationships {
            if let Some(strength) = relationship.strength {
                if !(0.0..=1.0).contains(&strength) {
                    return Err(GraphDataError::Validation(format!(
                        "relationship {} strength {} outside [0, 1]",
                        relationship.id, strength
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_duplicate_ids_across_entities_and_drivers() {
        let snapshot: GraphSnapshot = serde_json::from_value(json!({
            "entities": [{ "type": "Industry", "id": "x", "name": "Tech" }],
            "drivers": [{ "id": "x", "name": "AI", "description": "Adoption" }]
        }))
        .unwrap();
        assert!(matches!(
            snapshot.validate(),
            Err(GraphDataError::Validation(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_knowledge_graph("./does/not/exist.json").unwrap_err();
        assert!(matches!(err, GraphDataError::Io { .. }));
    }

    #[test]
    fn loads_bundled_sample_graph() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/data/knowledge_graph.json");
        let graph = load_knowledge_graph(path).unwrap();
        assert!(graph.entity("comp_alpha").is_some());
        assert!(!graph.relationships().is_empty());
    }
}
