use crate::graph::entity::{Entity, EntityKind};
use crate::graph::model::KnowledgeGraph;
use crate::rules::catalog::ImpactDefinition;
use crate::rules::condition::{all_hold, FieldSource};
use crate::simulation::event::TraceEvent;

/// Trigger fields that name other entities explicitly.
const REFERENCE_FIELDS: [&str; 5] = [
    "key_entities_mentioned_ids",
    "company_id",
    "security_id",
    "industries_affected_ids",
    "affected_sectors",
];

/// Entities an impact lands on, in graph order.
///
/// Selector conditions, when present, are the only filter. Without them the
/// trigger's explicit references win, then entities linked to a conceptual
/// trigger's subject, then the type-specific fallbacks.
pub fn resolve_targets<'g>(
    graph: &'g KnowledgeGraph,
    impact: &ImpactDefinition,
    trigger: &TraceEvent,
) -> Vec<&'g Entity> {
    let kind = impact.target_entity_type;
    if !impact.target_selector_conditions.is_empty() {
        let trigger_source: &dyn FieldSource = trigger;
        return graph
            .entities_of_kind(kind)
            .filter(|candidate| {
                all_hold(
                    &impact.target_selector_conditions,
                    *candidate,
                    Some(trigger_source),
                )
            })
            .collect();
    }

    let referenced = referenced_ids(trigger);
    let mentioned: Vec<&Entity> = referenced
        .iter()
        .filter_map(|id| graph.entity(id))
        .filter(|entity| entity.kind() == kind)
        .collect();
    if !mentioned.is_empty() {
        return mentioned;
    }

    if let Some(subject) = trigger.subject_id().and_then(|id| graph.entity(id)) {
        let linked: Vec<&Entity> = graph
            .entities_of_kind(kind)
            .filter(|candidate| is_linked(graph, subject, candidate))
            .collect();
        if !linked.is_empty() {
            return linked;
        }
    }

    match kind {
        EntityKind::Industry => referenced
            .iter()
            .filter_map(|id| graph.entity(id))
            .find(|entity| entity.kind() == EntityKind::Company)
            .and_then(Entity::industry_id)
            .and_then(|industry_id| graph.entity(industry_id))
            .into_iter()
            .collect(),
        _ if trigger.is_conceptual() => Vec::new(),
        _ => graph.entities_of_kind(kind).take(1).collect(),
    }
}

/// Ids the trigger names in its reference fields, deduplicated in order.
pub fn referenced_ids(trigger: &TraceEvent) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for field in REFERENCE_FIELDS {
        for id in trigger.field(field).texts() {
            if !ids.iter().any(|known| known == id) {
                ids.push(id.to_string());
            }
        }
    }
    ids
}

fn is_linked(graph: &KnowledgeGraph, subject: &Entity, candidate: &Entity) -> bool {
    if subject.id() == candidate.id() {
        return false;
    }
    candidate.industry_id() == Some(subject.id())
        || subject.industry_id() == Some(candidate.id())
        || candidate.field("company_id").texts().contains(&subject.id())
        || subject.field("company_id").texts().contains(&candidate.id())
        || graph.are_linked(subject.id(), candidate.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::entity::{Company, EntityCore, Industry, NewsItem, Security};
    use crate::graph::model::Relationship;
    use crate::rules::condition::{Condition, Operator};
    use crate::simulation::event::ConceptualEvent;

    fn company(id: &str, industry: &str) -> Entity {
        Entity::Company(Company {
            core: EntityCore::new(id, id.to_uppercase()),
            industry_id: Some(industry.to_string()),
            ..Default::default()
        })
    }

    fn graph() -> KnowledgeGraph {
        KnowledgeGraph::new(
            vec![
                Entity::Industry(Industry {
                    core: EntityCore::new("ind_tech", "Technology"),
                    sector: None,
                }),
                Entity::Industry(Industry {
                    core: EntityCore::new("ind_auto", "Automotive"),
                    sector: None,
                }),
                company("comp_a", "ind_tech"),
                company("comp_b", "ind_auto"),
                company("comp_c", "ind_auto"),
                Entity::Security(Security {
                    core: EntityCore::new("sec_b", "B Shares"),
                    company_id: Some("comp_b".to_string()),
                    ..Default::default()
                }),
            ],
            Vec::new(),
            vec![Relationship {
                id: "rel_supply".to_string(),
                source_id: "comp_c".to_string(),
                target_id: "comp_a".to_string(),
                kind: "supplies".to_string(),
                strength: None,
                direction: None,
                explanation_template: None,
                attributes: Default::default(),
            }],
        )
    }

    fn impact(kind: EntityKind) -> ImpactDefinition {
        ImpactDefinition {
            order: 1,
            target_entity_type: kind,
            target_selector_conditions: Vec::new(),
            impact_type: "X".to_string(),
            probability: 0.5,
            magnitude_qualitative: "Low".to_string(),
            timescale: None,
            explanation_template: None,
        }
    }

    fn news(mentions: &[&str]) -> TraceEvent {
        TraceEvent::Entity(Entity::NewsItem(NewsItem {
            core: EntityCore::new("news", "News"),
            sentiment_score: Some(0.9),
            source_name: None,
            key_entities_mentioned_ids: mentions.iter().map(|id| id.to_string()).collect(),
        }))
    }

    fn ids(entities: Vec<&Entity>) -> Vec<&str> {
        entities.into_iter().map(Entity::id).collect()
    }

    #[test]
    fn mentioned_company_beats_first_in_graph() {
        let graph = graph();
        let targets = resolve_targets(&graph, &impact(EntityKind::Company), &news(&["comp_c"]));
        assert_eq!(ids(targets), vec!["comp_c"]);
    }

    #[test]
    fn unmentioned_company_falls_back_to_first() {
        let graph = graph();
        let targets = resolve_targets(&graph, &impact(EntityKind::Company), &news(&[]));
        assert_eq!(ids(targets), vec!["comp_a"]);
    }

    #[test]
    fn industry_follows_first_mentioned_company() {
        let graph = graph();
        let targets = resolve_targets(&graph, &impact(EntityKind::Industry), &news(&["comp_b"]));
        assert_eq!(ids(targets), vec!["ind_auto"]);
        let none = resolve_targets(&graph, &impact(EntityKind::Industry), &news(&[]));
        assert!(none.is_empty());
    }

    #[test]
    fn conceptual_trigger_reaches_linked_entities() {
        let graph = graph();
        let industry = graph.entity("ind_auto").unwrap();
        let trigger = TraceEvent::from(ConceptualEvent::from_impact("Risk", industry, "r", 0.5, "Low"));
        let companies = resolve_targets(&graph, &impact(EntityKind::Company), &trigger);
        assert_eq!(ids(companies), vec!["comp_b", "comp_c"]);

        let company = graph.entity("comp_c").unwrap();
        let trigger = TraceEvent::from(ConceptualEvent::from_impact("Risk", company, "r", 0.5, "Low"));
        let partners = resolve_targets(&graph, &impact(EntityKind::Company), &trigger);
        assert_eq!(ids(partners), vec!["comp_a"]);
        let securities = resolve_targets(&graph, &impact(EntityKind::Security), &trigger);
        assert!(securities.is_empty());
    }

    #[test]
    fn selector_conditions_can_reference_the_trigger() {
        let graph = graph();
        let company = graph.entity("comp_b").unwrap();
        let trigger = TraceEvent::from(ConceptualEvent::from_impact("Cost", company, "r", 0.5, "Low"));
        let mut definition = impact(EntityKind::Security);
        definition.target_selector_conditions = vec![Condition {
            field: "company_id".to_string(),
            operator: Operator::Equals,
            value: None,
            value_from_trigger_attribute: Some("target_entity_id".to_string()),
        }];
        let targets = resolve_targets(&graph, &definition, &trigger);
        assert_eq!(ids(targets), vec!["sec_b"]);
    }
}
