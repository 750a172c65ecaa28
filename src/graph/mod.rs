pub mod entity;
pub mod loader;
pub mod model;

pub use entity::{
    Attributes, Company, Entity, EntityCore, EntityKind, FieldValue, FinancialReportItem,
    Industry, MacroIndicator, MarketSignal, NewsItem, ParseKindError, PoliticalEvent,
    RegulatoryChange, Security,
};
pub use loader::{load_knowledge_graph, GraphDataError};
pub use model::{Driver, GraphSnapshot, ImpactPotential, KnowledgeGraph, Relationship};
