pub mod catalog;
pub mod condition;
pub mod registry;

pub use catalog::{
    load_rule_catalog, parse_rule_catalog, ImpactDefinition, Rule, RuleCatalog, RuleDataError,
    Trigger,
};
pub use condition::{all_hold, compare, Condition, FieldSource, Operator};
pub use registry::{builtin_catalog, RuleRegistry, DEFAULT_RULESET_ID};
