use std::path::Path;
use std::sync::Arc;

use bevy_utils::tracing::{error, info, warn};
use bevy_utils::HashMap;

use crate::rules::catalog::{load_rule_catalog, parse_rule_catalog, RuleCatalog};

pub const DEFAULT_RULESET_ID: &str = "rs_standard_financial_impacts_v1";

const BUILTIN_RULES: &str = include_str!("../../assets/rules/builtin.json");

/// Named rule catalogs with an always-available built-in fallback.
///
/// Catalogs are immutable once registered and handed out behind `Arc`, so
/// concurrent analyzers can share them read-only.
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    catalogs: HashMap<String, Arc<RuleCatalog>>,
    fallback: Arc<RuleCatalog>,
    default_id: String,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl RuleRegistry {
    pub fn with_builtin() -> Self {
        Self {
            catalogs: HashMap::default(),
            fallback: Arc::new(builtin_catalog()),
            default_id: DEFAULT_RULESET_ID.to_string(),
        }
    }

    /// Register every readable catalog; unreadable files are logged and skipped.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Self {
        let mut registry = Self::with_builtin();
        for path in paths {
            registry.load_file(path);
        }
        registry
    }

    pub fn with_default_id(mut self, ruleset_id: impl Into<String>) -> Self {
        self.default_id = ruleset_id.into();
        self
    }

    /// Load one catalog file. A failure leaves the registry unchanged.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> bool {
        match load_rule_catalog(path.as_ref()) {
            Ok(catalog) => {
                self.register(catalog);
                true
            }
            Err(err) => {
                warn!(error = %err, "rule catalog unavailable; built-in rules remain in effect");
                false
            }
        }
    }

    pub fn register(&mut self, catalog: RuleCatalog) {
        info!(
            ruleset = %catalog.ruleset_id,
            rules = catalog.rules.len(),
            "rule catalog registered"
        );
        self.catalogs
            .insert(catalog.ruleset_id.clone(), Arc::new(catalog));
    }

    pub fn get(&self, ruleset_id: &str) -> Option<Arc<RuleCatalog>> {
        self.catalogs.get(ruleset_id).cloned()
    }

    pub fn fallback(&self) -> Arc<RuleCatalog> {
        Arc::clone(&self.fallback)
    }

    pub fn ruleset_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.catalogs.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Catalog for `ruleset_id` (or the default id), else the built-in set.
    pub fn resolve(&self, ruleset_id: Option<&str>) -> Arc<RuleCatalog> {
        let wanted = ruleset_id.unwrap_or(self.default_id.as_str());
        if let Some(catalog) = self.catalogs.get(wanted) {
            return Arc::clone(catalog);
        }
        if ruleset_id.is_some() && wanted != self.fallback.ruleset_id {
            warn!(ruleset = %wanted, "unknown ruleset; using built-in rules");
        }
        Arc::clone(&self.fallback)
    }
}

/// The catalog compiled into the binary. Never fails: an unreadable
/// embedded document yields an empty catalog and an error log.
pub fn builtin_catalog() -> RuleCatalog {
    match parse_rule_catalog(BUILTIN_RULES, "builtin") {
        Ok(catalog) => catalog,
        Err(err) => {
            error!(error = %err, "built-in rule catalog is unreadable");
            RuleCatalog {
                ruleset_id: DEFAULT_RULESET_ID.to_string(),
                description: String::new(),
                rules: Vec::new(),
            }
        }
    }
}
