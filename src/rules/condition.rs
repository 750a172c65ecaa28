use bevy_utils::tracing::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::entity::{Entity, FieldValue};

/// Anything a condition can be evaluated against.
pub trait FieldSource {
    fn field(&self, path: &str) -> FieldValue<'_>;
}

impl FieldSource for Entity {
    fn field(&self, path: &str) -> FieldValue<'_> {
        Entity::field(self, path)
    }
}

/// Comparison operator. Unrecognised names are kept so the rule still loads
/// and the condition fails closed when evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Equals,
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
    Contains,
    Exists,
    Unknown(String),
}

impl Operator {
    pub fn as_str(&self) -> &str {
        match self {
            Operator::Equals => "equals",
            Operator::GreaterThan => "greater_than",
            Operator::GreaterThanOrEqualTo => "greater_than_or_equal_to",
            Operator::LessThan => "less_than",
            Operator::LessThanOrEqualTo => "less_than_or_equal_to",
            Operator::Contains => "contains",
            Operator::Exists => "exists",
            Operator::Unknown(name) => name,
        }
    }
}

impl From<String> for Operator {
    fn from(value: String) -> Self {
        match value.as_str() {
            "equals" => Operator::Equals,
            "greater_than" => Operator::GreaterThan,
            "greater_than_or_equal_to" => Operator::GreaterThanOrEqualTo,
            "less_than" => Operator::LessThan,
            "less_than_or_equal_to" => Operator::LessThanOrEqualTo,
            "contains" => Operator::Contains,
            "exists" => Operator::Exists,
            _ => Operator::Unknown(value),
        }
    }
}

impl From<Operator> for String {
    fn from(value: Operator) -> Self {
        match value {
            Operator::Unknown(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Take the comparison value from this field of the triggering event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from_trigger_attribute: Option<String>,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: Some(value.into()),
            value_from_trigger_attribute: None,
        }
    }

    /// Evaluate against `subject`. `trigger` supplies values for
    /// `value_from_trigger_attribute` references; without it such a
    /// condition cannot hold.
    pub fn evaluate<S>(&self, subject: &S, trigger: Option<&dyn FieldSource>) -> bool
    where
        S: FieldSource + ?Sized,
    {
        let expected = match &self.value_from_trigger_attribute {
            Some(reference) => {
                let resolved = trigger.and_then(|event| event.field(reference).to_json());
                if resolved.is_none() {
                    debug!(
                        field = %self.field,
                        reference = %reference,
                        "trigger reference unresolved; condition fails"
                    );
                    return false;
                }
                resolved
            }
            None => self.value.clone(),
        };
        compare(&subject.field(&self.field), &self.operator, expected.as_ref())
    }
}

/// True when every condition holds. An empty list always holds.
pub fn all_hold<S>(conditions: &[Condition], subject: &S, trigger: Option<&dyn FieldSource>) -> bool
where
    S: FieldSource + ?Sized,
{
    conditions
        .iter()
        .all(|condition| condition.evaluate(subject, trigger))
}

pub fn compare(actual: &FieldValue<'_>, operator: &Operator, expected: Option<&Value>) -> bool {
    if let Operator::Unknown(name) = operator {
        warn!(operator = %name, "unknown condition operator; evaluating to false");
        return false;
    }
    if *operator == Operator::Exists {
        return actual.is_present();
    }
    if !actual.is_present() {
        return false;
    }
    let Some(expected) = expected else {
        return false;
    };
    match operator {
        Operator::Equals => equals(actual, expected),
        Operator::GreaterThan => numeric(actual, expected, |a, b| a > b),
        Operator::GreaterThanOrEqualTo => numeric(actual, expected, |a, b| a >= b),
        Operator::LessThan => numeric(actual, expected, |a, b| a < b),
        Operator::LessThanOrEqualTo => numeric(actual, expected, |a, b| a <= b),
        Operator::Contains => contains(actual, expected),
        Operator::Exists | Operator::Unknown(_) => false,
    }
}

fn equals(actual: &FieldValue<'_>, expected: &Value) -> bool {
    match (actual, expected) {
        (FieldValue::Text(text), Value::String(other)) => *text == other.as_str(),
        (FieldValue::Number(number), Value::Number(other)) => other
            .as_f64()
            .map(|other| (number - other).abs() < f64::EPSILON)
            .unwrap_or(false),
        (FieldValue::Bool(flag), Value::Bool(other)) => flag == other,
        (FieldValue::TextList(items), Value::Array(others)) => {
            items.len() == others.len()
                && items
                    .iter()
                    .zip(others)
                    .all(|(item, other)| other.as_str() == Some(item.as_str()))
        }
        (FieldValue::Json(value), other) => *value == other,
        _ => false,
    }
}

fn numeric(actual: &FieldValue<'_>, expected: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (actual, expected.as_f64()) {
        (FieldValue::Number(number), Some(other)) => op(*number, other),
        _ => false,
    }
}

/// Case-insensitive substring for text, exact membership for lists.
fn contains(actual: &FieldValue<'_>, expected: &Value) -> bool {
    match actual {
        FieldValue::Text(text) => expected
            .as_str()
            .map(|needle| text.to_lowercase().contains(&needle.to_lowercase()))
            .unwrap_or(false),
        FieldValue::TextList(items) => expected
            .as_str()
            .map(|needle| items.iter().any(|item| item == needle))
            .unwrap_or(false),
        FieldValue::Json(Value::Array(items)) => items.iter().any(|item| item == expected),
        _ => false,
    }
}
