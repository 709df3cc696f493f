//! Payload validation for book writes and list filters.
//!
//! Rules are a fixed table evaluated in column order, so violations come back in
//! a stable order. Values are never coerced: `"2018"` is not a year. Fields the
//! table does not know are ignored.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::models::{BookChanges, BookFields, BookFilter, ColumnValue, NewBook};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    PositiveInteger,
    Year,
}

struct FieldRule {
    name: &'static str,
    kind: FieldKind,
}

const BOOK_FIELDS: &[FieldRule] = &[
    FieldRule { name: "isbn", kind: FieldKind::Text },
    FieldRule { name: "amazon_url", kind: FieldKind::Text },
    FieldRule { name: "author", kind: FieldKind::Text },
    FieldRule { name: "language", kind: FieldKind::Text },
    FieldRule { name: "pages", kind: FieldKind::PositiveInteger },
    FieldRule { name: "publisher", kind: FieldKind::Text },
    FieldRule { name: "title", kind: FieldKind::Text },
    FieldRule { name: "year", kind: FieldKind::Year },
];

const MIN_YEAR: i64 = 1000;
const MAX_YEAR: i64 = 9999;

/// Named collection of field constraints applied before a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSet {
    /// Every field required, isbn included
    Create,
    /// Every field except isbn required; the isbn comes from the route
    FullUpdate,
    /// Every field except isbn optional
    PartialUpdate,
}

impl RuleSet {
    pub fn name(&self) -> &'static str {
        match self {
            RuleSet::Create => "create",
            RuleSet::FullUpdate => "full-update",
            RuleSet::PartialUpdate => "partial-update",
        }
    }

    fn covers(&self, field: &str) -> bool {
        match self {
            RuleSet::Create => true,
            RuleSet::FullUpdate | RuleSet::PartialUpdate => field != "isbn",
        }
    }

    fn requires_all(&self) -> bool {
        !matches!(self, RuleSet::PartialUpdate)
    }

    /// Check `payload`, returning every violation found.
    pub fn check(&self, payload: &Value) -> Result<(), Vec<String>> {
        let Some(object) = payload.as_object() else {
            return Err(vec!["instance is not of a type(s) object".to_string()]);
        };

        let violations: Vec<String> = BOOK_FIELDS
            .iter()
            .filter(|rule| self.covers(rule.name))
            .filter_map(|rule| self.check_field(object, rule))
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    fn check_field(&self, object: &Map<String, Value>, rule: &FieldRule) -> Option<String> {
        match object.get(rule.name) {
            None if self.requires_all() => {
                Some(format!("instance requires property \"{}\"", rule.name))
            }
            None => None,
            Some(value) => check_value(rule, value),
        }
    }
}

fn check_value(rule: &FieldRule, value: &Value) -> Option<String> {
    let name = rule.name;
    match rule.kind {
        FieldKind::Text if value.is_string() => None,
        FieldKind::Text => Some(format!("instance.{name} is not of a type(s) string")),
        FieldKind::PositiveInteger | FieldKind::Year => {
            let Some(number) = integer_value(value) else {
                return Some(format!("instance.{name} is not of a type(s) integer"));
            };
            let (min, max) = match rule.kind {
                FieldKind::Year => (MIN_YEAR, MAX_YEAR),
                _ => (1, i64::MAX),
            };
            if number < min {
                Some(format!("instance.{name} must be greater than or equal to {min}"))
            } else if number > max {
                Some(format!("instance.{name} must be less than or equal to {max}"))
            } else {
                None
            }
        }
    }
}

/// Integral JSON numbers, including float spellings such as `2017.0`.
fn integer_value(value: &Value) -> Option<i64> {
    if let Some(number) = value.as_i64() {
        return Some(number);
    }
    let number = value.as_f64()?;
    let in_range = number >= i64::MIN as f64 && number < i64::MAX as f64;
    (number.fract() == 0.0 && in_range).then_some(number as i64)
}

fn validate_into<T: DeserializeOwned>(
    mut payload: Value,
    rules: RuleSet,
) -> Result<T, Vec<String>> {
    rules.check(&payload)?;

    // Integer columns deserialize as i64, so float spellings are rewritten first
    if let Some(object) = payload.as_object_mut() {
        for rule in BOOK_FIELDS.iter().filter(|rule| rule.kind != FieldKind::Text) {
            if let Some(value) = object.get_mut(rule.name) {
                if let Some(number) = integer_value(value) {
                    *value = Value::from(number);
                }
            }
        }
    }

    serde_json::from_value(payload).map_err(|err| vec![format!("instance {err}")])
}

/// Validate a create payload with the `create` rule set.
pub fn validate_create(payload: Value) -> Result<NewBook, Vec<String>> {
    validate_into(payload, RuleSet::Create)
}

/// Validate a full-update payload with the `full-update` rule set.
pub fn validate_full_update(payload: Value) -> Result<BookFields, Vec<String>> {
    validate_into(payload, RuleSet::FullUpdate)
}

/// Validate a partial-update payload with the `partial-update` rule set.
pub fn validate_partial_update(payload: Value) -> Result<BookChanges, Vec<String>> {
    validate_into(payload, RuleSet::PartialUpdate)
}

/// Turn query-string pairs into exact-match filters on known columns.
///
/// Integer columns must parse as integers; unknown keys are ignored.
pub fn filter_from_query(query: &HashMap<String, String>) -> Result<BookFilter, Vec<String>> {
    let mut filter = BookFilter::default();
    let mut violations = Vec::new();

    for rule in BOOK_FIELDS {
        let Some(raw) = query.get(rule.name) else {
            continue;
        };

        match rule.kind {
            FieldKind::Text => filter
                .conditions
                .push((rule.name, ColumnValue::Text(raw.clone()))),
            FieldKind::PositiveInteger | FieldKind::Year => match raw.trim().parse::<i64>() {
                Ok(number) => filter
                    .conditions
                    .push((rule.name, ColumnValue::Integer(number))),
                Err(_) => violations.push(format!(
                    "query.{} is not of a type(s) integer",
                    rule.name
                )),
            },
        }
    }

    if violations.is_empty() {
        Ok(filter)
    } else {
        Err(violations)
    }
}
