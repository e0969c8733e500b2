//! Pure payload validation against a schema contract.

use super::contract::{json_type_name, Constraint, FieldSpec, FieldType, SchemaContract};
use crate::core::FailureRecord;
use dashmap::DashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;

/// Compiled `pattern` constraints, keyed by pattern text.
static PATTERNS: LazyLock<DashMap<String, Regex>> = LazyLock::new(DashMap::new);

/// Returns the compiled regex for `pattern`, compiling it on first use.
fn compiled(pattern: &str) -> Result<Regex, regex::Error> {
    if let Some(re) = PATTERNS.get(pattern) {
        return Ok(re.value().clone());
    }
    let re = Regex::new(pattern)?;
    PATTERNS.insert(pattern.to_string(), re.clone());
    Ok(re)
}

/// One reason a value does not satisfy a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Offending field, `$` for the payload itself, `field[i]` for array elements.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl Violation {
    /// Creates a violation.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field '{}': {}", self.field, self.message)
    }
}

/// Result of validating a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The value satisfies the contract.
    Valid,
    /// The value violates the contract. Never empty.
    Invalid(Vec<Violation>),
}

impl ValidationOutcome {
    /// Returns true if the value satisfied the contract.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Returns the violations, empty when valid.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Valid => &[],
            Self::Invalid(violations) => violations,
        }
    }

    /// Names of the offending fields, without duplicates.
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        for v in self.violations() {
            if !fields.contains(&v.field.as_str()) {
                fields.push(&v.field);
            }
        }
        fields
    }

    /// Converts violations into a `validation_error` record attributed to `stage`.
    ///
    /// Returns `None` for a valid outcome.
    #[must_use]
    pub fn into_failure(self, stage: &str, contract_id: &str) -> Option<FailureRecord> {
        let Self::Invalid(violations) = self else {
            return None;
        };

        let details = violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        let fields: Vec<Value> = violations
            .iter()
            .map(|v| Value::String(v.field.clone()))
            .collect();

        Some(
            FailureRecord::validation(
                stage,
                format!("payload violates schema '{contract_id}': {details}"),
            )
            .with_context("schema_id", Value::String(contract_id.to_string()))
            .with_context("fields", Value::Array(fields)),
        )
    }
}

/// Validates a value against a contract.
///
/// Pure: the same value and contract always give the same outcome.
#[must_use]
pub fn validate(value: &Value, contract: &SchemaContract) -> ValidationOutcome {
    let Some(object) = value.as_object() else {
        return ValidationOutcome::Invalid(vec![Violation::new(
            "$",
            format!("expected a JSON object, found {}", json_type_name(value)),
        )]);
    };

    let mut violations = Vec::new();

    for spec in &contract.fields {
        match object.get(&spec.name) {
            None | Some(Value::Null) => {
                if spec.required {
                    violations.push(Violation::new(&spec.name, "required field is missing"));
                }
            }
            Some(field_value) => check_field(spec, field_value, &mut violations),
        }
    }

    if contract.strict {
        for key in object.keys() {
            if contract.field_named(key).is_none() {
                violations.push(Violation::new(key, "field is not declared by the contract"));
            }
        }
    }

    if violations.is_empty() {
        ValidationOutcome::Valid
    } else {
        ValidationOutcome::Invalid(violations)
    }
}

fn check_field(spec: &FieldSpec, value: &Value, violations: &mut Vec<Violation>) {
    if !spec.field_type.matches(value) {
        violations.push(Violation::new(
            &spec.name,
            format!("expected {}, found {}", spec.field_type, json_type_name(value)),
        ));
        return;
    }

    for constraint in &spec.constraints {
        check_constraint(&spec.name, constraint, value, violations);
    }
}

fn check_constraint(field: &str, constraint: &Constraint, value: &Value, out: &mut Vec<Violation>) {
    match constraint {
        Constraint::Range { min, max } => {
            let Some(n) = value.as_f64() else { return };
            if let Some(min) = min {
                if n < *min {
                    out.push(Violation::new(field, format!("must be >= {min}, got {n}")));
                }
            }
            if let Some(max) = max {
                if n > *max {
                    out.push(Violation::new(field, format!("must be <= {max}, got {n}")));
                }
            }
        }
        Constraint::OneOf { values } => {
            if !values.contains(value) {
                let allowed = values
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                out.push(Violation::new(field, format!("must be one of [{allowed}], got {value}")));
            }
        }
        Constraint::Pattern { pattern } => {
            let Some(s) = value.as_str() else { return };
            match compiled(pattern) {
                Ok(re) if re.is_match(s) => {}
                Ok(_) => out.push(Violation::new(field, format!("must match pattern '{pattern}'"))),
                Err(e) => out.push(Violation::new(field, format!("pattern '{pattern}' is invalid: {e}"))),
            }
        }
        Constraint::NonEmpty => {
            let empty = match value {
                Value::String(s) => s.trim().is_empty(),
                Value::Array(a) => a.is_empty(),
                Value::Object(o) => o.is_empty(),
                _ => false,
            };
            if empty {
                out.push(Violation::new(field, "must not be empty"));
            }
        }
        Constraint::Length { min, max } => {
            let len = match value {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                _ => return,
            };
            if let Some(min) = min {
                if len < *min {
                    out.push(Violation::new(field, format!("length must be >= {min}, got {len}")));
                }
            }
            if let Some(max) = max {
                if len > *max {
                    out.push(Violation::new(field, format!("length must be <= {max}, got {len}")));
                }
            }
        }
        Constraint::Items { item_type } => {
            let Some(items) = value.as_array() else { return };
            for (i, item) in items.iter().enumerate() {
                if !item_type.matches(item) {
                    out.push(Violation::new(
                        format!("{field}[{i}]"),
                        format!("expected {item_type}, found {}", json_type_name(item)),
                    ));
                }
            }
        }
    }
}

/// Checks that every constraint in the contract can be evaluated.
pub(crate) fn check_constraints(contract: &SchemaContract) -> Result<(), (String, String)> {
    for spec in &contract.fields {
        for constraint in &spec.constraints {
            if let Constraint::Pattern { pattern } = constraint {
                compiled(pattern).map_err(|e| (spec.name.clone(), e.to_string()))?;
            }
            if let Constraint::Items { item_type } = constraint {
                if spec.field_type != FieldType::Array {
                    return Err((
                        spec.name.clone(),
                        format!("items({item_type}) requires an array field"),
                    ));
                }
            }
        }
    }
    Ok(())
}
