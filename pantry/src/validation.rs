//! Request payload validation against a resource's field list.
//!
//! Validation is fail-fast: fields are checked in schema order and the first failure is
//! returned.

use crate::db::models::records::{FieldUpdate, FieldValue};
use crate::schema::{FieldKind, FieldSpec};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationReason {
    Missing,
    TooShort { min_length: usize },
    WrongType { expected: FieldKind },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub reason: ValidationReason,
}

impl ValidationError {
    fn new(spec: &FieldSpec, reason: ValidationReason) -> Self {
        Self {
            field: spec.name.clone(),
            reason,
        }
    }

    pub fn message(&self) -> String {
        match &self.reason {
            ValidationReason::Missing => format!("{} is missing", self.field),
            ValidationReason::TooShort { min_length } => {
                format!("{} is missing, or is less than {min_length} characters", self.field)
            }
            ValidationReason::WrongType { expected } => format!("{} must be {}", self.field, expected.describe()),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Field values that passed validation, in schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedFields(Vec<(String, FieldValue)>);

impl ValidatedFields {
    pub(crate) fn into_values(self) -> Vec<(String, FieldValue)> {
        self.0
    }
}

/// Validates a create payload. Unknown keys are ignored and `null` counts as missing.
pub fn validate(payload: &Map<String, Value>, fields: &[FieldSpec]) -> Result<ValidatedFields, ValidationError> {
    let mut values = Vec::with_capacity(fields.len());
    for spec in fields {
        match payload.get(&spec.name) {
            None | Some(Value::Null) => {
                if spec.required {
                    let reason = match spec.kind {
                        FieldKind::Text if spec.min_length > 0 => ValidationReason::TooShort {
                            min_length: spec.min_length,
                        },
                        _ => ValidationReason::Missing,
                    };
                    return Err(ValidationError::new(spec, reason));
                }
            }
            Some(value) => values.push((spec.name.clone(), check_value(spec, value)?)),
        }
    }
    Ok(ValidatedFields(values))
}

/// Collects the overwrites of a partial update.
///
/// Only text fields can be overwritten, and only by non-empty strings. Any other value (empty
/// strings, numbers, `null`, anything sent for an integer field) leaves the field as it is.
/// A non-empty string that is still shorter than the field's minimum is rejected rather than
/// ignored, so an update can never store a value the create path would refuse.
pub fn validate_update(payload: &Map<String, Value>, fields: &[FieldSpec]) -> Result<FieldUpdate, ValidationError> {
    let mut values = Vec::new();
    for spec in fields {
        let value = match (spec.kind, payload.get(&spec.name)) {
            (FieldKind::Text, Some(v @ Value::String(s))) if !s.is_empty() => check_value(spec, v)?,
            _ => continue,
        };
        values.push((spec.name.clone(), value));
    }
    Ok(FieldUpdate::new(values))
}

fn check_value(spec: &FieldSpec, value: &Value) -> Result<FieldValue, ValidationError> {
    match (spec.kind, value) {
        (FieldKind::Text, Value::String(s)) => {
            if s.chars().count() < spec.min_length {
                Err(ValidationError::new(
                    spec,
                    ValidationReason::TooShort {
                        min_length: spec.min_length,
                    },
                ))
            } else {
                Ok(FieldValue::Text(s.clone()))
            }
        }
        (FieldKind::Integer, Value::Number(n)) => n
            .as_i64()
            .map(FieldValue::Integer)
            .ok_or_else(|| ValidationError::new(spec, ValidationReason::WrongType { expected: spec.kind })),
        (kind, _) => Err(ValidationError::new(spec, ValidationReason::WrongType { expected: kind })),
    }
}
