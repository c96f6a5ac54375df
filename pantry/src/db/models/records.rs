//! Database models for schema-driven records.

use crate::schema::{FieldKind, ResourceSchema};
use crate::types::RecordId;
use crate::validation::ValidatedFields;
use serde::ser::{Serialize, SerializeMap, Serializer};
use sqlx::{Row, sqlite::SqliteRow};

/// A single stored value.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Integer(_) => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Integer(i) => write!(f, "{i}"),
        }
    }
}

/// The field values of a record, in schema order, without an ID.
///
/// Optional fields that were never supplied are simply absent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Entity {
    values: Vec<(String, FieldValue)>,
}

impl Entity {
    pub fn new(fields: ValidatedFields) -> Self {
        Self {
            values: fields.into_values(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.iter().find(|(name, _)| name == field).map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns a copy of this entity with the overwrites from `update` applied.
    ///
    /// Schema order is preserved: a previously absent optional field is inserted at its
    /// schema position.
    pub fn apply_update(&self, update: &FieldUpdate, schema: &ResourceSchema) -> Entity {
        let values = schema
            .fields
            .iter()
            .filter_map(|spec| {
                update
                    .get(&spec.name)
                    .or_else(|| self.get(&spec.name))
                    .map(|value| (spec.name.clone(), value.clone()))
            })
            .collect();
        Entity { values }
    }

    /// Reads the schema's columns from a row. NULL columns are left out.
    pub(crate) fn from_row(row: &SqliteRow, schema: &ResourceSchema) -> Result<Self, sqlx::Error> {
        let mut values = Vec::with_capacity(schema.fields.len());
        for spec in &schema.fields {
            let value = match spec.kind {
                FieldKind::Text => row.try_get::<Option<String>, _>(spec.name.as_str())?.map(FieldValue::Text),
                FieldKind::Integer => row.try_get::<Option<i64>, _>(spec.name.as_str())?.map(FieldValue::Integer),
            };
            if let Some(value) = value {
                values.push((spec.name.clone(), value));
            }
        }
        Ok(Entity { values })
    }
}

/// The overwrites of a partial update. Built by [`crate::validation::validate_update`], so every
/// value in it already satisfies the schema.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldUpdate {
    values: Vec<(String, FieldValue)>,
}

impl FieldUpdate {
    pub(crate) fn new(values: Vec<(String, FieldValue)>) -> Self {
        Self { values }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.iter().find(|(name, _)| name == field).map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A persisted record.
///
/// Serializes as a flat JSON object: `id` first, then the fields in schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: RecordId,
    pub entity: Entity,
}

impl Record {
    pub(crate) fn from_row(row: &SqliteRow, schema: &ResourceSchema) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            entity: Entity::from_row(row, schema)?,
        })
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.entity.get(field)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entity.len() + 1))?;
        map.serialize_entry("id", &self.id)?;
        for (name, value) in self.entity.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
