//! Resource schemas.
//!
//! A [`ResourceSchema`] describes one persisted resource: its route/table name, the ordered list
//! of fields with their constraints, an optional natural key, and which optional endpoints the
//! resource exposes. Schemas are plain configuration data; the same generic validator,
//! repository and handlers serve every resource.
//!
//! ```yaml
//! resources:
//!   - name: scores
//!     fields:
//!       - name: name
//!       - name: score
//!         min_length: 1
//!     unique_key: name
//!     allow_delete: true
//!     authenticate:
//!       key_field: name
//!       secret_field: score
//! ```

use serde::{Deserialize, Serialize};

/// Storage and JSON type of a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// JSON string, stored as `TEXT`
    #[default]
    Text,
    /// JSON integer, stored as `INTEGER`
    Integer,
}

impl FieldKind {
    pub fn sql_type(self) -> &'static str {
        match self {
            FieldKind::Text => "TEXT",
            FieldKind::Integer => "INTEGER",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            FieldKind::Text => "a string",
            FieldKind::Integer => "an integer",
        }
    }
}

/// Constraints for a single field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub kind: FieldKind,
    /// Minimum length in characters. Only applies to text fields.
    #[serde(default = "FieldSpec::default_min_length")]
    pub min_length: usize,
    #[serde(default = "FieldSpec::default_required")]
    pub required: bool,
}

impl FieldSpec {
    fn default_min_length() -> usize {
        2
    }

    fn default_required() -> bool {
        true
    }

    /// A required text field with the given minimum length.
    pub fn text(name: &str, min_length: usize) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Text,
            min_length,
            required: true,
        }
    }

    /// An optional integer field.
    pub fn integer(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Integer,
            min_length: 0,
            required: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Lookup-and-compare settings for the `authenticate` endpoint.
///
/// The record is looked up by `key_field`, which must be the resource's natural key, and the
/// request is accepted when `secret_field` matches the stored value exactly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthenticateSpec {
    pub key_field: String,
    pub secret_field: String,
}

/// Full description of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSchema {
    /// Route segment and table name, e.g. `recipes`
    pub name: String,
    /// Fields in serialization order
    pub fields: Vec<FieldSpec>,
    /// Field declared unique; duplicates are rejected on create and update
    #[serde(default)]
    pub unique_key: Option<String>,
    /// Exposes `DELETE /delete` and `DELETE /{id}`
    #[serde(default)]
    pub allow_delete: bool,
    #[serde(default)]
    pub authenticate: Option<AuthenticateSpec>,
}

impl ResourceSchema {
    pub fn new(name: &str, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: name.to_string(),
            fields,
            unique_key: None,
            allow_delete: false,
            authenticate: None,
        }
    }

    pub fn with_unique_key(mut self, field: &str) -> Self {
        self.unique_key = Some(field.to_string());
        self
    }

    pub fn with_delete(mut self) -> Self {
        self.allow_delete = true;
        self
    }

    pub fn with_authenticate(mut self, key_field: &str, secret_field: &str) -> Self {
        self.authenticate = Some(AuthenticateSpec {
            key_field: key_field.to_string(),
            secret_field: secret_field.to_string(),
        });
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_unique(&self, field: &str) -> bool {
        self.unique_key.as_deref() == Some(field)
    }

    /// Checks that the schema is internally consistent and safe to turn into SQL.
    pub fn check(&self) -> Result<(), String> {
        if !is_identifier(&self.name) {
            return Err(format!("resource name '{}' must be a lowercase identifier", self.name));
        }
        if self.fields.is_empty() {
            return Err(format!("resource '{}' has no fields", self.name));
        }
        if !self.fields.iter().any(|f| f.required) {
            return Err(format!("resource '{}' needs at least one required field", self.name));
        }
        for (i, field) in self.fields.iter().enumerate() {
            if !is_identifier(&field.name) {
                return Err(format!("field name '{}' in '{}' must be a lowercase identifier", field.name, self.name));
            }
            if field.name == "id" {
                return Err(format!("field name 'id' in '{}' is reserved", self.name));
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(format!("field '{}' is declared twice in '{}'", field.name, self.name));
            }
        }
        if let Some(key) = &self.unique_key
            && self.field(key).is_none()
        {
            return Err(format!("unique_key '{key}' is not a field of '{}'", self.name));
        }
        if let Some(auth) = &self.authenticate {
            if !self.is_unique(&auth.key_field) {
                return Err(format!(
                    "authenticate.key_field '{}' must be the unique_key of '{}'",
                    auth.key_field, self.name
                ));
            }
            if auth.secret_field == auth.key_field || self.field(&auth.secret_field).is_none() {
                return Err(format!(
                    "authenticate.secret_field '{}' must be another field of '{}'",
                    auth.secret_field, self.name
                ));
            }
        }
        Ok(())
    }
}

/// Lowercase ASCII letters, digits and underscores, not starting with a digit.
fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    s.len() <= 63 && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Double-quote an identifier for use in SQL. Identifiers are checked by
/// [`ResourceSchema::check`] before any SQL is built from them.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// The resources served when the configuration does not list its own.
pub fn builtin_resources() -> Vec<ResourceSchema> {
    vec![
        ResourceSchema::new(
            "recipes",
            vec![
                FieldSpec::text("name", 2),
                FieldSpec::text("link", 2),
                FieldSpec::text("type", 2),
                FieldSpec::text("cuisine", 2).optional(),
                FieldSpec::integer("calories"),
            ],
        ),
        ResourceSchema::new("fridges", vec![FieldSpec::text("name", 2), FieldSpec::text("link", 2)]),
        ResourceSchema::new(
            "nutritions",
            vec![
                FieldSpec::text("name", 2),
                FieldSpec::text("calories", 2),
                FieldSpec::text("fat", 2),
                FieldSpec::text("carbs", 2),
            ],
        ),
        ResourceSchema::new("scores", vec![FieldSpec::text("name", 2), FieldSpec::text("score", 1)])
            .with_unique_key("name")
            .with_delete()
            .with_authenticate("name", "score"),
    ]
}
