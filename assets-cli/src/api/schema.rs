//! Object type attribute schemas
//!
//! Attribute definitions map the names users type on the command line to
//! the attribute IDs the update endpoint expects, and carry the value kind
//! used to validate changes before they are sent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Value kind of an attribute, as far as validation cares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeKind {
    Text,
    Integer,
    Double,
    Boolean,
    Date,
    /// Select attribute with its allowed options
    Select(Vec<String>),
    /// References, users, statuses and anything else passed through as text
    Other(String),
}

impl AttributeKind {
    fn from_default_type(name: &str, options: Option<&str>) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "text" | "textarea" | "url" | "email" | "ipaddress" => AttributeKind::Text,
            "integer" => AttributeKind::Integer,
            "double" => AttributeKind::Double,
            "boolean" => AttributeKind::Boolean,
            "date" => AttributeKind::Date,
            "select" => AttributeKind::Select(
                options
                    .unwrap_or_default()
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect(),
            ),
            _ => AttributeKind::Other(name.to_string()),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            AttributeKind::Text => "text".to_string(),
            AttributeKind::Integer => "integer".to_string(),
            AttributeKind::Double => "decimal number".to_string(),
            AttributeKind::Boolean => "boolean".to_string(),
            AttributeKind::Date => "date (YYYY-MM-DD)".to_string(),
            AttributeKind::Select(options) => format!("one of [{}]", options.join(", ")),
            AttributeKind::Other(name) => name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub id: String,
    pub name: String,
    pub kind: AttributeKind,
    pub editable: bool,
}

impl AttributeDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            editable: true,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }
}

/// An attribute change resolved against a schema: wire ID plus wire value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAttribute {
    pub attribute_id: String,
    pub value: String,
}

/// Attribute definitions for one object type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectTypeSchema {
    pub object_type: u64,
    pub name: Option<String>,
    pub attributes: Vec<AttributeDefinition>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAttributeDefinition {
    id: String,
    name: String,
    #[serde(rename = "type", default)]
    attribute_type: i64,
    #[serde(default)]
    default_type: Option<RawDefaultType>,
    #[serde(default)]
    options: Option<String>,
    #[serde(default = "default_editable")]
    editable: bool,
    #[serde(default)]
    object_type: Option<RawObjectTypeName>,
}

#[derive(Deserialize)]
struct RawDefaultType {
    name: String,
}

#[derive(Deserialize)]
struct RawObjectTypeName {
    #[serde(default)]
    name: Option<String>,
}

fn default_editable() -> bool {
    true
}

impl ObjectTypeSchema {
    pub fn new(object_type: u64, name: Option<String>, attributes: Vec<AttributeDefinition>) -> Self {
        Self {
            object_type,
            name,
            attributes,
        }
    }

    /// Parse the array returned by `GET /objecttype/{id}/attributes`
    pub fn from_api(object_type: u64, payload: Value) -> Result<Self, serde_json::Error> {
        let raw: Vec<RawAttributeDefinition> = serde_json::from_value(payload)?;

        let name = raw
            .iter()
            .find_map(|a| a.object_type.as_ref().and_then(|t| t.name.clone()));

        let attributes = raw
            .into_iter()
            .map(|a| {
                // type 0 is a "default" attribute; the rest are references, users, groups...
                let kind = match (a.attribute_type, &a.default_type) {
                    (0, Some(default_type)) => {
                        AttributeKind::from_default_type(&default_type.name, a.options.as_deref())
                    }
                    (0, None) => AttributeKind::Text,
                    (other, _) => AttributeKind::Other(format!("type {}", other)),
                };
                let definition = AttributeDefinition::new(a.id, a.name, kind);
                if a.editable { definition } else { definition.read_only() }
            })
            .collect();

        Ok(Self {
            object_type,
            name,
            attributes,
        })
    }

    /// Look up by exact name, falling back to a case-insensitive match
    pub fn attribute(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .or_else(|| self.attributes.iter().find(|a| a.name.eq_ignore_ascii_case(name)))
    }
}

/// Schemas keyed by object type code
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<u64, ObjectTypeSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, schema: ObjectTypeSchema) {
        self.schemas.insert(schema.object_type, schema);
    }

    pub fn with(mut self, schema: ObjectTypeSchema) -> Self {
        self.insert(schema);
        self
    }

    pub fn get(&self, object_type: u64) -> Option<&ObjectTypeSchema> {
        self.schemas.get(&object_type)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl FromIterator<ObjectTypeSchema> for SchemaRegistry {
    fn from_iter<I: IntoIterator<Item = ObjectTypeSchema>>(iter: I) -> Self {
        let mut registry = SchemaRegistry::new();
        for schema in iter {
            registry.insert(schema);
        }
        registry
    }
}
