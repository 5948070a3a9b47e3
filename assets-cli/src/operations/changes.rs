//! Typed attribute change sets
//!
//! A change set maps attribute names to new values. Before anything is sent
//! it is resolved against the object type's schema: names become attribute
//! IDs and values are checked against the attribute kind.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::api::schema::{AttributeKind, ObjectTypeSchema, ResolvedAttribute};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
    /// Named option of a select attribute
    Enumerated(String),
}

impl AttributeValue {
    pub fn text(value: impl Into<String>) -> Self {
        AttributeValue::Text(value.into())
    }

    pub fn enumerated(option: impl Into<String>) -> Self {
        AttributeValue::Enumerated(option.into())
    }

    /// Command-line form: `@option` is enumerated, integers are integers,
    /// everything else is text
    pub fn parse_cli(raw: &str) -> Self {
        if let Some(option) = raw.strip_prefix('@') {
            return AttributeValue::Enumerated(option.to_string());
        }
        match raw.trim().parse::<i64>() {
            Ok(i) => AttributeValue::Integer(i),
            Err(_) => AttributeValue::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Text(s) => write!(f, "{}", s),
            AttributeValue::Integer(i) => write!(f, "{}", i),
            AttributeValue::Enumerated(o) => write!(f, "@{}", o),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("change set is empty")]
    EmptyChangeSet,
    #[error("'{0}' is not a NAME=VALUE assignment")]
    MalformedAssignment(String),
    #[error("attribute '{0}' is set more than once")]
    DuplicateAttribute(String),
    #[error("object type {object_type} has no attribute '{attribute}'")]
    UnknownAttribute { attribute: String, object_type: u64 },
    #[error("attribute '{0}' is read-only")]
    ReadOnly(String),
    #[error("attribute '{attribute}' expects {expected}, got '{value}'")]
    InvalidValue {
        attribute: String,
        expected: String,
        value: String,
    },
}

/// Attribute name to new value. Keys are unique; iteration is by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    values: BTreeMap<String, AttributeValue>,
}

impl AttributeChange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.set(name, value);
        self
    }

    /// Set a value, returning the one it replaced
    pub fn set(&mut self, name: impl Into<String>, value: AttributeValue) -> Option<AttributeValue> {
        self.values.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parse one `NAME=VALUE` assignment
    pub fn parse_assignment(raw: &str) -> Result<(String, AttributeValue), ValidationError> {
        let (name, value) = raw
            .split_once('=')
            .ok_or_else(|| ValidationError::MalformedAssignment(raw.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::MalformedAssignment(raw.to_string()));
        }
        Ok((name.to_string(), AttributeValue::parse_cli(value)))
    }

    pub fn from_assignments<I, S>(assignments: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut change = AttributeChange::new();
        for raw in assignments {
            let (name, value) = Self::parse_assignment(raw.as_ref())?;
            if change.set(name.clone(), value).is_some() {
                return Err(ValidationError::DuplicateAttribute(name));
            }
        }
        Ok(change)
    }

    /// Resolve names to attribute IDs and values to their wire form
    pub fn resolve(&self, schema: &ObjectTypeSchema) -> Result<Vec<ResolvedAttribute>, ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyChangeSet);
        }

        self.values
            .iter()
            .map(|(name, value)| {
                let definition = schema
                    .attribute(name)
                    .ok_or_else(|| ValidationError::UnknownAttribute {
                        attribute: name.clone(),
                        object_type: schema.object_type,
                    })?;
                if !definition.editable {
                    return Err(ValidationError::ReadOnly(definition.name.clone()));
                }
                let wire = coerce(&definition.kind, value).ok_or_else(|| {
                    ValidationError::InvalidValue {
                        attribute: definition.name.clone(),
                        expected: definition.kind.describe(),
                        value: value.to_string(),
                    }
                })?;
                Ok(ResolvedAttribute {
                    attribute_id: definition.id.clone(),
                    value: wire,
                })
            })
            .collect()
    }
}

/// Wire value for `value` if it fits `kind`
fn coerce(kind: &AttributeKind, value: &AttributeValue) -> Option<String> {
    use AttributeValue::{Enumerated, Integer, Text};

    match (kind, value) {
        (AttributeKind::Text | AttributeKind::Other(_), Text(s) | Enumerated(s)) => Some(s.clone()),
        (AttributeKind::Text | AttributeKind::Other(_), Integer(i)) => Some(i.to_string()),

        (AttributeKind::Integer | AttributeKind::Double, Integer(i)) => Some(i.to_string()),
        (AttributeKind::Integer, Text(s)) => {
            let trimmed = s.trim();
            trimmed.parse::<i64>().ok().map(|_| trimmed.to_string())
        }
        (AttributeKind::Double, Text(s)) => {
            let trimmed = s.trim();
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(|_| trimmed.to_string())
        }

        (AttributeKind::Boolean, Text(s)) => {
            let lowered = s.trim().to_ascii_lowercase();
            matches!(lowered.as_str(), "true" | "false").then_some(lowered)
        }

        (AttributeKind::Date, Text(s)) => {
            let trimmed = s.trim();
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .map(|_| trimmed.to_string())
        }

        (AttributeKind::Select(options), Text(s) | Enumerated(s)) => {
            options.iter().find(|o| *o == s).cloned()
        }
        (AttributeKind::Select(options), Integer(i)) => {
            let rendered = i.to_string();
            options.iter().find(|o| **o == rendered).cloned()
        }

        _ => None,
    }
}
