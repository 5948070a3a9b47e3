//! Jira Assets object models

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Reference to one asset: object ID plus object type code.
///
/// Both parts are positive; a ref cannot be built from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRef {
    id: u64,
    object_type: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidAssetRef {
    #[error("asset id must be a positive integer, got '{0}'")]
    Id(String),
    #[error("object type must be a positive integer, got '{0}'")]
    ObjectType(String),
}

impl AssetRef {
    pub fn new(id: u64, object_type: u64) -> Result<Self, InvalidAssetRef> {
        if id == 0 {
            return Err(InvalidAssetRef::Id(id.to_string()));
        }
        if object_type == 0 {
            return Err(InvalidAssetRef::ObjectType(object_type.to_string()));
        }
        Ok(Self { id, object_type })
    }

    /// Parse from the string IDs the API returns
    pub fn parse(id: &str, object_type: &str) -> Result<Self, InvalidAssetRef> {
        let parsed_id = id
            .trim()
            .parse::<u64>()
            .map_err(|_| InvalidAssetRef::Id(id.to_string()))?;
        let parsed_type = object_type
            .trim()
            .parse::<u64>()
            .map_err(|_| InvalidAssetRef::ObjectType(object_type.to_string()))?;
        Self::new(parsed_id, parsed_type)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn object_type(&self) -> u64 {
        self.object_type
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} (type {})", self.id, self.object_type)
    }
}

/// An asset object as returned by `GET /object/{id}` and AQL searches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetObject {
    pub id: String,
    #[serde(default)]
    pub object_key: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    pub object_type: ObjectTypeRef,
    #[serde(default)]
    pub attributes: Vec<ObjectAttribute>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTypeRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectAttribute {
    pub object_type_attribute_id: String,
    #[serde(default)]
    pub object_attribute_values: Vec<ObjectAttributeValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectAttributeValue {
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub display_value: Option<String>,
}

impl AssetObject {
    pub fn asset_ref(&self) -> Result<AssetRef, InvalidAssetRef> {
        AssetRef::parse(&self.id, &self.object_type.id)
    }

    pub fn object_type_name(&self) -> Option<&str> {
        self.object_type.name.as_deref()
    }

    /// First value of an attribute rendered as text, if it has one
    pub fn attribute_text(&self, attribute_id: &str) -> Option<String> {
        let attribute = self
            .attributes
            .iter()
            .find(|a| a.object_type_attribute_id == attribute_id)?;
        let first = attribute.object_attribute_values.first()?;

        match &first.value {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => first.display_value.clone().filter(|s| !s.is_empty()),
        }
    }

    /// Short label for listings: key if present, otherwise the ID
    pub fn display_key(&self) -> &str {
        self.object_key.as_deref().unwrap_or(&self.id)
    }
}

/// One page of an AQL search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AqlPage {
    #[serde(default)]
    pub start_at: usize,
    #[serde(default)]
    pub max_results: usize,
    #[serde(default)]
    pub total: Option<usize>,
    #[serde(default)]
    pub is_last: Option<bool>,
    #[serde(default)]
    pub values: Vec<AssetObject>,
}

impl AqlPage {
    /// Whether more pages follow this one
    pub fn has_more(&self) -> bool {
        if let Some(is_last) = self.is_last {
            return !is_last;
        }
        match self.total {
            Some(total) => self.start_at + self.values.len() < total,
            None => !self.values.is_empty() && self.values.len() >= self.max_results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_object() -> AssetObject {
        serde_json::from_value(json!({
            "id": "101",
            "objectKey": "ITAM-101",
            "label": "MacBook Pro 14",
            "objectType": {"id": "442", "name": "Computers"},
            "attributes": [
                {
                    "objectTypeAttributeId": "900",
                    "objectAttributeValues": [{"value": "1200", "displayValue": "1200"}]
                },
                {
                    "objectTypeAttributeId": "901",
                    "objectAttributeValues": [{"displayValue": "2024-01-15"}]
                },
                {
                    "objectTypeAttributeId": "902",
                    "objectAttributeValues": []
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_asset_ref_rejects_zero() {
        assert!(AssetRef::new(0, 442).is_err());
        assert!(AssetRef::new(101, 0).is_err());
        assert!(AssetRef::new(101, 442).is_ok());
    }

    #[test]
    fn test_asset_ref_parse() {
        let asset = AssetRef::parse("101", " 442").unwrap();
        assert_eq!(asset.id(), 101);
        assert_eq!(asset.object_type(), 442);
        assert_eq!(
            AssetRef::parse("ITAM-1", "442"),
            Err(InvalidAssetRef::Id("ITAM-1".to_string()))
        );
    }

    #[test]
    fn test_object_deserialization_and_attribute_lookup() {
        let object = sample_object();
        assert_eq!(object.asset_ref().unwrap(), AssetRef::new(101, 442).unwrap());
        assert_eq!(object.object_type_name(), Some("Computers"));
        assert_eq!(object.display_key(), "ITAM-101");
        assert_eq!(object.attribute_text("900").as_deref(), Some("1200"));
        assert_eq!(object.attribute_text("901").as_deref(), Some("2024-01-15"));
        assert_eq!(object.attribute_text("902"), None);
        assert_eq!(object.attribute_text("999"), None);
    }

    #[test]
    fn test_aql_page_has_more() {
        let page: AqlPage = serde_json::from_value(json!({
            "startAt": 0, "maxResults": 1, "total": 2,
            "values": [{"id": "1", "objectType": {"id": "442"}}]
        }))
        .unwrap();
        assert!(page.has_more());

        let last: AqlPage = serde_json::from_value(json!({
            "startAt": 1, "maxResults": 1, "isLast": true,
            "values": [{"id": "2", "objectType": {"id": "442"}}]
        }))
        .unwrap();
        assert!(!last.has_more());
    }
}
