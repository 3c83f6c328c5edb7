use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::model::AssetType;

/// Addresses an asset by type and qualified name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    pub type_name: AssetType,
    pub qualified_name: String,
}

impl AssetRef {
    pub fn new(type_name: AssetType, qualified_name: &str) -> Self {
        Self {
            type_name,
            qualified_name: qualified_name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTagsRequest {
    #[serde(flatten)]
    pub asset: AssetRef,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveTagRequest {
    #[serde(flatten)]
    pub asset: AssetRef,
    pub tag: String,
}

/// Custom-metadata values keyed by attribute display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomMetadataValues {
    pub values: BTreeMap<String, Value>,
    /// Replace the whole set instead of merging
    #[serde(default)]
    pub replace: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QualifiedNameQuery {
    pub qualified_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteQuery {
    pub purge: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_request_flattens_asset_ref() {
        let request = AddTagsRequest {
            asset: AssetRef::new(AssetType::Glossary, "abc"),
            tags: vec!["PII".to_string()],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["typeName"], "AtlasGlossary");
        assert_eq!(json["qualifiedName"], "abc");
        assert_eq!(json["tags"][0], "PII");
    }
}
