use crate::model::{Announcement, Asset, AssetDetail, AssetType, Certificate, CertificateStatus, Guid};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single attribute change carried by an updater. `None` payloads clear the attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "attribute", content = "value", rename_all = "camelCase")]
pub enum AttributeChange {
    Description(Option<String>),
    OwnerUsers(Option<Vec<String>>),
    OwnerGroups(Option<Vec<String>>),
    Certificate(Option<Certificate>),
    Announcement(Option<Announcement>),
    SeeAlso(Option<Vec<Guid>>),
    Topics(Option<Vec<Guid>>),
}

impl AttributeChange {
    /// Attribute name as it appears in audit snapshots
    pub fn attribute_name(&self) -> &'static str {
        match self {
            AttributeChange::Description(_) => "description",
            AttributeChange::OwnerUsers(_) => "ownerUsers",
            AttributeChange::OwnerGroups(_) => "ownerGroups",
            AttributeChange::Certificate(_) => "certificate",
            AttributeChange::Announcement(_) => "announcement",
            AttributeChange::SeeAlso(_) => "seeAlso",
            AttributeChange::Topics(_) => "topics",
        }
    }

    fn snapshot_value(&self) -> Value {
        let value = match self {
            AttributeChange::Description(v) => serde_json::to_value(v),
            AttributeChange::OwnerUsers(v)
            | AttributeChange::OwnerGroups(v)
            | AttributeChange::SeeAlso(v)
            | AttributeChange::Topics(v) => serde_json::to_value(v),
            AttributeChange::Certificate(v) => serde_json::to_value(v),
            AttributeChange::Announcement(v) => serde_json::to_value(v),
        };
        value.unwrap_or(Value::Null)
    }

    /// Apply to an asset, returning whether anything changed.
    /// Relationship changes on the wrong asset family are reported as errors.
    pub fn apply(&self, asset: &mut Asset) -> Result<bool, String> {
        fn set<T: PartialEq + Clone>(slot: &mut T, value: T) -> bool {
            if *slot == value {
                false
            } else {
                *slot = value;
                true
            }
        }

        match self {
            AttributeChange::Description(v) => Ok(set(&mut asset.description, v.clone())),
            AttributeChange::OwnerUsers(v) => {
                Ok(set(&mut asset.owner_users, v.clone().unwrap_or_default()))
            }
            AttributeChange::OwnerGroups(v) => {
                Ok(set(&mut asset.owner_groups, v.clone().unwrap_or_default()))
            }
            AttributeChange::Certificate(v) => Ok(set(&mut asset.certificate, v.clone())),
            AttributeChange::Announcement(v) => Ok(set(&mut asset.announcement, v.clone())),
            AttributeChange::SeeAlso(v) => match &mut asset.detail {
                AssetDetail::GlossaryTerm { see_also, .. } => {
                    Ok(set(see_also, v.clone().unwrap_or_default()))
                }
                other => Err(format!("{} has no seeAlso relationship", other.asset_type())),
            },
            AttributeChange::Topics(v) => match &mut asset.detail {
                AssetDetail::KafkaConsumerGroup { topics, .. } => {
                    Ok(set(topics, v.clone().unwrap_or_default()))
                }
                other => Err(format!("{} has no topics relationship", other.asset_type())),
            },
        }
    }

    /// Guids a relationship change will link to
    pub fn linked_guids(&self) -> &[Guid] {
        match self {
            AttributeChange::SeeAlso(Some(guids)) | AttributeChange::Topics(Some(guids)) => guids,
            _ => &[],
        }
    }
}

/// Partial update of an existing asset, addressed by type and qualified name.
/// Only the listed attributes change; everything else is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetUpdater {
    pub type_name: AssetType,
    pub qualified_name: String,
    pub changes: Vec<AttributeChange>,
}

impl AssetUpdater {
    pub fn new(type_name: AssetType, qualified_name: &str) -> Self {
        Self {
            type_name,
            qualified_name: qualified_name.to_string(),
            changes: Vec::new(),
        }
    }

    pub fn for_asset(asset: &Asset) -> Self {
        Self::new(asset.asset_type(), &asset.qualified_name)
    }

    fn with(mut self, change: AttributeChange) -> Self {
        self.changes.push(change);
        self
    }

    pub fn description(self, description: &str) -> Self {
        self.with(AttributeChange::Description(Some(description.to_string())))
    }

    pub fn remove_description(self) -> Self {
        self.with(AttributeChange::Description(None))
    }

    pub fn owner_users(self, users: Vec<String>) -> Self {
        self.with(AttributeChange::OwnerUsers(Some(users)))
    }

    pub fn remove_owner_users(self) -> Self {
        self.with(AttributeChange::OwnerUsers(None))
    }

    pub fn owner_groups(self, groups: Vec<String>) -> Self {
        self.with(AttributeChange::OwnerGroups(Some(groups)))
    }

    pub fn remove_owner_groups(self) -> Self {
        self.with(AttributeChange::OwnerGroups(None))
    }

    pub fn certificate(self, status: CertificateStatus, message: Option<&str>) -> Self {
        self.with(AttributeChange::Certificate(Some(Certificate {
            status,
            message: message.map(|m| m.to_string()),
        })))
    }

    pub fn remove_certificate(self) -> Self {
        self.with(AttributeChange::Certificate(None))
    }

    pub fn announcement(self, announcement: Announcement) -> Self {
        self.with(AttributeChange::Announcement(Some(announcement)))
    }

    pub fn remove_announcement(self) -> Self {
        self.with(AttributeChange::Announcement(None))
    }

    pub fn see_also(self, terms: Vec<Guid>) -> Self {
        self.with(AttributeChange::SeeAlso(Some(terms)))
    }

    pub fn remove_see_also(self) -> Self {
        self.with(AttributeChange::SeeAlso(None))
    }

    pub fn topics(self, topics: Vec<Guid>) -> Self {
        self.with(AttributeChange::Topics(Some(topics)))
    }

    /// Apply every change; returns the audit snapshot of the attributes that actually changed
    pub fn apply(&self, asset: &mut Asset) -> Result<Map<String, Value>, String> {
        let mut snapshot = Map::new();
        for change in &self.changes {
            if change.apply(asset)? {
                snapshot.insert(change.attribute_name().to_string(), change.snapshot_value());
            }
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConnectorType;
    use serde_json::json;

    fn table() -> Asset {
        let connection = Asset::connection("c", ConnectorType::Postgres, vec![]);
        Asset::table("t", &format!("{}/db/sch", connection.qualified_name))
            .with_description("original")
    }

    #[test]
    fn test_merge_keeps_untouched_attributes() {
        let mut asset = table();
        let updater = AssetUpdater::for_asset(&asset).owner_groups(vec!["data".to_string()]);

        let snapshot = updater.apply(&mut asset).unwrap();

        assert_eq!(asset.description.as_deref(), Some("original"));
        assert_eq!(asset.owner_groups, vec!["data".to_string()]);
        assert_eq!(snapshot.get("ownerGroups"), Some(&json!(["data"])));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_clear_records_null_and_noop_records_nothing() {
        let mut asset = table().with_owner_groups(vec!["x".to_string()]);

        let cleared = AssetUpdater::for_asset(&asset)
            .remove_owner_groups()
            .apply(&mut asset)
            .unwrap();
        assert_eq!(cleared.get("ownerGroups"), Some(&Value::Null));
        assert!(asset.owner_groups.is_empty());

        let noop = AssetUpdater::for_asset(&asset)
            .description("original")
            .apply(&mut asset)
            .unwrap();
        assert!(noop.is_empty());
    }

    #[test]
    fn test_relationship_change_rejected_on_wrong_family() {
        let mut asset = table();
        let result = AssetUpdater::for_asset(&asset)
            .see_also(vec!["t2".to_string()])
            .apply(&mut asset);
        assert!(result.is_err());
    }
}
