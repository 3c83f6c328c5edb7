use crate::model::{AssetType, Guid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    EntityCreate,
    EntityUpdate,
    EntityDelete,
    EntityRestore,
    EntityPurge,
    ClassificationAdd,
    ClassificationDelete,
    #[serde(rename = "BUSINESS_ATTRIBUTE_UPDATE")]
    CustomMetadataUpdate,
}

impl AuditAction {
    /// Tag bookkeeping that never reflects an entity attribute change
    pub fn is_tag_action(&self) -> bool {
        matches!(
            self,
            AuditAction::ClassificationAdd | AuditAction::ClassificationDelete
        )
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let value = match self {
            AuditAction::EntityCreate => "ENTITY_CREATE",
            AuditAction::EntityUpdate => "ENTITY_UPDATE",
            AuditAction::EntityDelete => "ENTITY_DELETE",
            AuditAction::EntityRestore => "ENTITY_RESTORE",
            AuditAction::EntityPurge => "ENTITY_PURGE",
            AuditAction::ClassificationAdd => "CLASSIFICATION_ADD",
            AuditAction::ClassificationDelete => "CLASSIFICATION_DELETE",
            AuditAction::CustomMetadataUpdate => "BUSINESS_ATTRIBUTE_UPDATE",
        };
        write!(f, "{}", value)
    }
}

/// Snapshot of what an audited change touched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditDetail {
    /// Changed attributes; a cleared attribute is recorded as null
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub custom_metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityAudit {
    pub entity_guid: Guid,
    pub entity_qualified_name: String,
    pub type_name: AssetType,
    pub action: AuditAction,
    pub user: String,
    pub timestamp: DateTime<Utc>,
    /// `<guid>:<sequence>`; sequence is monotonic across the catalog
    pub event_key: String,
    #[serde(default)]
    pub detail: AuditDetail,
}

impl EntityAudit {
    /// An entity update that changed nothing
    pub fn is_noop(&self) -> bool {
        self.action == AuditAction::EntityUpdate
            && self.detail.attributes.is_empty()
            && self.detail.custom_metadata.is_empty()
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.detail.attributes.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSearchRequest {
    pub guid: Guid,
    #[serde(default = "default_audit_size")]
    pub size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<AuditAction>>,
}

fn default_audit_size() -> usize {
    100
}

impl AuditSearchRequest {
    pub fn for_guid(guid: &Guid) -> Self {
        Self {
            guid: guid.clone(),
            size: default_audit_size(),
            actions: None,
        }
    }

    pub fn with_actions(mut self, actions: Vec<AuditAction>) -> Self {
        self.actions = Some(actions);
        self
    }
}

/// Audit entries newest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditSearchResponse {
    pub total_count: usize,
    #[serde(default)]
    pub entries: Vec<EntityAudit>,
}
