use crate::model::{Asset, AssetType, Guid};
use serde::{Deserialize, Serialize};

/// Result of a write: every side-effected asset lands in exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationResponse {
    #[serde(default)]
    pub created: Vec<Asset>,
    #[serde(default)]
    pub updated: Vec<Asset>,
    #[serde(default)]
    pub deleted: Vec<Asset>,
}

impl MutationResponse {
    pub fn created(asset: Asset) -> Self {
        Self {
            created: vec![asset],
            ..Self::default()
        }
    }

    pub fn updated(asset: Asset) -> Self {
        Self {
            updated: vec![asset],
            ..Self::default()
        }
    }

    pub fn deleted(asset: Asset) -> Self {
        Self {
            deleted: vec![asset],
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// (created, updated, deleted) counts
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.created.len(), self.updated.len(), self.deleted.len())
    }

    pub fn created_of(&self, asset_type: AssetType) -> Vec<&Asset> {
        self.created
            .iter()
            .filter(|a| a.asset_type() == asset_type)
            .collect()
    }

    pub fn updated_of(&self, asset_type: AssetType) -> Vec<&Asset> {
        self.updated
            .iter()
            .filter(|a| a.asset_type() == asset_type)
            .collect()
    }

    pub fn deleted_of(&self, asset_type: AssetType) -> Vec<&Asset> {
        self.deleted
            .iter()
            .filter(|a| a.asset_type() == asset_type)
            .collect()
    }

    /// Guids appearing in more than one bucket; always empty for a well-formed response
    pub fn overlapping_guids(&self) -> Vec<Guid> {
        let mut seen = std::collections::HashSet::new();
        let mut overlapping = Vec::new();
        for asset in self
            .created
            .iter()
            .chain(self.updated.iter())
            .chain(self.deleted.iter())
        {
            if !seen.insert(asset.guid.clone()) {
                overlapping.push(asset.guid.clone());
            }
        }
        overlapping
    }
}
