use crate::model::{Asset, Guid};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineageDirection {
    Upstream,
    Downstream,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageRequest {
    pub guid: Guid,
    pub direction: LineageDirection,
    /// Maximum number of hops; processes count as a hop
    #[serde(default = "default_depth")]
    pub depth: usize,
}

fn default_depth() -> usize {
    1_000
}

impl LineageRequest {
    pub fn downstream(guid: &Guid) -> Self {
        Self {
            guid: guid.clone(),
            direction: LineageDirection::Downstream,
            depth: default_depth(),
        }
    }

    pub fn upstream(guid: &Guid) -> Self {
        Self {
            guid: guid.clone(),
            direction: LineageDirection::Upstream,
            depth: default_depth(),
        }
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageAsset {
    pub asset: Asset,
    pub depth: usize,
    /// Upstream or downstream relative to the base asset
    pub direction: LineageDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageResponse {
    pub base_guid: Guid,
    #[serde(default)]
    pub assets: Vec<LineageAsset>,
}

impl LineageResponse {
    pub fn in_direction(&self, direction: LineageDirection) -> Vec<&LineageAsset> {
        self.assets
            .iter()
            .filter(|a| a.direction == direction)
            .collect()
    }

    pub fn depth_of(&self, guid: &Guid) -> Option<usize> {
        self.assets
            .iter()
            .find(|a| &a.asset.guid == guid)
            .map(|a| a.depth)
    }
}
