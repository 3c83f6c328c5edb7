use std::collections::{HashMap, HashSet, VecDeque};

use crate::model::{Asset, AssetDetail, Guid, LineageAsset, LineageDirection, LineageResponse};

/// Breadth-first lineage over process assets. Each hop (asset → process → asset) adds one
/// to the depth.
pub struct LineageWalker<'a> {
    assets: &'a HashMap<Guid, Asset>,
}

impl<'a> LineageWalker<'a> {
    pub fn new(assets: &'a HashMap<Guid, Asset>) -> Self {
        Self { assets }
    }

    pub fn walk(&self, base_guid: &Guid, direction: LineageDirection, max_depth: usize) -> LineageResponse {
        let mut assets = Vec::new();
        match direction {
            LineageDirection::Both => {
                assets.extend(self.walk_one(base_guid, LineageDirection::Upstream, max_depth));
                assets.extend(self.walk_one(base_guid, LineageDirection::Downstream, max_depth));
            }
            single => assets.extend(self.walk_one(base_guid, single, max_depth)),
        }
        LineageResponse {
            base_guid: base_guid.clone(),
            assets,
        }
    }

    fn walk_one(
        &self,
        base_guid: &Guid,
        direction: LineageDirection,
        max_depth: usize,
    ) -> Vec<LineageAsset> {
        let mut visited: HashSet<&Guid> = HashSet::new();
        let mut queue: VecDeque<(&Guid, usize)> = VecDeque::new();
        let mut found = Vec::new();

        visited.insert(base_guid);
        queue.push_back((base_guid, 0));

        while let Some((guid, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for next in self.neighbours(guid, direction) {
                if !visited.insert(next) {
                    continue;
                }
                if let Some(asset) = self.assets.get(next) {
                    found.push(LineageAsset {
                        asset: asset.clone(),
                        depth: depth + 1,
                        direction,
                    });
                    queue.push_back((next, depth + 1));
                }
            }
        }

        found
    }

    fn neighbours(&self, guid: &Guid, direction: LineageDirection) -> Vec<&'a Guid> {
        let Some(asset) = self.assets.get(guid) else {
            return Vec::new();
        };

        if let AssetDetail::Process {
            inputs, outputs, ..
        } = &asset.detail
        {
            let next = match direction {
                LineageDirection::Upstream => inputs,
                _ => outputs,
            };
            return next
                .iter()
                .filter(|g| self.is_active(g))
                .collect();
        }

        let mut processes: Vec<&'a Asset> = self
            .assets
            .values()
            .filter(|candidate| candidate.is_active())
            .filter(|candidate| match &candidate.detail {
                AssetDetail::Process {
                    inputs, outputs, ..
                } => match direction {
                    LineageDirection::Upstream => outputs.contains(guid),
                    _ => inputs.contains(guid),
                },
                _ => false,
            })
            .collect();
        processes.sort_by(|a, b| a.qualified_name.cmp(&b.qualified_name));
        processes.into_iter().map(|p| &p.guid).collect()
    }

    fn is_active(&self, guid: &Guid) -> bool {
        self.assets.get(guid).map(|a| a.is_active()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConnectorType;

    fn with_guid(mut asset: Asset, guid: &str) -> Asset {
        asset.guid = guid.to_string();
        asset
    }

    fn chain() -> HashMap<Guid, Asset> {
        let connection = Asset::connection("c", ConnectorType::Postgres, vec![]);
        let qn = connection.qualified_name.clone();
        let assets = vec![
            with_guid(Asset::table("a", &format!("{}/db/s", qn)), "a"),
            with_guid(Asset::table("b", &format!("{}/db/s", qn)), "b"),
            with_guid(Asset::table("c", &format!("{}/db/s", qn)), "c"),
            with_guid(
                Asset::process("p1", &qn, vec!["a".to_string()], vec!["b".to_string()]),
                "p1",
            ),
            with_guid(
                Asset::process("p2", &qn, vec!["b".to_string()], vec!["c".to_string()]),
                "p2",
            ),
        ];
        assets.into_iter().map(|a| (a.guid.clone(), a)).collect()
    }

    #[test]
    fn test_downstream_depths_count_process_hops() {
        let assets = chain();
        let response = LineageWalker::new(&assets).walk(
            &"a".to_string(),
            LineageDirection::Downstream,
            100,
        );

        let order: Vec<(&str, usize)> = response
            .assets
            .iter()
            .map(|a| (a.asset.guid.as_str(), a.depth))
            .collect();
        assert_eq!(order, vec![("p1", 1), ("b", 2), ("p2", 3), ("c", 4)]);
    }

    #[test]
    fn test_upstream_respects_max_depth() {
        let assets = chain();
        let response =
            LineageWalker::new(&assets).walk(&"c".to_string(), LineageDirection::Upstream, 2);
        assert_eq!(response.depth_of(&"p2".to_string()), Some(1));
        assert_eq!(response.depth_of(&"b".to_string()), Some(2));
        assert_eq!(response.depth_of(&"a".to_string()), None);
    }

    #[test]
    fn test_both_directions_from_middle() {
        let assets = chain();
        let response =
            LineageWalker::new(&assets).walk(&"b".to_string(), LineageDirection::Both, 100);
        assert_eq!(response.in_direction(LineageDirection::Upstream).len(), 2);
        assert_eq!(response.in_direction(LineageDirection::Downstream).len(), 2);
    }
}
