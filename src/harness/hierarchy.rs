use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::HarnessError;
use crate::model::{Asset, AssetType, Guid};

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryNode {
    pub guid: Guid,
    pub name: String,
    pub parent: Option<Guid>,
    /// Sorted by name, then guid
    pub children: Vec<Guid>,
    /// Zero for roots
    pub depth: usize,
}

/// Navigable category tree built from flat parent references
#[derive(Debug, Clone)]
pub struct CategoryHierarchy {
    nodes: HashMap<Guid, CategoryNode>,
    roots: Vec<Guid>,
}

impl CategoryHierarchy {
    /// Build from `(guid, name, parent)` triples
    pub fn new<I>(entries: I) -> Result<Self, HarnessError>
    where
        I: IntoIterator<Item = (Guid, String, Option<Guid>)>,
    {
        let mut nodes: HashMap<Guid, CategoryNode> = entries
            .into_iter()
            .map(|(guid, name, parent)| {
                (
                    guid.clone(),
                    CategoryNode {
                        guid,
                        name,
                        parent,
                        children: Vec::new(),
                        depth: 0,
                    },
                )
            })
            .collect();

        let mut roots = Vec::new();
        let mut links: Vec<(Guid, Guid)> = Vec::new();
        for node in nodes.values() {
            match &node.parent {
                None => roots.push(node.guid.clone()),
                Some(parent) if !nodes.contains_key(parent) => {
                    return Err(HarnessError::UnknownParent {
                        guid: node.guid.clone(),
                        parent: parent.clone(),
                    })
                }
                Some(parent) => links.push((parent.clone(), node.guid.clone())),
            }
        }

        for (parent, child) in links {
            if let Some(node) = nodes.get_mut(&parent) {
                node.children.push(child);
            }
        }

        let sort_key = |nodes: &HashMap<Guid, CategoryNode>, guid: &Guid| {
            nodes
                .get(guid)
                .map(|n| (n.name.clone(), n.guid.clone()))
                .unwrap_or_default()
        };
        roots.sort_by_key(|guid| sort_key(&nodes, guid));
        let guids: Vec<Guid> = nodes.keys().cloned().collect();
        for guid in guids {
            let mut children = nodes
                .get(&guid)
                .map(|n| n.children.clone())
                .unwrap_or_default();
            children.sort_by_key(|child| sort_key(&nodes, child));
            if let Some(node) = nodes.get_mut(&guid) {
                node.children = children;
            }
        }

        let mut hierarchy = Self { nodes, roots };
        hierarchy.assign_depths()?;
        Ok(hierarchy)
    }

    /// Build from glossary category assets; other asset types are ignored
    pub fn from_assets(assets: &[Asset]) -> Result<Self, HarnessError> {
        Self::new(
            assets
                .iter()
                .filter(|asset| asset.asset_type() == AssetType::GlossaryCategory)
                .map(|asset| {
                    (
                        asset.guid.clone(),
                        asset.name.clone(),
                        asset.parent_category().cloned(),
                    )
                }),
        )
    }

    /// Walk from the roots recording depth; fails on revisits and unreachable nodes
    fn assign_depths(&mut self) -> Result<(), HarnessError> {
        let mut visited: HashSet<Guid> = HashSet::new();
        let mut queue: VecDeque<(Guid, usize)> =
            self.roots.iter().map(|guid| (guid.clone(), 0)).collect();

        while let Some((guid, depth)) = queue.pop_front() {
            if !visited.insert(guid.clone()) {
                return Err(HarnessError::HierarchyCycle { guid });
            }
            let Some(node) = self.nodes.get_mut(&guid) else {
                continue;
            };
            node.depth = depth;
            for child in &node.children {
                queue.push_back((child.clone(), depth + 1));
            }
        }

        if let Some(unreached) = self
            .nodes
            .keys()
            .filter(|guid| !visited.contains(*guid))
            .min()
        {
            return Err(HarnessError::HierarchyCycle {
                guid: unreached.clone(),
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, guid: &Guid) -> Option<&CategoryNode> {
        self.nodes.get(guid)
    }

    pub fn roots(&self) -> Vec<&CategoryNode> {
        self.roots.iter().filter_map(|g| self.nodes.get(g)).collect()
    }

    pub fn children_of(&self, guid: &Guid) -> Vec<&CategoryNode> {
        self.nodes
            .get(guid)
            .map(|node| {
                node.children
                    .iter()
                    .filter_map(|g| self.nodes.get(g))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Pre-order: every node before its descendants, siblings in sorted order
    pub fn depth_first(&self) -> Vec<&CategoryNode> {
        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<&Guid> = self.roots.iter().rev().collect();

        while let Some(guid) = stack.pop() {
            let Some(node) = self.nodes.get(guid) else {
                continue;
            };
            ordered.push(node);
            stack.extend(node.children.iter().rev());
        }
        ordered
    }

    /// Level order: all nodes at depth d before any at depth d + 1
    pub fn breadth_first(&self) -> Vec<&CategoryNode> {
        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut queue: VecDeque<&Guid> = self.roots.iter().collect();

        while let Some(guid) = queue.pop_front() {
            let Some(node) = self.nodes.get(guid) else {
                continue;
            };
            ordered.push(node);
            queue.extend(node.children.iter());
        }
        ordered
    }

    pub fn levels(&self) -> Vec<Vec<&CategoryNode>> {
        let mut levels: Vec<Vec<&CategoryNode>> = Vec::new();
        for node in self.breadth_first() {
            if levels.len() <= node.depth {
                levels.resize_with(node.depth + 1, Vec::new);
            }
            levels[node.depth].push(node);
        }
        levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(guid: &str, name: &str, parent: Option<&str>) -> (Guid, String, Option<Guid>) {
        (guid.to_string(), name.to_string(), parent.map(|p| p.to_string()))
    }

    /// 2 roots x 2 mids x 2 leaves
    fn two_by_two_by_two() -> Vec<(Guid, String, Option<Guid>)> {
        let mut entries = Vec::new();
        for top in 1..=2 {
            let top_guid = format!("t{}", top);
            entries.push(entry(&top_guid, &format!("top{}", top), None));
            for mid in 1..=2 {
                let mid_guid = format!("{}m{}", top_guid, mid);
                entries.push(entry(&mid_guid, &format!("mid{}", mid), Some(&top_guid)));
                for leaf in 1..=2 {
                    let leaf_guid = format!("{}l{}", mid_guid, leaf);
                    entries.push(entry(&leaf_guid, &format!("leaf{}", leaf), Some(&mid_guid)));
                }
            }
        }
        entries
    }

    fn kinds(nodes: &[&CategoryNode]) -> Vec<String> {
        nodes
            .iter()
            .map(|n| n.name.trim_end_matches(char::is_numeric).to_string())
            .collect()
    }

    #[test]
    fn test_depth_first_visits_parents_before_children() {
        let hierarchy = CategoryHierarchy::new(two_by_two_by_two()).unwrap();
        let order = hierarchy.depth_first();

        assert_eq!(order.len(), 14);
        assert_eq!(
            kinds(&order[..7]),
            vec!["top", "mid", "leaf", "leaf", "mid", "leaf", "leaf"]
        );
        assert_eq!(order[7].guid, "t2");
        let unique: HashSet<&Guid> = order.iter().map(|n| &n.guid).collect();
        assert_eq!(unique.len(), 14);
    }

    #[test]
    fn test_breadth_first_orders_by_level() {
        let hierarchy = CategoryHierarchy::new(two_by_two_by_two()).unwrap();
        let order = hierarchy.breadth_first();

        let depths: Vec<usize> = order.iter().map(|n| n.depth).collect();
        assert_eq!(depths, vec![0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2]);

        let levels = hierarchy.levels();
        assert_eq!(
            levels.iter().map(|l| l.len()).collect::<Vec<_>>(),
            vec![2, 4, 8]
        );
        assert_eq!(hierarchy.roots().len(), 2);
        assert_eq!(hierarchy.children_of(&"t1".to_string()).len(), 2);
    }

    #[test]
    fn test_unknown_parent_is_rejected() {
        let error =
            CategoryHierarchy::new(vec![entry("a", "a", Some("missing"))]).unwrap_err();
        assert!(matches!(error, HarnessError::UnknownParent { .. }));
    }

    #[test]
    fn test_cycle_is_detected() {
        let entries = vec![
            entry("root", "root", None),
            entry("a", "a", Some("b")),
            entry("b", "b", Some("a")),
        ];
        let error = CategoryHierarchy::new(entries).unwrap_err();
        assert!(matches!(error, HarnessError::HierarchyCycle { guid } if guid == "a"));
    }
}
