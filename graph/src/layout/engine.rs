use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::core::{GraphError, GraphStore};
use crate::geom::{Position, Rect, Size};

/// Spacing and sizing constants for the layered layout.
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// Horizontal gap between siblings within a group
    pub h_spacing: f64,
    /// Vertical offset from a parent to its children
    pub v_spacing: f64,
    /// Bounding size for nodes without an override
    pub node_size: Size,
    /// Per-node bounding size overrides
    pub sizes: HashMap<String, Size>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            h_spacing: 30.0,
            v_spacing: 120.0,
            node_size: Size::new(60.0, 60.0),
            sizes: HashMap::new(),
        }
    }
}

/// Places nodes level by level below the designated root.
///
/// Each node's level is its edge distance from the root. Siblings that
/// share a direct parent are laid out left to right and the group is
/// centered under the parent. The strategy assumes tree-shaped
/// ancestry: a node with more than one direct parent fails fast with
/// `MultipleParents` instead of producing an inconsistent placement, so
/// true merge topology is explicitly unsupported here.
pub struct LayoutEngine {
    config: LayoutConfig,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    fn size_of(&self, id: &str) -> Size {
        self.config
            .sizes
            .get(id)
            .copied()
            .unwrap_or(self.config.node_size)
    }

    /// Edge distance from `root` for every node reachable from it.
    pub fn levels(
        &self,
        store: &GraphStore,
        root: &str,
    ) -> Result<HashMap<String, usize>, GraphError> {
        if !store.contains(root) {
            return Err(GraphError::NodeNotFound(root.to_string()));
        }
        let mut levels: HashMap<String, usize> = HashMap::new();
        levels.insert(root.to_string(), 0);
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(root.to_string());
        while let Some(curr) = queue.pop_front() {
            let next_level = levels.get(&curr).copied().unwrap_or(0) + 1;
            for child in store.downstream(&curr)? {
                if !levels.contains_key(&child) {
                    levels.insert(child.clone(), next_level);
                    queue.push_back(child);
                }
            }
        }
        Ok(levels)
    }

    /// Compute a position for every node reachable from `root`.
    ///
    /// Unreachable nodes are not placed. The returned map is complete
    /// for the reachable set even when some level ends up empty.
    pub fn arrange(
        &self,
        store: &GraphStore,
        root: &str,
    ) -> Result<HashMap<String, Position>, GraphError> {
        let levels = self.levels(store, root)?;
        let parent_of = self.canonical_parents(store, root, &levels)?;

        let mut positions: HashMap<String, Position> = HashMap::new();
        positions.insert(root.to_string(), Position::default());

        let max_level = levels.values().copied().max().unwrap_or(0);
        for level in 1..=max_level {
            let level_nodes: Vec<&str> = store
                .node_ids()
                .filter(|id| levels.get(*id) == Some(&level))
                .collect();
            let groups = group_by_parent(&level_nodes, &parent_of);

            for (parent, members) in &groups {
                self.place_group(parent, members, &mut positions);
            }

            // Deeper placement may have shifted a parent's row; keep
            // every parent one vertical step below its own parent.
            for (parent, members) in &groups {
                self.realign_group(parent, members, &parent_of, &mut positions);
            }

            debug!(level, groups = groups.len(), "arranged level");
        }

        Ok(positions)
    }

    /// The single direct parent of every reachable non-root node.
    /// Fails fast when ancestry is not tree-shaped.
    fn canonical_parents(
        &self,
        store: &GraphStore,
        root: &str,
        levels: &HashMap<String, usize>,
    ) -> Result<HashMap<String, String>, GraphError> {
        let mut parent_of: HashMap<String, String> = HashMap::new();
        for id in levels.keys() {
            if id == root {
                continue;
            }
            let ups = store.upstream(id)?;
            if ups.len() > 1 {
                return Err(GraphError::MultipleParents(id.clone()));
            }
            if let Some(parent) = ups.into_iter().next() {
                parent_of.insert(id.clone(), parent);
            }
        }
        Ok(parent_of)
    }

    /// Lay the group out left to right from the first member's current
    /// x, then translate it so its combined bounding box is centered on
    /// the parent's center and sits one vertical step below the parent.
    fn place_group(
        &self,
        parent: &str,
        members: &[&str],
        positions: &mut HashMap<String, Position>,
    ) {
        let parent_pos = match positions.get(parent) {
            Some(p) => *p,
            None => return,
        };
        let parent_size = self.size_of(parent);

        let first = match members.first() {
            Some(first) => *first,
            None => return,
        };
        let mut x = positions.get(first).map_or(0.0, |p| p.x);
        let y = parent_pos.y + self.config.v_spacing;

        let mut bounds: Option<Rect> = None;
        for id in members {
            let size = self.size_of(id);
            let rect = Rect::new(x, y, size.width, size.height);
            positions.insert((*id).to_string(), Position::new(x, y));
            bounds = Some(match bounds {
                Some(b) => b.union(&rect),
                None => rect,
            });
            x += size.width + self.config.h_spacing;
        }

        if let Some(b) = bounds {
            let parent_center = parent_pos.x + parent_size.width / 2.0;
            let dx = parent_center - (b.x + b.width / 2.0);
            if dx != 0.0 {
                for id in members {
                    if let Some(p) = positions.get_mut(*id) {
                        p.x += dx;
                    }
                }
            }
        }
    }

    /// Propagate vertical drift up the ancestor chain: if the group's
    /// parent no longer sits one step below its own parent, shift the
    /// parent and the whole group together, preserving their relative
    /// arrangement.
    fn realign_group(
        &self,
        parent: &str,
        members: &[&str],
        parent_of: &HashMap<String, String>,
        positions: &mut HashMap<String, Position>,
    ) {
        let grandparent = match parent_of.get(parent) {
            Some(g) => g,
            None => return,
        };
        let grand_y = match positions.get(grandparent.as_str()) {
            Some(p) => p.y,
            None => return,
        };
        let parent_y = match positions.get(parent) {
            Some(p) => p.y,
            None => return,
        };
        let dy = grand_y + self.config.v_spacing - parent_y;
        if dy == 0.0 {
            return;
        }
        if let Some(p) = positions.get_mut(parent) {
            p.y += dy;
        }
        for id in members {
            if let Some(p) = positions.get_mut(*id) {
                p.y += dy;
            }
        }
    }
}

/// Partition same-level nodes by their canonical parent, preserving
/// first-seen parent order and member insertion order.
fn group_by_parent<'a>(
    level_nodes: &[&'a str],
    parent_of: &'a HashMap<String, String>,
) -> Vec<(&'a str, Vec<&'a str>)> {
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for id in level_nodes {
        let parent = match parent_of.get(*id) {
            Some(p) => p.as_str(),
            None => continue,
        };
        match groups.iter_mut().find(|(p, _)| *p == parent) {
            Some((_, members)) => members.push(id),
            None => groups.push((parent, vec![id])),
        }
    }
    groups
}
