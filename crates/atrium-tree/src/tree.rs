//! The scene tree arena (§4.3).
//!
//! A `SceneTree` owns every [`Node`], keyed by generational [`NodeId`], plus
//! the parent/child edges between them. It distinguishes one child of the
//! root as the `Workspace`: a part only becomes physics-tracked once its
//! parent chain reaches that node (§4.1), so the tree also maintains that
//! membership set as nodes are spawned and reparented.

use std::collections::{HashMap, HashSet};

use crate::error::TreeError;
use crate::node::{Node, NodeKind};
use crate::node_id::{NodeId, NodeIdAllocator};

pub struct SceneTree {
    allocator: NodeIdAllocator,
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    workspace: NodeId,
    /// Parts whose ancestor chain currently reaches `workspace`.
    physics_tracked: HashSet<NodeId>,
}

impl SceneTree {
    /// Build a fresh tree with the standard root + Workspace service.
    pub fn new() -> Self {
        let mut allocator = NodeIdAllocator::new();
        let mut nodes = HashMap::new();

        let root_id = allocator.allocate();
        nodes.insert(root_id, Node::new(root_id, "game", NodeKind::Folder));

        let workspace_id = allocator.allocate();
        let mut workspace_node = Node::new(workspace_id, "Workspace", NodeKind::Service("Workspace".to_owned()));
        workspace_node.parent = Some(root_id);
        nodes.insert(workspace_id, workspace_node);
        nodes.get_mut(&root_id).unwrap().children.push(workspace_id);

        Self {
            allocator,
            nodes,
            root: root_id,
            workspace: workspace_id,
            physics_tracked: HashSet::new(),
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn workspace_id(&self) -> NodeId {
        self.workspace
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if self.allocator.is_alive(id) {
            self.nodes.get(&id)
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if self.allocator.is_alive(id) {
            self.nodes.get_mut(&id)
        } else {
            None
        }
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        self.allocator.is_alive(id)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_physics_tracked(&self, id: NodeId) -> bool {
        self.physics_tracked.contains(&id)
    }

    /// All currently physics-tracked part ids, in no particular order.
    pub fn physics_tracked_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.physics_tracked.iter().copied()
    }

    /// Spawn a new node as the last child of `parent`.
    pub fn spawn(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        kind: NodeKind,
    ) -> Result<NodeId, TreeError> {
        if !self.is_alive(parent) {
            return Err(TreeError::UnknownNode(parent));
        }
        let id = self.allocator.allocate();
        let mut node = Node::new(id, name, kind);
        node.parent = Some(parent);
        self.nodes.insert(id, node);
        self.nodes.get_mut(&parent).unwrap().children.push(id);

        if self.chain_reaches_workspace(id) && self.nodes[&id].kind.as_part().is_some() {
            self.physics_tracked.insert(id);
        }
        Ok(id)
    }

    /// Remove `id` and its whole subtree, recycling every freed id.
    pub fn despawn(&mut self, id: NodeId) -> Result<(), TreeError> {
        if !self.is_alive(id) {
            return Err(TreeError::UnknownNode(id));
        }
        let descendants = self.collect_subtree(id);

        if let Some(parent) = self.nodes[&id].parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                parent_node.children.retain(|&c| c != id);
            }
        }

        for node_id in descendants {
            self.nodes.remove(&node_id);
            self.physics_tracked.remove(&node_id);
            self.allocator.deallocate(node_id);
        }
        Ok(())
    }

    /// Move `id` to become the last child of `new_parent`. Rejects moving a
    /// node underneath itself or one of its own descendants.
    pub fn reparent(&mut self, id: NodeId, new_parent: NodeId) -> Result<(), TreeError> {
        if !self.is_alive(id) {
            return Err(TreeError::UnknownNode(id));
        }
        if !self.is_alive(new_parent) {
            return Err(TreeError::UnknownNode(new_parent));
        }
        if id == new_parent || self.is_ancestor_of(id, new_parent) {
            return Err(TreeError::CyclicReparent(id));
        }

        if let Some(old_parent) = self.nodes[&id].parent {
            if let Some(parent_node) = self.nodes.get_mut(&old_parent) {
                parent_node.children.retain(|&c| c != id);
            }
        }
        self.nodes.get_mut(&id).unwrap().parent = Some(new_parent);
        self.nodes.get_mut(&new_parent).unwrap().children.push(id);

        let subtree = self.collect_subtree(id);
        for node_id in subtree {
            let is_part = self.nodes[&node_id].kind.as_part().is_some();
            let tracked = is_part && self.chain_reaches_workspace(node_id);
            if tracked {
                self.physics_tracked.insert(node_id);
            } else {
                self.physics_tracked.remove(&node_id);
            }
        }
        Ok(())
    }

    /// Assign a player's character root, replacing any previous one.
    pub fn set_character_root(&mut self, player: NodeId, character: NodeId) -> Result<(), TreeError> {
        let node = self.nodes.get_mut(&player).ok_or(TreeError::UnknownNode(player))?;
        let player_data = node.kind.as_player_mut().ok_or(TreeError::NotAPlayer(player))?;
        player_data.character_root = Some(character);
        Ok(())
    }

    fn chain_reaches_workspace(&self, start: NodeId) -> bool {
        let mut cur = Some(start);
        while let Some(id) = cur {
            if id == self.workspace {
                return true;
            }
            cur = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = self.nodes.get(&node).and_then(|n| n.parent);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    fn collect_subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().copied());
            }
        }
        out
    }
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cframe::{CFrame, Vec3};
    use crate::part::{PartData, PartShape};

    fn test_part() -> NodeKind {
        NodeKind::Part(PartData::new(PartShape::Box, Vec3::new(1.0, 1.0, 1.0), CFrame::default()))
    }

    #[test]
    fn part_under_workspace_is_physics_tracked() {
        let mut tree = SceneTree::new();
        let ws = tree.workspace_id();
        let part = tree.spawn(ws, "Baseplate", test_part()).unwrap();
        assert!(tree.is_physics_tracked(part));
    }

    #[test]
    fn part_outside_workspace_is_not_tracked() {
        let mut tree = SceneTree::new();
        let root = tree.root_id();
        let folder = tree.spawn(root, "Storage", NodeKind::Folder).unwrap();
        let part = tree.spawn(folder, "Template", test_part()).unwrap();
        assert!(!tree.is_physics_tracked(part));
    }

    #[test]
    fn reparenting_into_workspace_marks_tracked() {
        let mut tree = SceneTree::new();
        let root = tree.root_id();
        let ws = tree.workspace_id();
        let folder = tree.spawn(root, "Storage", NodeKind::Folder).unwrap();
        let part = tree.spawn(folder, "Template", test_part()).unwrap();
        assert!(!tree.is_physics_tracked(part));
        tree.reparent(part, ws).unwrap();
        assert!(tree.is_physics_tracked(part));
    }

    #[test]
    fn reparenting_out_of_workspace_untracks() {
        let mut tree = SceneTree::new();
        let ws = tree.workspace_id();
        let root = tree.root_id();
        let part = tree.spawn(ws, "Baseplate", test_part()).unwrap();
        let folder = tree.spawn(root, "Storage", NodeKind::Folder).unwrap();
        tree.reparent(part, folder).unwrap();
        assert!(!tree.is_physics_tracked(part));
    }

    #[test]
    fn despawn_removes_whole_subtree() {
        let mut tree = SceneTree::new();
        let ws = tree.workspace_id();
        let model = tree.spawn(ws, "Model", NodeKind::Model).unwrap();
        let part = tree.spawn(model, "Part", test_part()).unwrap();
        tree.despawn(model).unwrap();
        assert!(!tree.is_alive(model));
        assert!(!tree.is_alive(part));
        assert!(!tree.is_physics_tracked(part));
    }

    #[test]
    fn cyclic_reparent_rejected() {
        let mut tree = SceneTree::new();
        let ws = tree.workspace_id();
        let model = tree.spawn(ws, "Model", NodeKind::Model).unwrap();
        let child = tree.spawn(model, "Child", NodeKind::Folder).unwrap();
        assert!(tree.reparent(model, child).is_err());
        assert!(tree.reparent(model, model).is_err());
    }

    #[test]
    fn unknown_node_operations_error() {
        let mut tree = SceneTree::new();
        let stale = {
            let ws = tree.workspace_id();
            let id = tree.spawn(ws, "Temp", NodeKind::Folder).unwrap();
            tree.despawn(id).unwrap();
            id
        };
        assert!(tree.despawn(stale).is_err());
        assert!(matches!(tree.get(stale), None));
    }
}
