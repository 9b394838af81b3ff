//! Property tests for the scene tree and its id allocator.
//!
//! Generates random sequences of spawn/despawn/reparent and checks that the
//! tree's structural invariants -- every child's parent pointer agrees with
//! its parent's child list, no node is its own ancestor, physics-tracked
//! membership matches workspace reachability -- hold after each sequence.

use atrium_tree::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum TreeOp {
    SpawnPart(usize),
    SpawnFolder(usize),
    Despawn(usize),
    Reparent(usize, usize),
}

fn tree_op_strategy() -> impl Strategy<Value = TreeOp> {
    prop_oneof![
        (0..20usize).prop_map(TreeOp::SpawnPart),
        (0..20usize).prop_map(TreeOp::SpawnFolder),
        (0..20usize).prop_map(TreeOp::Despawn),
        (0..20usize, 0..20usize).prop_map(|(a, b)| TreeOp::Reparent(a, b)),
    ]
}

fn assert_invariants(tree: &SceneTree, live: &[NodeId]) {
    for &id in live {
        let node = tree.get(id).expect("tracked id must be alive");
        if let Some(parent) = node.parent {
            let parent_node = tree.get(parent).expect("parent must be alive");
            assert!(
                parent_node.children.contains(&id),
                "parent's child list must contain {id:?}"
            );
        }
        if node.kind.as_part().is_some() {
            let reaches_workspace = {
                let mut cur = Some(id);
                let mut found = false;
                while let Some(cursor) = cur {
                    if cursor == tree.workspace_id() {
                        found = true;
                        break;
                    }
                    cur = tree.get(cursor).and_then(|n| n.parent);
                }
                found
            };
            assert_eq!(tree.is_physics_tracked(id), reaches_workspace);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2000))]

    #[test]
    fn tree_random_ops_preserve_invariants(ops in prop::collection::vec(tree_op_strategy(), 1..60)) {
        let mut tree = SceneTree::new();
        let ws = tree.workspace_id();
        let mut live: Vec<NodeId> = vec![ws, tree.root_id()];

        for op in ops {
            match op {
                TreeOp::SpawnPart(parent_idx) => {
                    if let Some(&parent) = live.get(parent_idx % live.len()) {
                        let part = PartData::new(PartShape::Box, Vec3::new(1.0, 1.0, 1.0), CFrame::default());
                        if let Ok(id) = tree.spawn(parent, "Part", NodeKind::Part(part)) {
                            live.push(id);
                        }
                    }
                }
                TreeOp::SpawnFolder(parent_idx) => {
                    if let Some(&parent) = live.get(parent_idx % live.len()) {
                        if let Ok(id) = tree.spawn(parent, "Folder", NodeKind::Folder) {
                            live.push(id);
                        }
                    }
                }
                TreeOp::Despawn(idx) => {
                    if live.len() > 2 {
                        let idx = 2 + (idx % (live.len() - 2));
                        let id = live[idx];
                        if id != ws && tree.despawn(id).is_ok() {
                            live.retain(|&n| n != id && tree.is_alive(n));
                        }
                    }
                }
                TreeOp::Reparent(a_idx, b_idx) => {
                    if !live.is_empty() {
                        let a = live[a_idx % live.len()];
                        let b = live[b_idx % live.len()];
                        let _ = tree.reparent(a, b);
                    }
                }
            }
            live.retain(|&id| tree.is_alive(id));
            assert_invariants(&tree, &live);
        }
    }
}
