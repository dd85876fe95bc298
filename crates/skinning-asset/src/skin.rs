use std::collections::HashMap;

use glam::Mat4;
use log::warn;

use crate::node::DecomposedTransform;

#[derive(Debug, Clone)]
pub struct Joint {
    /// Index of the node this joint was built from.
    pub node: usize,
    pub name: Option<String>,
    /// Bind-pose model space to joint space.
    pub inverse_bind_matrix: Mat4,
    /// Local transform of the node when no animation drives it.
    pub rest: DecomposedTransform,
    /// Positions in [`Skeleton::joints`], not node indices.
    pub children: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    pub name: Option<String>,
    pub joints: Vec<Joint>,
    // node index -> joint index
    pub node_to_joint: HashMap<usize, usize>,
    pub root: usize,
}

impl Skeleton {
    pub fn joint_for_node(&self, node: usize) -> Option<usize> {
        self.node_to_joint.get(&node).copied()
    }

    /// Joints that no other joint lists as a child, in joint order.
    pub fn parentless_joints(&self) -> Vec<usize> {
        let mut has_parent = vec![false; self.joints.len()];
        for joint in &self.joints {
            for child in &joint.children {
                if let Some(flag) = has_parent.get_mut(*child) {
                    *flag = true;
                }
            }
        }
        has_parent
            .into_iter()
            .enumerate()
            .filter_map(|(index, has_parent)| (!has_parent).then_some(index))
            .collect()
    }

    /// Parent-before-child order of the joints, as `(joint, parent)` pairs.
    ///
    /// The tree below the root comes first. Other parentless joints follow as
    /// roots of their own. A joint reached twice (a cycle, or a child shared by
    /// two parents) is visited only the first time.
    pub fn traversal_order(&self) -> Vec<(usize, Option<usize>)> {
        let mut order = Vec::with_capacity(self.joints.len());
        if self.root >= self.joints.len() {
            return order;
        }

        let mut visited = vec![false; self.joints.len()];
        let roots = std::iter::once(self.root).chain(
            self.parentless_joints()
                .into_iter()
                .filter(|joint| *joint != self.root),
        );
        for root in roots {
            if visited[root] {
                continue;
            }
            let mut stack = vec![(root, None)];
            while let Some((joint, parent)) = stack.pop() {
                if visited[joint] {
                    warn!("Joint #{} is reachable twice, skeleton is not a tree", joint);
                    continue;
                }
                visited[joint] = true;
                order.push((joint, parent));
                for child in self.joints[joint].children.iter().rev() {
                    if *child < self.joints.len() {
                        stack.push((*child, Some(joint)));
                    }
                }
            }
        }
        order
    }
}
