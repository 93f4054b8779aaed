//! Transform hierarchy
//!
//! Nodes live in an arena and refer to their parent and children by key, so
//! the hierarchy never owns itself. Every mutation pushes the new world
//! matrix down through the mutated node's subtree immediately; there is no
//! deferred dirty state at the node level.
//!
//! Keys of removed nodes stay invalid forever. Using one (or any key from
//! another graph) is a programming error and panics.

use crate::foundation::collections::{TransformKey, TransformMap};
use crate::foundation::math::{Mat4, Quat, Transform, Vec3};

/// One node of the hierarchy
#[derive(Debug, Clone)]
pub struct TransformNode {
    transform: Transform,
    local: Mat4,
    global: Mat4,
    parent: Option<TransformKey>,
    children: Vec<TransformKey>,
}

impl TransformNode {
    fn new(transform: Transform, local: Mat4) -> Self {
        Self {
            transform,
            local,
            global: local,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Position, rotation and scale components
    pub const fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Local matrix relative to the parent
    pub const fn local_matrix(&self) -> &Mat4 {
        &self.local
    }

    /// Cached world matrix
    pub const fn global_matrix(&self) -> &Mat4 {
        &self.global
    }

    /// Parent node, `None` for roots
    pub const fn parent(&self) -> Option<TransformKey> {
        self.parent
    }

    /// Children in insertion order
    pub fn children(&self) -> &[TransformKey] {
        &self.children
    }
}

/// Arena of transform nodes forming a forest
#[derive(Debug, Clone, Default)]
pub struct TransformGraph {
    nodes: TransformMap<TransformNode>,
}

impl TransformGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `key` refers to a live node
    pub fn contains(&self, key: TransformKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Insert a root node from position, rotation and scale
    pub fn insert(&mut self, transform: Transform) -> TransformKey {
        self.nodes.insert(TransformNode::new(transform, transform.to_matrix()))
    }

    /// Insert a root node from a local matrix
    pub fn insert_matrix(&mut self, local: Mat4) -> TransformKey {
        self.nodes.insert(TransformNode::new(Transform::from_matrix(local), local))
    }

    /// Node data
    pub fn node(&self, key: TransformKey) -> &TransformNode {
        &self.nodes[key]
    }

    /// Cached world matrix of `key`
    pub fn global(&self, key: TransformKey) -> Mat4 {
        self.nodes[key].global
    }

    /// Local matrix of `key`
    pub fn local(&self, key: TransformKey) -> Mat4 {
        self.nodes[key].local
    }

    /// Parent of `key`
    pub fn parent(&self, key: TransformKey) -> Option<TransformKey> {
        self.nodes[key].parent
    }

    /// Children of `key` in insertion order
    pub fn children(&self, key: TransformKey) -> &[TransformKey] {
        &self.nodes[key].children
    }

    /// All nodes without a parent
    pub fn roots(&self) -> impl Iterator<Item = TransformKey> + '_ {
        self.nodes.iter().filter(|(_, n)| n.parent.is_none()).map(|(k, _)| k)
    }

    /// Whether `ancestor` lies on the parent chain of `node` (a node is not its own ancestor)
    pub fn is_ancestor(&self, ancestor: TransformKey, node: TransformKey) -> bool {
        let mut current = self.nodes[node].parent;
        while let Some(key) = current {
            if key == ancestor {
                return true;
            }
            current = self.nodes[key].parent;
        }
        false
    }

    /// Replace the local matrix, decomposing it into position, rotation and scale.
    ///
    /// The matrix is kept as given; shear or perspective terms survive in the
    /// local matrix even though the decomposed components drop them.
    pub fn set_local_matrix(&mut self, key: TransformKey, local: Mat4) {
        let node = &mut self.nodes[key];
        node.local = local;
        node.transform = Transform::from_matrix(local);
        self.propagate(key);
    }

    /// Replace position, rotation and scale together
    pub fn set_transform(&mut self, key: TransformKey, transform: Transform) {
        let node = &mut self.nodes[key];
        node.transform = transform;
        node.local = transform.to_matrix();
        self.propagate(key);
    }

    /// Move the node relative to its parent
    pub fn set_position(&mut self, key: TransformKey, position: Vec3) {
        let transform = Transform { position, ..self.nodes[key].transform };
        self.set_transform(key, transform);
    }

    /// Rotate the node relative to its parent
    pub fn set_rotation(&mut self, key: TransformKey, rotation: Quat) {
        let transform = Transform { rotation, ..self.nodes[key].transform };
        self.set_transform(key, transform);
    }

    /// Scale the node relative to its parent
    pub fn set_scale(&mut self, key: TransformKey, scale: Vec3) {
        let transform = Transform { scale, ..self.nodes[key].transform };
        self.set_transform(key, transform);
    }

    /// Attach `child` under `parent`, detaching it from any previous parent.
    ///
    /// The child keeps its local transform, so its world matrix changes.
    ///
    /// # Panics
    /// When `child` is `parent` or one of its ancestors.
    pub fn add_child(&mut self, parent: TransformKey, child: TransformKey) {
        assert!(
            parent != child && !self.is_ancestor(child, parent),
            "attaching {child:?} under {parent:?} would create a cycle"
        );
        self.unlink(child);
        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
        self.propagate(child);
    }

    /// Make `key` a root, keeping its local transform
    pub fn detach(&mut self, key: TransformKey) {
        if self.nodes[key].parent.is_some() {
            self.unlink(key);
            self.propagate(key);
        }
    }

    /// Remove a node, returning its components.
    ///
    /// Children are appended to the removed node's parent, or become roots
    /// when it had none. They keep their local transforms, so their world
    /// position follows the new parent.
    pub fn remove(&mut self, key: TransformKey) -> Transform {
        self.unlink(key);
        let node = self.nodes.remove(key).unwrap_or_else(|| panic!("invalid transform key {key:?}"));

        for &child in &node.children {
            self.nodes[child].parent = node.parent;
            if let Some(parent) = node.parent {
                self.nodes[parent].children.push(child);
            }
            self.propagate(child);
        }
        node.transform
    }

    fn unlink(&mut self, child: TransformKey) {
        if let Some(old) = self.nodes[child].parent.take() {
            let siblings = &mut self.nodes[old].children;
            if let Some(index) = siblings.iter().position(|&c| c == child) {
                siblings.remove(index);
            }
        }
    }

    /// Recompute world matrices of `key` and all of its descendants
    fn propagate(&mut self, key: TransformKey) {
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            let parent_global = self.nodes[current].parent.map(|p| self.nodes[p].global);
            let node = &mut self.nodes[current];
            node.global = match parent_global {
                Some(parent) => parent * node.local,
                None => node.local,
            };
            stack.extend(node.children.iter().copied());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Unit;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    fn at(x: f32, y: f32, z: f32) -> Transform {
        Transform::from_position(Vec3::new(x, y, z))
    }

    fn assert_consistent(graph: &TransformGraph) {
        for (key, node) in &graph.nodes {
            let expected = match node.parent {
                Some(parent) => graph.global(parent) * node.local,
                None => node.local,
            };
            assert_relative_eq!(node.global, expected, epsilon = EPSILON);
            assert!(!graph.is_ancestor(key, key));
            for &child in &node.children {
                assert_eq!(graph.parent(child), Some(key));
            }
        }
    }

    #[test]
    fn test_child_inherits_parent_transform() {
        let mut graph = TransformGraph::new();
        let parent = graph.insert(at(1.0, 0.0, 0.0));
        let child = graph.insert(at(0.0, 2.0, 0.0));

        graph.add_child(parent, child);

        let translation = graph.global(child).column(3).xyz();
        assert_relative_eq!(translation, Vec3::new(1.0, 2.0, 0.0), epsilon = EPSILON);
    }

    #[test]
    fn test_ancestor_mutation_reaches_grandchildren() {
        let mut graph = TransformGraph::new();
        let root = graph.insert(Transform::identity());
        let mid = graph.insert(at(0.0, 0.0, 1.0));
        let leaf = graph.insert(at(1.0, 0.0, 0.0));
        graph.add_child(root, mid);
        graph.add_child(mid, leaf);

        let quarter = Quat::from_axis_angle(&Unit::new_normalize(Vec3::y()), std::f32::consts::FRAC_PI_2);
        graph.set_rotation(root, quarter);
        graph.set_scale(root, Vec3::new(2.0, 2.0, 2.0));
        graph.set_position(mid, Vec3::new(0.0, 3.0, 0.0));

        assert_consistent(&graph);
        let expected = graph.local(root) * graph.local(mid) * graph.local(leaf);
        assert_relative_eq!(graph.global(leaf), expected, epsilon = EPSILON);
    }

    #[test]
    fn test_set_local_matrix_decomposes() {
        let mut graph = TransformGraph::new();
        let node = graph.insert(Transform::identity());
        let local = Mat4::new_translation(&Vec3::new(4.0, 5.0, 6.0)) * Mat4::new_nonuniform_scaling(&Vec3::new(1.0, 2.0, 3.0));

        graph.set_local_matrix(node, local);

        let transform = graph.node(node).transform();
        assert_relative_eq!(transform.position, Vec3::new(4.0, 5.0, 6.0), epsilon = EPSILON);
        assert_relative_eq!(transform.scale, Vec3::new(1.0, 2.0, 3.0), epsilon = EPSILON);
        assert_relative_eq!(graph.global(node), local, epsilon = EPSILON);
    }

    #[test]
    fn test_reparent_moves_child_exactly_once() {
        let mut graph = TransformGraph::new();
        let a = graph.insert(at(1.0, 0.0, 0.0));
        let b = graph.insert(at(0.0, 1.0, 0.0));
        let child = graph.insert(Transform::identity());

        graph.add_child(a, child);
        graph.add_child(b, child);
        graph.add_child(b, child);

        assert!(graph.children(a).is_empty());
        assert_eq!(graph.children(b), &[child]);
        assert_eq!(graph.parent(child), Some(b));
        assert_consistent(&graph);
    }

    #[test]
    fn test_remove_with_parent_reparents_children_preserving_local() {
        let mut graph = TransformGraph::new();
        let grandparent = graph.insert(at(10.0, 0.0, 0.0));
        let sibling = graph.insert(Transform::identity());
        let node = graph.insert(at(0.0, 5.0, 0.0));
        let c1 = graph.insert(at(1.0, 0.0, 0.0));
        let c2 = graph.insert(at(2.0, 0.0, 0.0));
        graph.add_child(grandparent, sibling);
        graph.add_child(grandparent, node);
        graph.add_child(node, c1);
        graph.add_child(node, c2);

        graph.remove(node);

        assert!(!graph.contains(node));
        assert_eq!(graph.children(grandparent), &[sibling, c1, c2]);
        assert_eq!(graph.parent(c1), Some(grandparent));
        // Local preserved: world is grandparent * local, the removed offset is gone
        let translation = graph.global(c2).column(3).xyz();
        assert_relative_eq!(translation, Vec3::new(12.0, 0.0, 0.0), epsilon = EPSILON);
        assert_consistent(&graph);
    }

    #[test]
    fn test_remove_root_makes_children_roots() {
        let mut graph = TransformGraph::new();
        let root = graph.insert(at(3.0, 0.0, 0.0));
        let c1 = graph.insert(at(1.0, 0.0, 0.0));
        let c2 = graph.insert(at(0.0, 1.0, 0.0));
        graph.add_child(root, c1);
        graph.add_child(root, c2);

        graph.remove(root);

        let mut roots: Vec<_> = graph.roots().collect();
        roots.sort();
        let mut expected = vec![c1, c2];
        expected.sort();
        assert_eq!(roots, expected);
        assert_relative_eq!(graph.global(c1), graph.local(c1), epsilon = EPSILON);
    }

    #[test]
    fn test_forest_invariant_over_mixed_operations() {
        let mut graph = TransformGraph::new();
        let keys: Vec<_> = (0..6).map(|i| graph.insert(at(i as f32, 0.0, 0.0))).collect();
        graph.add_child(keys[0], keys[1]);
        graph.add_child(keys[1], keys[2]);
        graph.add_child(keys[2], keys[3]);
        graph.add_child(keys[0], keys[4]);
        graph.add_child(keys[4], keys[1]);
        graph.detach(keys[2]);
        graph.add_child(keys[3], keys[5]);
        graph.remove(keys[3]);
        graph.add_child(keys[5], keys[0]);

        assert_consistent(&graph);
        assert_eq!(graph.len(), 5);
    }

    #[test]
    #[should_panic(expected = "cycle")]
    fn test_cycle_is_rejected() {
        let mut graph = TransformGraph::new();
        let a = graph.insert(Transform::identity());
        let b = graph.insert(Transform::identity());
        graph.add_child(a, b);
        graph.add_child(b, a);
    }

    #[test]
    #[should_panic]
    fn test_removed_key_fails_fast() {
        let mut graph = TransformGraph::new();
        let a = graph.insert(Transform::identity());
        graph.remove(a);
        graph.set_position(a, Vec3::zeros());
    }
}
