//! Minimal tree structure the updater queries during growth.
//!
//! The surrounding trainer owns the real tree; this engine only needs
//! parent/child/depth/leaf queries plus a way to materialize a chosen split
//! into two children. [`GrowingTree`] provides exactly that, keeping the
//! crate self-contained for tests and embedding.

const INVALID: u32 = u32::MAX;

#[derive(Debug, Clone, Copy)]
struct TreeNode {
    parent: u32,
    left: u32,
    right: u32,
    depth: u32,
}

/// A node pending histogram build / split evaluation.
///
/// Transient: produced by the growth policy, consumed by the updater.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpandEntry {
    /// Node id in the growing tree.
    pub nid: u32,
    /// Depth of the node (root = 0).
    pub depth: u32,
}

impl ExpandEntry {
    /// Create an entry for a node.
    #[inline]
    pub fn new(nid: u32, depth: u32) -> Self {
        Self { nid, depth }
    }
}

/// Compact tree under construction.
///
/// Node 0 is the root; `apply_split` appends a left/right child pair and
/// returns their ids. Only structure is tracked here; split metadata lives
/// in the updater's [`NodeEntry`](crate::node::NodeEntry) table.
#[derive(Debug, Clone)]
pub struct GrowingTree {
    nodes: Vec<TreeNode>,
}

impl Default for GrowingTree {
    fn default() -> Self {
        Self::new()
    }
}

impl GrowingTree {
    /// A tree containing only the root.
    pub fn new() -> Self {
        Self {
            nodes: vec![TreeNode {
                parent: INVALID,
                left: INVALID,
                right: INVALID,
                depth: 0,
            }],
        }
    }

    /// Total node count (internal + leaves).
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of a node (root = 0).
    #[inline]
    pub fn depth(&self, nid: u32) -> u32 {
        self.nodes[nid as usize].depth
    }

    /// Parent of a node, `None` for the root.
    #[inline]
    pub fn parent(&self, nid: u32) -> Option<u32> {
        let p = self.nodes[nid as usize].parent;
        (p != INVALID).then_some(p)
    }

    /// True for the root node.
    #[inline]
    pub fn is_root(&self, nid: u32) -> bool {
        self.nodes[nid as usize].parent == INVALID
    }

    /// True if the node has no children.
    #[inline]
    pub fn is_leaf(&self, nid: u32) -> bool {
        self.nodes[nid as usize].left == INVALID
    }

    /// True if the node is its parent's left child.
    ///
    /// # Panics
    ///
    /// Panics when called on the root.
    #[inline]
    pub fn is_left_child(&self, nid: u32) -> bool {
        let parent = self.nodes[nid as usize].parent;
        assert_ne!(parent, INVALID, "root has no parent");
        self.nodes[parent as usize].left == nid
    }

    /// The other child of this node's parent, `None` for the root.
    pub fn sibling(&self, nid: u32) -> Option<u32> {
        let parent = self.parent(nid)?;
        let p = &self.nodes[parent as usize];
        Some(if p.left == nid { p.right } else { p.left })
    }

    /// Materialize a split: append a left/right child pair under `nid`.
    ///
    /// Returns `(left_id, right_id)`.
    ///
    /// # Panics
    ///
    /// Panics if `nid` already has children.
    pub fn apply_split(&mut self, nid: u32) -> (u32, u32) {
        assert!(self.is_leaf(nid), "node {nid} already split");
        let depth = self.nodes[nid as usize].depth + 1;
        let left = self.nodes.len() as u32;
        let right = left + 1;
        self.nodes.push(TreeNode {
            parent: nid,
            left: INVALID,
            right: INVALID,
            depth,
        });
        self.nodes.push(TreeNode {
            parent: nid,
            left: INVALID,
            right: INVALID,
            depth,
        });
        let node = &mut self.nodes[nid as usize];
        node.left = left;
        node.right = right;
        (left, right)
    }
}
