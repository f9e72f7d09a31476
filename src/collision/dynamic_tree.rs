//! Dynamic AABB tree: a height-balanced binary bounding volume hierarchy over fattened boxes.
//!
//! Leaves hold one proxy each and store a fat AABB so small motions do not touch the tree.
//! Internal nodes always have two children and their box is the union of the children's boxes.

use glam::Vec2;

use super::aabb::{Aabb, RayCastInput};
use crate::utils::math::cross_sv;

/// Index of a leaf in the tree's node pool; stable for the proxy's lifetime.
pub type ProxyId = usize;

pub const NULL_NODE: usize = usize::MAX;

#[derive(Debug, Clone)]
struct TreeNode<T> {
    aabb: Aabb,
    /// Present on leaves only.
    data: Option<T>,
    /// Parent link, or next free node while on the free list.
    parent: usize,
    child1: usize,
    child2: usize,
    /// Leaf = 0, free = -1.
    height: i32,
    moved: bool,
}

impl<T> TreeNode<T> {
    fn free() -> Self {
        Self {
            aabb: Aabb {
                min: Vec2::ZERO,
                max: Vec2::ZERO,
            },
            data: None,
            parent: NULL_NODE,
            child1: NULL_NODE,
            child2: NULL_NODE,
            height: -1,
            moved: false,
        }
    }

    fn is_leaf(&self) -> bool {
        self.child1 == NULL_NODE
    }
}

#[derive(Debug, Clone)]
pub struct DynamicTree<T> {
    nodes: Vec<TreeNode<T>>,
    root: usize,
    free_list: usize,
    node_count: usize,
    insertion_count: usize,
    margin: f32,
    multiplier: f32,
}

impl<T> Default for DynamicTree<T> {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_AABB_MARGIN,
            crate::config::DEFAULT_AABB_MULTIPLIER,
        )
    }
}

impl<T> DynamicTree<T> {
    /// `margin` fattens every leaf; `multiplier` scales displacement when predicting motion.
    pub fn new(margin: f32, multiplier: f32) -> Self {
        Self {
            nodes: Vec::with_capacity(16),
            root: NULL_NODE,
            free_list: NULL_NODE,
            node_count: 0,
            insertion_count: 0,
            margin,
            multiplier,
        }
    }

    fn allocate_node(&mut self) -> usize {
        let id = if self.free_list == NULL_NODE {
            self.nodes.push(TreeNode::free());
            self.nodes.len() - 1
        } else {
            let id = self.free_list;
            self.free_list = self.nodes[id].parent;
            id
        };
        let node = &mut self.nodes[id];
        node.parent = NULL_NODE;
        node.child1 = NULL_NODE;
        node.child2 = NULL_NODE;
        node.height = 0;
        node.data = None;
        node.moved = false;
        self.node_count += 1;
        id
    }

    fn free_node(&mut self, id: usize) -> Option<T> {
        debug_assert!(self.node_count > 0);
        let node = &mut self.nodes[id];
        let data = node.data.take();
        node.parent = self.free_list;
        node.height = -1;
        node.child1 = NULL_NODE;
        node.child2 = NULL_NODE;
        self.free_list = id;
        self.node_count -= 1;
        data
    }

    fn is_live_leaf(&self, id: ProxyId) -> bool {
        self.nodes
            .get(id)
            .map(|node| node.height == 0 && node.data.is_some())
            .unwrap_or(false)
    }

    /// Inserts a leaf for `aabb`, fattened by the tree margin.
    pub fn create_proxy(&mut self, aabb: Aabb, data: T) -> ProxyId {
        let id = self.allocate_node();
        let node = &mut self.nodes[id];
        node.aabb = aabb.fattened(self.margin);
        node.data = Some(data);
        node.height = 0;
        node.moved = true;
        self.insert_leaf(id);
        id
    }

    /// Removes the leaf and returns its user data; unknown ids are ignored.
    pub fn destroy_proxy(&mut self, id: ProxyId) -> Option<T> {
        if !self.is_live_leaf(id) {
            return None;
        }
        self.remove_leaf(id);
        self.free_node(id)
    }

    /// Updates a proxy after its shape moved.
    ///
    /// Returns `true` when the leaf was re-inserted. Nothing happens while the tight box still
    /// fits in the fat box and the fat box is not oversized relative to the new prediction.
    pub fn move_proxy(&mut self, id: ProxyId, aabb: Aabb, displacement: Vec2) -> bool {
        if !self.is_live_leaf(id) {
            return false;
        }

        let mut fat = aabb.fattened(self.margin);
        let d = self.multiplier * displacement;
        if d.x < 0.0 {
            fat.min.x += d.x;
        } else {
            fat.max.x += d.x;
        }
        if d.y < 0.0 {
            fat.min.y += d.y;
        } else {
            fat.max.y += d.y;
        }

        let tree_aabb = self.nodes[id].aabb;
        if tree_aabb.contains(&aabb) {
            let huge = fat.fattened(4.0 * self.margin);
            if huge.contains(&tree_aabb) {
                return false;
            }
        }

        self.remove_leaf(id);
        self.nodes[id].aabb = fat;
        self.insert_leaf(id);
        self.nodes[id].moved = true;
        true
    }

    pub fn user_data(&self, id: ProxyId) -> Option<&T> {
        self.nodes.get(id).and_then(|node| node.data.as_ref())
    }

    pub fn fat_aabb(&self, id: ProxyId) -> Option<Aabb> {
        if self.is_live_leaf(id) {
            Some(self.nodes[id].aabb)
        } else {
            None
        }
    }

    pub fn was_moved(&self, id: ProxyId) -> bool {
        self.nodes.get(id).map(|node| node.moved).unwrap_or(false)
    }

    pub fn clear_moved(&mut self, id: ProxyId) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.moved = false;
        }
    }

    pub fn proxy_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.height == 0 && node.data.is_some())
            .count()
    }

    /// Number of leaf insertions performed, re-insertions from `move_proxy` included.
    pub fn insertion_count(&self) -> usize {
        self.insertion_count
    }

    /// Calls `callback` for every leaf whose fat box overlaps `aabb`; return `false` to stop.
    pub fn query(&self, aabb: &Aabb, mut callback: impl FnMut(ProxyId) -> bool) {
        if self.root == NULL_NODE {
            return;
        }
        let mut stack = Vec::with_capacity(64);
        stack.push(self.root);

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if !node.aabb.overlaps(aabb) {
                continue;
            }
            if node.is_leaf() {
                if !callback(id) {
                    return;
                }
            } else {
                stack.push(node.child1);
                stack.push(node.child2);
            }
        }
    }

    /// Collects the user data of every leaf whose fat box overlaps `aabb`, in traversal order.
    pub fn query_all(&self, aabb: &Aabb) -> Vec<T>
    where
        T: Clone,
    {
        let mut out = Vec::new();
        self.query(aabb, |id| {
            if let Some(data) = self.user_data(id) {
                out.push(data.clone());
            }
            true
        });
        out
    }

    /// Visits leaves whose fat box the segment may cross, in traversal order.
    ///
    /// The callback returns the new max fraction: `0` stops, a negative value ignores the leaf,
    /// anything else clips the segment.
    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        mut callback: impl FnMut(&RayCastInput, ProxyId) -> f32,
    ) {
        if self.root == NULL_NODE {
            return;
        }
        let p1 = input.p1;
        let p2 = input.p2;
        let r = (p2 - p1).normalize_or_zero();
        if r == Vec2::ZERO {
            return;
        }

        // Separating axis for the segment.
        let v = cross_sv(1.0, r);
        let abs_v = v.abs();

        let mut max_fraction = input.max_fraction;
        let segment_box = |fraction: f32| {
            let t = p1 + fraction * (p2 - p1);
            Aabb {
                min: p1.min(t),
                max: p1.max(t),
            }
        };
        let mut segment_aabb = segment_box(max_fraction);

        let mut stack = Vec::with_capacity(64);
        stack.push(self.root);

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if !node.aabb.overlaps(&segment_aabb) {
                continue;
            }

            let c = node.aabb.center();
            let h = node.aabb.extents();
            let separation = v.dot(p1 - c).abs() - abs_v.dot(h);
            if separation > 0.0 {
                continue;
            }

            if node.is_leaf() {
                let sub_input = RayCastInput {
                    p1,
                    p2,
                    max_fraction,
                };
                let value = callback(&sub_input, id);
                if value == 0.0 {
                    return;
                }
                if value > 0.0 {
                    max_fraction = value;
                    segment_aabb = segment_box(max_fraction);
                }
            } else {
                stack.push(node.child1);
                stack.push(node.child2);
            }
        }
    }

    fn insert_leaf(&mut self, leaf: usize) {
        self.insertion_count += 1;

        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf].parent = NULL_NODE;
            return;
        }

        // Find the best sibling by perimeter cost.
        let leaf_aabb = self.nodes[leaf].aabb;
        let mut index = self.root;
        while !self.nodes[index].is_leaf() {
            let child1 = self.nodes[index].child1;
            let child2 = self.nodes[index].child2;

            let area = self.nodes[index].aabb.perimeter();
            let combined_area = self.nodes[index].aabb.union(&leaf_aabb).perimeter();

            // Cost of creating a new parent for this node and the new leaf.
            let cost = 2.0 * combined_area;
            // Minimum cost of pushing the leaf further down the tree.
            let inheritance_cost = 2.0 * (combined_area - area);

            let cost1 = self.descend_cost(child1, &leaf_aabb) + inheritance_cost;
            let cost2 = self.descend_cost(child2, &leaf_aabb) + inheritance_cost;

            if cost < cost1 && cost < cost2 {
                break;
            }
            index = if cost1 < cost2 { child1 } else { child2 };
        }

        let sibling = index;
        let old_parent = self.nodes[sibling].parent;
        let new_parent = self.allocate_node();
        self.nodes[new_parent].parent = old_parent;
        self.nodes[new_parent].aabb = leaf_aabb.union(&self.nodes[sibling].aabb);
        self.nodes[new_parent].height = self.nodes[sibling].height + 1;
        self.nodes[new_parent].child1 = sibling;
        self.nodes[new_parent].child2 = leaf;
        self.nodes[sibling].parent = new_parent;
        self.nodes[leaf].parent = new_parent;

        if old_parent == NULL_NODE {
            self.root = new_parent;
        } else if self.nodes[old_parent].child1 == sibling {
            self.nodes[old_parent].child1 = new_parent;
        } else {
            self.nodes[old_parent].child2 = new_parent;
        }

        let parent = self.nodes[leaf].parent;
        self.refit_from(parent);
    }

    fn descend_cost(&self, child: usize, leaf_aabb: &Aabb) -> f32 {
        let node = &self.nodes[child];
        let combined = leaf_aabb.union(&node.aabb).perimeter();
        if node.is_leaf() {
            combined
        } else {
            combined - node.aabb.perimeter()
        }
    }

    fn remove_leaf(&mut self, leaf: usize) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf].parent;
        let grand_parent = self.nodes[parent].parent;
        let sibling = if self.nodes[parent].child1 == leaf {
            self.nodes[parent].child2
        } else {
            self.nodes[parent].child1
        };

        if grand_parent == NULL_NODE {
            self.root = sibling;
            self.nodes[sibling].parent = NULL_NODE;
            self.free_node(parent);
            return;
        }

        if self.nodes[grand_parent].child1 == parent {
            self.nodes[grand_parent].child1 = sibling;
        } else {
            self.nodes[grand_parent].child2 = sibling;
        }
        self.nodes[sibling].parent = grand_parent;
        self.free_node(parent);
        self.refit_from(grand_parent);
    }

    /// Walks to the root, rebalancing and refitting every ancestor.
    fn refit_from(&mut self, start: usize) {
        let mut index = start;
        while index != NULL_NODE {
            index = self.balance(index);

            let child1 = self.nodes[index].child1;
            let child2 = self.nodes[index].child2;
            debug_assert!(child1 != NULL_NODE && child2 != NULL_NODE);

            self.nodes[index].height = 1 + self.nodes[child1].height.max(self.nodes[child2].height);
            self.nodes[index].aabb = self.nodes[child1].aabb.union(&self.nodes[child2].aabb);

            index = self.nodes[index].parent;
        }
    }

    /// Performs a left or right rotation if node `a` is imbalanced. Returns the new subtree root.
    fn balance(&mut self, a: usize) -> usize {
        if self.nodes[a].is_leaf() || self.nodes[a].height < 2 {
            return a;
        }

        let b = self.nodes[a].child1;
        let c = self.nodes[a].child2;
        let balance = self.nodes[c].height - self.nodes[b].height;

        if balance > 1 {
            self.rotate_up(a, c, b, true);
            return c;
        }
        if balance < -1 {
            self.rotate_up(a, b, c, false);
            return b;
        }
        a
    }

    /// Lifts `up` (a child of `a`) above `a`. `other` is `a`'s remaining child. `up_was_child2`
    /// tells which slot of `a` `up` occupied; that slot receives one of `up`'s children.
    fn rotate_up(&mut self, a: usize, up: usize, other: usize, up_was_child2: bool) {
        let f = self.nodes[up].child1;
        let g = self.nodes[up].child2;

        // Swap a and up.
        self.nodes[up].child1 = a;
        self.nodes[up].parent = self.nodes[a].parent;
        self.nodes[a].parent = up;

        let up_parent = self.nodes[up].parent;
        if up_parent == NULL_NODE {
            self.root = up;
        } else if self.nodes[up_parent].child1 == a {
            self.nodes[up_parent].child1 = up;
        } else {
            debug_assert_eq!(self.nodes[up_parent].child2, a);
            self.nodes[up_parent].child2 = up;
        }

        // The taller grandchild stays with `up`, the shorter one moves under `a`.
        let (keep, give) = if self.nodes[f].height > self.nodes[g].height {
            (f, g)
        } else {
            (g, f)
        };
        self.nodes[up].child2 = keep;
        if up_was_child2 {
            self.nodes[a].child2 = give;
        } else {
            self.nodes[a].child1 = give;
        }
        self.nodes[give].parent = a;

        self.nodes[a].aabb = self.nodes[other].aabb.union(&self.nodes[give].aabb);
        self.nodes[up].aabb = self.nodes[a].aabb.union(&self.nodes[keep].aabb);
        self.nodes[a].height = 1 + self.nodes[other].height.max(self.nodes[give].height);
        self.nodes[up].height = 1 + self.nodes[a].height.max(self.nodes[keep].height);
    }

    /// Height of the tree; an empty tree has height 0.
    pub fn height(&self) -> i32 {
        if self.root == NULL_NODE {
            0
        } else {
            self.nodes[self.root].height
        }
    }

    /// Largest height difference between the two children of any internal node.
    pub fn max_balance(&self) -> i32 {
        self.nodes
            .iter()
            .filter(|node| node.height > 1)
            .map(|node| (self.nodes[node.child2].height - self.nodes[node.child1].height).abs())
            .max()
            .unwrap_or(0)
    }

    /// Sum of all node perimeters over the root perimeter; a tree quality metric.
    pub fn area_ratio(&self) -> f32 {
        if self.root == NULL_NODE {
            return 0.0;
        }
        let root_area = self.nodes[self.root].aabb.perimeter();
        let total: f32 = self
            .nodes
            .iter()
            .filter(|node| node.height >= 0)
            .map(|node| node.aabb.perimeter())
            .sum();
        if root_area > 0.0 {
            total / root_area
        } else {
            0.0
        }
    }

    /// Checks parent links, heights, box unions and the free list.
    pub fn validate(&self) -> bool {
        if self.root != NULL_NODE && self.nodes[self.root].parent != NULL_NODE {
            return false;
        }
        if !self.validate_subtree(self.root) {
            return false;
        }

        let mut free_count = 0;
        let mut free = self.free_list;
        while free != NULL_NODE {
            if free >= self.nodes.len() {
                return false;
            }
            free = self.nodes[free].parent;
            free_count += 1;
        }
        self.node_count + free_count == self.nodes.len()
    }

    fn validate_subtree(&self, root: usize) -> bool {
        if root == NULL_NODE {
            return true;
        }
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if node.is_leaf() {
                if node.child2 != NULL_NODE || node.height != 0 || node.data.is_none() {
                    return false;
                }
                continue;
            }

            let (c1, c2) = (node.child1, node.child2);
            if c1 >= self.nodes.len() || c2 >= self.nodes.len() {
                return false;
            }
            let (n1, n2) = (&self.nodes[c1], &self.nodes[c2]);
            if n1.parent != index || n2.parent != index {
                return false;
            }
            if node.height != 1 + n1.height.max(n2.height) {
                return false;
            }
            if node.aabb != n1.aabb.union(&n2.aabb) {
                return false;
            }
            stack.push(c1);
            stack.push(c2);
        }
        true
    }
}
