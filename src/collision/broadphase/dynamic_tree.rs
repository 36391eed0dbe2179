use glam::Vec3A;

use crate::linear_math::Aabb;

pub(crate) const NULL_NODE: u32 = u32::MAX;

#[derive(Clone, Copy, Debug)]
struct TreeNode {
    aabb: Aabb,
    parent: u32,
    children: [u32; 2],
    /// 0 for leaves, -1 for nodes sitting in the free list
    height: i32,
    /// Volume slot for leaves
    item: u32,
}

impl TreeNode {
    const FREE: Self = Self {
        aabb: Aabb::ZERO,
        parent: NULL_NODE,
        children: [NULL_NODE; 2],
        height: -1,
        item: NULL_NODE,
    };

    #[inline]
    const fn is_leaf(&self) -> bool {
        self.children[0] == NULL_NODE
    }
}

/// Binary AABB tree stored in an index arena.
///
/// Leaves hold fat boxes and a `u32` item. Leaf node ids are stable across inserts, removals
/// and rotations of other nodes; only [`DynamicTree::rebuild`] reassigns them.
pub struct DynamicTree {
    nodes: Vec<TreeNode>,
    free_list: Vec<u32>,
    root: u32,
    num_leaves: usize,
    /// Set on every structural change, cleared by `rebuild`
    dirty: bool,
}

impl Default for DynamicTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicTree {
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free_list: Vec::new(),
            root: NULL_NODE,
            num_leaves: 0,
            dirty: false,
        }
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.num_leaves
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.num_leaves == 0
    }

    #[inline]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn height(&self) -> i32 {
        if self.root == NULL_NODE {
            0
        } else {
            self.nodes[self.root as usize].height
        }
    }

    #[inline]
    pub fn leaf_aabb(&self, node: u32) -> Aabb {
        debug_assert!(self.nodes[node as usize].is_leaf());
        self.nodes[node as usize].aabb
    }

    fn alloc_node(&mut self) -> u32 {
        if let Some(id) = self.free_list.pop() {
            id
        } else {
            let id = self.nodes.len() as u32;
            self.nodes.push(TreeNode::FREE);
            id
        }
    }

    fn free_node(&mut self, node: u32) {
        self.nodes[node as usize] = TreeNode::FREE;
        self.free_list.push(node);
    }

    pub fn insert(&mut self, fat_aabb: Aabb, item: u32) -> u32 {
        let leaf = self.alloc_node();
        self.nodes[leaf as usize] = TreeNode {
            aabb: fat_aabb,
            parent: NULL_NODE,
            children: [NULL_NODE; 2],
            height: 0,
            item,
        };

        self.insert_leaf(leaf);
        self.num_leaves += 1;
        self.dirty = true;
        leaf
    }

    pub fn remove(&mut self, leaf: u32) {
        debug_assert!(self.nodes[leaf as usize].is_leaf());
        debug_assert!(self.nodes[leaf as usize].height == 0);

        self.remove_leaf(leaf);
        self.free_node(leaf);
        self.num_leaves -= 1;
        self.dirty = true;
    }

    fn insert_leaf(&mut self, leaf: u32) {
        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf as usize].parent = NULL_NODE;
            return;
        }

        // find the best sibling with the surface area heuristic
        let leaf_aabb = self.nodes[leaf as usize].aabb;
        let mut index = self.root;
        while !self.nodes[index as usize].is_leaf() {
            let node = &self.nodes[index as usize];
            let [child_1, child_2] = node.children;

            let area = node.aabb.area();
            let combined_area = (node.aabb + leaf_aabb).area();

            // cost of making a new parent for this node and the new leaf
            let cost = 2.0 * combined_area;
            // minimum cost of pushing the leaf further down the tree
            let inheritance_cost = 2.0 * (combined_area - area);

            let cost_1 = self.descend_cost(child_1, &leaf_aabb) + inheritance_cost;
            let cost_2 = self.descend_cost(child_2, &leaf_aabb) + inheritance_cost;

            if cost < cost_1 && cost < cost_2 {
                break;
            }

            index = if cost_1 < cost_2 { child_1 } else { child_2 };
        }

        let sibling = index;
        let old_parent = self.nodes[sibling as usize].parent;
        let new_parent = self.alloc_node();
        self.nodes[new_parent as usize] = TreeNode {
            aabb: leaf_aabb + self.nodes[sibling as usize].aabb,
            parent: old_parent,
            children: [sibling, leaf],
            height: self.nodes[sibling as usize].height + 1,
            item: NULL_NODE,
        };

        if old_parent == NULL_NODE {
            self.root = new_parent;
        } else {
            self.replace_child(old_parent, sibling, new_parent);
        }

        self.nodes[sibling as usize].parent = new_parent;
        self.nodes[leaf as usize].parent = new_parent;

        self.fix_upwards(new_parent);
    }

    fn descend_cost(&self, child: u32, leaf_aabb: &Aabb) -> f32 {
        let node = &self.nodes[child as usize];
        let combined = (node.aabb + *leaf_aabb).area();
        if node.is_leaf() {
            combined
        } else {
            combined - node.aabb.area()
        }
    }

    fn remove_leaf(&mut self, leaf: u32) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf as usize].parent;
        let grand_parent = self.nodes[parent as usize].parent;
        let [child_1, child_2] = self.nodes[parent as usize].children;
        let sibling = if child_1 == leaf { child_2 } else { child_1 };

        if grand_parent == NULL_NODE {
            self.root = sibling;
            self.nodes[sibling as usize].parent = NULL_NODE;
            self.free_node(parent);
        } else {
            self.replace_child(grand_parent, parent, sibling);
            self.nodes[sibling as usize].parent = grand_parent;
            self.free_node(parent);

            self.fix_upwards(grand_parent);
        }
    }

    fn replace_child(&mut self, parent: u32, old_child: u32, new_child: u32) {
        let children = &mut self.nodes[parent as usize].children;
        if children[0] == old_child {
            children[0] = new_child;
        } else {
            debug_assert_eq!(children[1], old_child);
            children[1] = new_child;
        }
    }

    /// Refits boxes and heights from `start` to the root, rotating where unbalanced.
    fn fix_upwards(&mut self, start: u32) {
        let mut index = start;
        while index != NULL_NODE {
            index = self.balance(index);

            let [child_1, child_2] = self.nodes[index as usize].children;
            let (node_1, node_2) = (self.nodes[child_1 as usize], self.nodes[child_2 as usize]);

            let node = &mut self.nodes[index as usize];
            node.height = 1 + node_1.height.max(node_2.height);
            node.aabb = node_1.aabb + node_2.aabb;

            index = node.parent;
        }
    }

    /// Performs a left or right rotation if `a` is unbalanced, returning the new subtree root.
    fn balance(&mut self, a: u32) -> u32 {
        let node_a = self.nodes[a as usize];
        if node_a.is_leaf() || node_a.height < 2 {
            return a;
        }

        let [b, c] = node_a.children;
        let balance = self.nodes[c as usize].height - self.nodes[b as usize].height;

        if balance > 1 {
            self.rotate_up(a, c, b, 1)
        } else if balance < -1 {
            self.rotate_up(a, b, c, 0)
        } else {
            a
        }
    }

    /// Promotes `child` (sitting in slot `slot` of `a`) above `a`.
    ///
    /// `a` keeps `other` and adopts the shorter grandchild; `child` keeps the taller one.
    fn rotate_up(&mut self, a: u32, child: u32, other: u32, slot: usize) -> u32 {
        let [f, g] = self.nodes[child as usize].children;
        let parent = self.nodes[a as usize].parent;

        // `child` takes `a`'s place
        self.nodes[child as usize].children[0] = a;
        self.nodes[child as usize].parent = parent;
        self.nodes[a as usize].parent = child;

        if parent == NULL_NODE {
            self.root = child;
        } else {
            self.replace_child(parent, a, child);
        }

        let (taller, shorter) = if self.nodes[f as usize].height > self.nodes[g as usize].height {
            (f, g)
        } else {
            (g, f)
        };

        self.nodes[child as usize].children[1] = taller;
        self.nodes[a as usize].children[slot] = shorter;
        self.nodes[shorter as usize].parent = a;

        let other_node = self.nodes[other as usize];
        let shorter_node = self.nodes[shorter as usize];
        let taller_node = self.nodes[taller as usize];

        let node_a = &mut self.nodes[a as usize];
        node_a.aabb = other_node.aabb + shorter_node.aabb;
        node_a.height = 1 + other_node.height.max(shorter_node.height);
        let node_a = *node_a;

        let node_child = &mut self.nodes[child as usize];
        node_child.aabb = node_a.aabb + taller_node.aabb;
        node_child.height = 1 + node_a.height.max(taller_node.height);

        child
    }

    /// Visits every leaf whose fat box passes `test_node`, until `visit` returns `false`.
    pub fn query<N, V>(&self, test_node: N, mut visit: V)
    where
        N: Fn(&Aabb) -> bool,
        V: FnMut(u32) -> bool,
    {
        if self.root == NULL_NODE {
            return;
        }

        let mut stack = Vec::with_capacity(64);
        stack.push(self.root);

        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            if !test_node(&node.aabb) {
                continue;
            }

            if node.is_leaf() {
                if !visit(node.item) {
                    return;
                }
            } else {
                stack.extend(node.children);
            }
        }
    }

    /// Rebuilds the whole tree top-down, splitting on the axis of largest centroid variance.
    ///
    /// Every leaf gets a new node id, reported through `remap(item, new_leaf)`.
    pub fn rebuild<F: FnMut(u32, u32)>(&mut self, mut remap: F) {
        let mut leaves: Vec<(u32, Aabb)> = self
            .nodes
            .iter()
            .filter(|node| node.height == 0)
            .map(|node| (node.item, node.aabb))
            .collect();

        debug_assert_eq!(leaves.len(), self.num_leaves);

        self.nodes.clear();
        self.free_list.clear();
        self.root = NULL_NODE;
        self.dirty = false;

        if leaves.is_empty() {
            return;
        }

        self.nodes.reserve(leaves.len() * 2 - 1);
        self.root = self.build_tree(&mut leaves, NULL_NODE, &mut remap);
    }

    fn build_tree<F: FnMut(u32, u32)>(
        &mut self,
        leaves: &mut [(u32, Aabb)],
        parent: u32,
        remap: &mut F,
    ) -> u32 {
        debug_assert!(!leaves.is_empty());

        if let [(item, aabb)] = *leaves {
            let leaf = self.alloc_node();
            self.nodes[leaf as usize] = TreeNode {
                aabb,
                parent,
                children: [NULL_NODE; 2],
                height: 0,
                item,
            };

            remap(item, leaf);
            return leaf;
        }

        let means = Self::calc_means(leaves);
        let split_axis = Self::calc_splitting_axis(leaves, means);
        let split_index = Self::sort_and_calc_splitting_index(leaves, split_axis, means);

        let internal_node = self.alloc_node();
        let (left, right) = leaves.split_at_mut(split_index);
        let child_1 = self.build_tree(left, internal_node, remap);
        let child_2 = self.build_tree(right, internal_node, remap);

        let (node_1, node_2) = (self.nodes[child_1 as usize], self.nodes[child_2 as usize]);
        self.nodes[internal_node as usize] = TreeNode {
            aabb: node_1.aabb + node_2.aabb,
            parent,
            children: [child_1, child_2],
            height: 1 + node_1.height.max(node_2.height),
            item: NULL_NODE,
        };

        internal_node
    }

    fn calc_means(leaves: &[(u32, Aabb)]) -> Vec3A {
        let sum: Vec3A = leaves.iter().map(|(_, aabb)| aabb.center()).sum();
        sum / leaves.len() as f32
    }

    fn calc_splitting_axis(leaves: &[(u32, Aabb)], means: Vec3A) -> usize {
        let mut variance = Vec3A::ZERO;
        for (_, aabb) in leaves {
            let diff = aabb.center() - means;
            variance += diff * diff;
        }

        variance /= (leaves.len() - 1) as f32;
        variance.max_position()
    }

    fn sort_and_calc_splitting_index(
        leaves: &mut [(u32, Aabb)],
        split_axis: usize,
        means: Vec3A,
    ) -> usize {
        let num_indices = leaves.len();
        let split_value = means[split_axis];

        let mut split_index = 0;
        for i in 0..num_indices {
            if leaves[i].1.center()[split_axis] > split_value {
                leaves.swap(i, split_index);
                split_index += 1;
            }
        }

        // fall back to a median split when the partition is lopsided
        let range_balanced_indices = num_indices / 3;
        let unbalanced = split_index <= range_balanced_indices
            || split_index >= num_indices - 1 - range_balanced_indices;

        if unbalanced {
            split_index = num_indices >> 1;
        }

        debug_assert_ne!(split_index, 0, "tree is unbalanced");
        debug_assert_ne!(split_index, num_indices, "tree is unbalanced");

        split_index
    }

    /// Checks parent links, heights and box containment for the whole tree.
    #[cfg(test)]
    pub(crate) fn validate(&self) {
        if self.root == NULL_NODE {
            assert_eq!(self.num_leaves, 0);
            return;
        }

        assert_eq!(self.nodes[self.root as usize].parent, NULL_NODE);
        let mut leaves = 0;
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            let node = self.nodes[index as usize];
            if node.is_leaf() {
                assert_eq!(node.height, 0);
                leaves += 1;
                continue;
            }

            for child in node.children {
                let child_node = self.nodes[child as usize];
                assert_eq!(child_node.parent, index);
                assert!(node.aabb.contains(&child_node.aabb));
                stack.push(child);
            }

            let [c1, c2] = node.children.map(|c| self.nodes[c as usize].height);
            assert_eq!(node.height, 1 + c1.max(c2));
        }

        assert_eq!(leaves, self.num_leaves);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(x: f32, size: f32) -> Aabb {
        Aabb::new(Vec3A::new(x, 0.0, 0.0), Vec3A::new(x + size, size, size))
    }

    fn collect(tree: &DynamicTree, aabb: &Aabb) -> Vec<u32> {
        let mut items = Vec::new();
        tree.query(
            |node| node.intersects(aabb),
            |item| {
                items.push(item);
                true
            },
        );
        items.sort_unstable();
        items
    }

    #[test]
    fn insert_query_remove() {
        let mut tree = DynamicTree::new();
        let leaves: Vec<u32> = (0..64).map(|i| tree.insert(cube(i as f32 * 2.0, 1.0), i)).collect();
        tree.validate();
        assert_eq!(tree.len(), 64);

        assert_eq!(collect(&tree, &cube(10.0, 0.5)), vec![5]);
        assert_eq!(collect(&tree, &cube(9.5, 3.0)), vec![4, 5, 6]);

        for &leaf in leaves.iter().step_by(2) {
            tree.remove(leaf);
        }
        tree.validate();
        assert_eq!(tree.len(), 32);
        assert_eq!(collect(&tree, &cube(9.5, 3.0)), vec![5]);
    }

    #[test]
    fn stays_balanced_for_sorted_input() {
        let mut tree = DynamicTree::new();
        for i in 0..1024 {
            tree.insert(cube(i as f32, 0.5), i);
        }

        tree.validate();
        assert!(tree.height() <= 20, "height {}", tree.height());
    }

    #[test]
    fn rebuild_remaps_every_leaf() {
        let mut tree = DynamicTree::new();
        for i in 0..100 {
            tree.insert(cube((i * 37 % 100) as f32, 1.5), i);
        }

        let mut remapped = vec![NULL_NODE; 100];
        tree.rebuild(|item, leaf| remapped[item as usize] = leaf);
        tree.validate();

        assert!(!tree.is_dirty());
        assert!(remapped.iter().all(|&leaf| leaf != NULL_NODE));
        for (item, &leaf) in remapped.iter().enumerate() {
            let x = (item * 37 % 100) as f32;
            assert_eq!(tree.leaf_aabb(leaf), cube(x, 1.5));
        }
    }

    #[test]
    fn query_can_stop_early() {
        let mut tree = DynamicTree::new();
        for i in 0..10 {
            tree.insert(cube(0.0, 1.0), i);
        }

        let mut visited = 0;
        tree.query(
            |_| true,
            |_| {
                visited += 1;
                visited < 3
            },
        );
        assert_eq!(visited, 3);
    }
}
