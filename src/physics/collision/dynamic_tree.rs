//! A dynamic AABB tree for broad phase collision detection.
//!
//! Leaves hold proxies with fattened AABBs so that small movements
//! don't require restructuring the tree. Internal nodes are balanced with
//! tree rotations on every insertion and removal, using the surface area
//! (perimeter in 2D) heuristic to decide where new leaves go.

use super::aabb::{RayCastInput, AABB};
use crate::{
    math::{self as m, Vec2},
    settings::{AABB_EXTENSION, AABB_MULTIPLIER},
};

/// Handle to a leaf of a [`DynamicTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProxyId(pub(crate) usize);

#[derive(Clone, Copy, Debug)]
enum NodeKind<T> {
    Branch { child1: usize, child2: usize },
    Leaf { user_data: T },
    Free { next: Option<usize> },
}

#[derive(Clone, Copy, Debug)]
struct Node<T> {
    aabb: AABB,
    parent: Option<usize>,
    kind: NodeKind<T>,
    /// Leaves are at height 0, free nodes at -1.
    height: i32,
}

/// A bounding volume hierarchy of fat AABBs carrying user data of type `T`.
#[derive(Clone, Debug)]
pub struct DynamicTree<T> {
    nodes: Vec<Node<T>>,
    root: Option<usize>,
    free_list: Option<usize>,
}

impl<T: Copy> Default for DynamicTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> DynamicTree<T> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            free_list: None,
        }
    }

    fn allocate_node(&mut self, node: Node<T>) -> usize {
        match self.free_list {
            Some(idx) => {
                if let NodeKind::Free { next } = self.nodes[idx].kind {
                    self.free_list = next;
                }
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn free_node(&mut self, idx: usize) {
        let node = &mut self.nodes[idx];
        node.kind = NodeKind::Free {
            next: self.free_list,
        };
        node.parent = None;
        node.height = -1;
        self.free_list = Some(idx);
    }

    #[inline]
    fn children(&self, idx: usize) -> Option<(usize, usize)> {
        match self.nodes[idx].kind {
            NodeKind::Branch { child1, child2 } => Some((child1, child2)),
            _ => None,
        }
    }

    #[inline]
    fn set_children(&mut self, idx: usize, child1: usize, child2: usize) {
        self.nodes[idx].kind = NodeKind::Branch { child1, child2 };
    }

    /// Point whatever referred to `old_child` as its child to `new_child` instead.
    fn replace_child(&mut self, parent: Option<usize>, old_child: usize, new_child: usize) {
        match parent {
            Some(p) => {
                if let Some((c1, c2)) = self.children(p) {
                    if c1 == old_child {
                        self.set_children(p, new_child, c2);
                    } else {
                        self.set_children(p, c1, new_child);
                    }
                }
            }
            None => self.root = Some(new_child),
        }
    }

    //
    // Proxy API
    //

    /// Create a proxy in the tree as a leaf node.
    /// The stored AABB is `aabb` fattened by [`AABB_EXTENSION`].
    pub fn create_proxy(&mut self, aabb: AABB, user_data: T) -> ProxyId {
        let idx = self.allocate_node(Node {
            aabb: aabb.padded(AABB_EXTENSION),
            parent: None,
            kind: NodeKind::Leaf { user_data },
            height: 0,
        });
        self.insert_leaf(idx);
        ProxyId(idx)
    }

    pub fn destroy_proxy(&mut self, proxy: ProxyId) {
        debug_assert!(self.is_leaf(proxy.0), "destroyed a proxy that wasn't a leaf");
        self.remove_leaf(proxy.0);
        self.free_node(proxy.0);
    }

    /// Move a proxy to a new tight AABB with the given swept displacement.
    ///
    /// Returns `true` if the fat AABB had to be rebuilt,
    /// in which case the proxy should be checked for new pairs.
    /// If the new AABB still fits inside the old fat one, nothing changes.
    pub fn move_proxy(&mut self, proxy: ProxyId, aabb: AABB, displacement: Vec2) -> bool {
        let idx = proxy.0;
        debug_assert!(self.is_leaf(idx), "moved a proxy that wasn't a leaf");

        if self.nodes[idx].aabb.contains(&aabb) {
            return false;
        }

        self.remove_leaf(idx);

        // extend the AABB and predict where it's going
        let mut fat = aabb.padded(AABB_EXTENSION);
        let d = AABB_MULTIPLIER * displacement;
        if d.x < 0.0 {
            fat.lower.x += d.x;
        } else {
            fat.upper.x += d.x;
        }
        if d.y < 0.0 {
            fat.lower.y += d.y;
        } else {
            fat.upper.y += d.y;
        }
        self.nodes[idx].aabb = fat;

        self.insert_leaf(idx);
        true
    }

    #[inline]
    fn is_leaf(&self, idx: usize) -> bool {
        matches!(self.nodes.get(idx), Some(Node { kind: NodeKind::Leaf { .. }, .. }))
    }

    #[inline]
    pub fn fat_aabb(&self, proxy: ProxyId) -> AABB {
        self.nodes[proxy.0].aabb
    }

    /// Get the user data of a proxy.
    ///
    /// # Panics
    ///
    /// If the proxy has been destroyed.
    #[inline]
    pub fn user_data(&self, proxy: ProxyId) -> T {
        match self.nodes[proxy.0].kind {
            NodeKind::Leaf { user_data } => user_data,
            _ => panic!("Proxy {:?} does not exist", proxy),
        }
    }

    //
    // Insertion and removal
    //

    fn insert_leaf(&mut self, leaf: usize) {
        let Some(root) = self.root else {
            self.root = Some(leaf);
            self.nodes[leaf].parent = None;
            return;
        };

        // find the best sibling for the new leaf
        let leaf_aabb = self.nodes[leaf].aabb;
        let mut index = root;
        while let Some((child1, child2)) = self.children(index) {
            let area = self.nodes[index].aabb.perimeter();
            let combined_area = self.nodes[index].aabb.union(&leaf_aabb).perimeter();

            // cost of creating a new parent for this node and the new leaf
            let cost = 2.0 * combined_area;
            // minimum cost of pushing the leaf further down the tree
            let inheritance_cost = 2.0 * (combined_area - area);

            let descend_cost = |child: usize| {
                let child_node = &self.nodes[child];
                let union_area = leaf_aabb.union(&child_node.aabb).perimeter();
                match child_node.kind {
                    NodeKind::Leaf { .. } => union_area + inheritance_cost,
                    _ => union_area - child_node.aabb.perimeter() + inheritance_cost,
                }
            };
            let cost1 = descend_cost(child1);
            let cost2 = descend_cost(child2);

            if cost < cost1 && cost < cost2 {
                break;
            }
            index = if cost1 < cost2 { child1 } else { child2 };
        }
        let sibling = index;

        // create a new parent for the sibling and the leaf
        let old_parent = self.nodes[sibling].parent;
        let new_parent = self.allocate_node(Node {
            aabb: leaf_aabb.union(&self.nodes[sibling].aabb),
            parent: old_parent,
            kind: NodeKind::Branch {
                child1: sibling,
                child2: leaf,
            },
            height: self.nodes[sibling].height + 1,
        });
        self.replace_child(old_parent, sibling, new_parent);
        self.nodes[sibling].parent = Some(new_parent);
        self.nodes[leaf].parent = Some(new_parent);

        // walk back up the tree fixing heights and AABBs
        self.refit_from(self.nodes[leaf].parent);
    }

    fn remove_leaf(&mut self, leaf: usize) {
        if self.root == Some(leaf) {
            self.root = None;
            return;
        }

        let Some(parent) = self.nodes[leaf].parent else {
            return;
        };
        let grandparent = self.nodes[parent].parent;
        let sibling = match self.children(parent) {
            Some((c1, c2)) if c1 == leaf => c2,
            Some((c1, _)) => c1,
            None => return,
        };

        // the sibling takes the place of the parent
        self.replace_child(grandparent, parent, sibling);
        self.nodes[sibling].parent = grandparent;
        self.free_node(parent);
        self.nodes[leaf].parent = None;

        self.refit_from(grandparent);
    }

    /// Rebalance and recompute bounds of every node from `start` to the root.
    fn refit_from(&mut self, start: Option<usize>) {
        let mut index = start;
        while let Some(i) = index {
            let i = self.balance(i);
            if let Some((c1, c2)) = self.children(i) {
                self.nodes[i].height = 1 + self.nodes[c1].height.max(self.nodes[c2].height);
                self.nodes[i].aabb = self.nodes[c1].aabb.union(&self.nodes[c2].aabb);
            }
            index = self.nodes[i].parent;
        }
    }

    /// Perform a left or right rotation if node A is imbalanced.
    /// Returns the index of the node now at A's position.
    fn balance(&mut self, ia: usize) -> usize {
        if self.nodes[ia].height < 2 {
            return ia;
        }
        let Some((ib, ic)) = self.children(ia) else {
            return ia;
        };

        let balance = self.nodes[ic].height - self.nodes[ib].height;
        if balance > 1 {
            self.rotate_up(ia, ic, ib, Side::Second)
        } else if balance < -1 {
            self.rotate_up(ia, ib, ic, Side::First)
        } else {
            ia
        }
    }

    /// Rotate child `ic` of `ia` up to replace `ia`.
    /// `ib` is the other child, `side` tells which child slot of `ia` held `ic`.
    fn rotate_up(&mut self, ia: usize, ic: usize, ib: usize, side: Side) -> usize {
        let Some((i_f, i_g)) = self.children(ic) else {
            return ia;
        };

        // swap A and C
        let a_parent = self.nodes[ia].parent;
        self.nodes[ic].parent = a_parent;
        self.nodes[ia].parent = Some(ic);
        self.replace_child(a_parent, ia, ic);

        // the taller grandchild stays under C, the shorter one moves under A
        let (keep, give) = if self.nodes[i_f].height > self.nodes[i_g].height {
            (i_f, i_g)
        } else {
            (i_g, i_f)
        };
        self.set_children(ic, ia, keep);
        match side {
            Side::Second => self.set_children(ia, ib, give),
            Side::First => self.set_children(ia, give, ib),
        }
        self.nodes[give].parent = Some(ia);

        self.nodes[ia].aabb = self.nodes[ib].aabb.union(&self.nodes[give].aabb);
        self.nodes[ic].aabb = self.nodes[ia].aabb.union(&self.nodes[keep].aabb);
        self.nodes[ia].height = 1 + self.nodes[ib].height.max(self.nodes[give].height);
        self.nodes[ic].height = 1 + self.nodes[ia].height.max(self.nodes[keep].height);

        ic
    }

    //
    // Queries
    //

    /// Call `callback` with every proxy whose fat AABB overlaps `aabb`.
    /// The query stops as soon as the callback returns `false`.
    pub fn query(&self, aabb: &AABB, mut callback: impl FnMut(ProxyId) -> bool) {
        let mut stack: Vec<usize> = Vec::with_capacity(64);
        stack.extend(self.root);
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if !node.aabb.overlaps(aabb) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf { .. } => {
                    if !callback(ProxyId(idx)) {
                        return;
                    }
                }
                NodeKind::Branch { child1, child2 } => {
                    stack.push(child1);
                    stack.push(child2);
                }
                NodeKind::Free { .. } => {}
            }
        }
    }

    /// Cast a ray against the proxies in the tree.
    ///
    /// `callback` is given the ray clipped to the current max fraction and a proxy
    /// whose fat AABB the ray passes through. Its return value controls the cast:
    /// `0` terminates, a negative value ignores the proxy and continues,
    /// and a positive value clips the ray to that fraction.
    pub fn raycast(
        &self,
        input: &RayCastInput,
        mut callback: impl FnMut(&RayCastInput, ProxyId) -> f64,
    ) {
        let p1 = input.p1;
        let p2 = input.p2;
        let r = p2 - p1;
        if r.mag_sq() <= 0.0 {
            return;
        }
        let r = r.normalized();

        // v is perpendicular to the segment
        let v = m::cross_sv(1.0, r);
        let abs_v = m::vec_abs(v);

        let mut max_fraction = input.max_fraction;
        let mut segment_aabb = AABB::from_points(p1, p1 + max_fraction * (p2 - p1));

        let mut stack: Vec<usize> = Vec::with_capacity(64);
        stack.extend(self.root);
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if !node.aabb.overlaps(&segment_aabb) {
                continue;
            }

            // separating axis for segment: |dot(v, p1 - c)| > dot(|v|, h)
            let c = node.aabb.center();
            let h = node.aabb.extents();
            let separation = v.dot(p1 - c).abs() - abs_v.dot(h);
            if separation > 0.0 {
                continue;
            }

            match node.kind {
                NodeKind::Leaf { .. } => {
                    let sub_input = RayCastInput {
                        p1,
                        p2,
                        max_fraction,
                    };
                    let value = callback(&sub_input, ProxyId(idx));
                    if value == 0.0 {
                        // the client has terminated the ray cast
                        return;
                    }
                    if value > 0.0 {
                        max_fraction = value;
                        segment_aabb = AABB::from_points(p1, p1 + max_fraction * (p2 - p1));
                    }
                }
                NodeKind::Branch { child1, child2 } => {
                    stack.push(child1);
                    stack.push(child2);
                }
                NodeKind::Free { .. } => {}
            }
        }
    }

    //
    // Diagnostics
    //

    /// Height of the tree. An empty tree has height 0, as does a single leaf.
    pub fn height(&self) -> i32 {
        self.root.map(|r| self.nodes[r].height).unwrap_or(0)
    }

    /// The largest height difference between the two children of any node.
    pub fn max_balance(&self) -> i32 {
        self.nodes
            .iter()
            .filter_map(|n| match n.kind {
                NodeKind::Branch { child1, child2 } => {
                    Some((self.nodes[child2].height - self.nodes[child1].height).abs())
                }
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Ratio of the sum of all node perimeters to the root perimeter.
    /// A measure of tree quality; lower is better.
    pub fn area_ratio(&self) -> f64 {
        let Some(root) = self.root else {
            return 0.0;
        };
        let root_area = self.nodes[root].aabb.perimeter();
        let total_area: f64 = self
            .nodes
            .iter()
            .filter(|n| n.height >= 0)
            .map(|n| n.aabb.perimeter())
            .sum();
        total_area / root_area
    }

    /// Shift the coordinate origin of every node by subtracting `new_origin`.
    pub fn shift_origin(&mut self, new_origin: Vec2) {
        for node in &mut self.nodes {
            node.aabb.lower -= new_origin;
            node.aabb.upper -= new_origin;
        }
    }

    /// Check the structural invariants of the tree, panicking if any are violated.
    /// Intended for tests and debugging.
    pub fn validate(&self) {
        let mut stack: Vec<(usize, Option<usize>)> = Vec::new();
        stack.extend(self.root.map(|r| (r, None)));
        let mut reachable = 0;
        while let Some((idx, expected_parent)) = stack.pop() {
            reachable += 1;
            let node = &self.nodes[idx];
            assert_eq!(node.parent, expected_parent, "bad parent link at {}", idx);
            match node.kind {
                NodeKind::Leaf { .. } => assert_eq!(node.height, 0),
                NodeKind::Branch { child1, child2 } => {
                    let (n1, n2) = (&self.nodes[child1], &self.nodes[child2]);
                    assert_eq!(node.height, 1 + n1.height.max(n2.height));
                    assert!(node.aabb.contains(&n1.aabb) && node.aabb.contains(&n2.aabb));
                    stack.push((child1, Some(idx)));
                    stack.push((child2, Some(idx)));
                }
                NodeKind::Free { .. } => panic!("free node {} reachable from root", idx),
            }
        }

        let mut free = 0;
        let mut next = self.free_list;
        while let Some(idx) = next {
            free += 1;
            match self.nodes[idx].kind {
                NodeKind::Free { next: n } => next = n,
                _ => panic!("node {} in free list is in use", idx),
            }
        }
        assert_eq!(reachable + free, self.nodes.len(), "leaked tree nodes");
    }
}

#[derive(Clone, Copy, Debug)]
enum Side {
    First,
    Second,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    fn square(x: f64, y: f64, half: f64) -> AABB {
        AABB::new(Vec2::new(x - half, y - half), Vec2::new(x + half, y + half))
    }

    #[test]
    fn move_within_margin_is_free() {
        let mut tree: DynamicTree<u32> = DynamicTree::new();
        let p = tree.create_proxy(square(0.0, 0.0, 0.5), 7);
        assert_eq!(tree.user_data(p), 7);
        assert!(tree.fat_aabb(p).contains(&square(0.0, 0.0, 0.5 + AABB_EXTENSION)));

        // half the margin, still inside the fat AABB
        let small = Vec2::new(0.5 * AABB_EXTENSION, 0.0);
        assert!(!tree.move_proxy(p, square(small.x, 0.0, 0.5), small));

        // beyond the margin
        let big = Vec2::new(2.0 * AABB_EXTENSION, 0.0);
        assert!(tree.move_proxy(p, square(big.x, 0.0, 0.5), big));
        // the new fat AABB is predicted further in the direction of motion
        let fat = tree.fat_aabb(p);
        assert!(fat.upper.x > big.x + 0.5 + AABB_EXTENSION);
        assert!((fat.lower.x - (big.x - 0.5 - AABB_EXTENSION)).abs() < 1e-12);
        tree.validate();
    }

    #[test]
    fn query_matches_brute_force() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
        let mut tree: DynamicTree<usize> = DynamicTree::new();
        let mut proxies = Vec::new();
        for i in 0..200 {
            let aabb = square(
                rng.gen_range(-50.0..50.0),
                rng.gen_range(-50.0..50.0),
                rng.gen_range(0.1..3.0),
            );
            proxies.push((tree.create_proxy(aabb, i), aabb));
        }
        // move some and remove some
        for (i, (proxy, aabb)) in proxies.iter_mut().enumerate() {
            if i % 3 == 0 {
                let d = Vec2::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0));
                let moved = AABB::new(aabb.lower + d, aabb.upper + d);
                tree.move_proxy(*proxy, moved, d);
                *aabb = moved;
            }
        }
        let removed: Vec<_> = proxies.drain(..).enumerate().collect();
        let mut live = Vec::new();
        for (i, (proxy, aabb)) in removed {
            if i % 5 == 0 {
                tree.destroy_proxy(proxy);
            } else {
                live.push((proxy, aabb));
            }
        }
        tree.validate();

        for _ in 0..50 {
            let q = square(
                rng.gen_range(-50.0..50.0),
                rng.gen_range(-50.0..50.0),
                rng.gen_range(1.0..10.0),
            );
            let mut found = Vec::new();
            tree.query(&q, |p| {
                found.push(p);
                true
            });
            found.sort();
            let mut expected: Vec<_> = live
                .iter()
                .filter(|(p, _)| tree.fat_aabb(*p).overlaps(&q))
                .map(|(p, _)| *p)
                .collect();
            expected.sort();
            itertools::assert_equal(found, expected);

            // every tight AABB that overlaps must have been found through its fat AABB
            for (p, aabb) in &live {
                if aabb.overlaps(&q) {
                    assert!(tree.fat_aabb(*p).overlaps(&q));
                }
            }
        }
    }

    #[test]
    fn stays_balanced() {
        let mut tree: DynamicTree<()> = DynamicTree::new();
        // worst case input for a naive tree: sorted along a line
        let proxies: Vec<_> = (0..256)
            .map(|i| tree.create_proxy(square(i as f64, 0.0, 0.4), ()))
            .collect();
        tree.validate();
        assert!(tree.height() <= 32, "tree height {}", tree.height());
        assert!(tree.area_ratio() > 1.0);

        for p in proxies.iter().step_by(2) {
            tree.destroy_proxy(*p);
        }
        tree.validate();
        assert!(tree.height() <= 28, "tree height {}", tree.height());
    }

    #[test]
    fn query_can_stop_early() {
        let mut tree: DynamicTree<u8> = DynamicTree::new();
        for i in 0..10 {
            tree.create_proxy(square(0.0, 0.0, 1.0 + i as f64), 0);
        }
        let mut count = 0;
        tree.query(&square(0.0, 0.0, 0.1), |_| {
            count += 1;
            count < 3
        });
        assert_eq!(count, 3);
    }

    #[test]
    fn raycast_clips_to_closest() {
        let mut tree: DynamicTree<usize> = DynamicTree::new();
        let boxes: Vec<_> = (0..5).map(|i| square(2.0 + 3.0 * i as f64, 0.0, 0.5)).collect();
        for (i, b) in boxes.iter().enumerate().rev() {
            tree.create_proxy(*b, i);
        }
        // one box off the ray entirely
        tree.create_proxy(square(5.0, 10.0, 0.5), 99);

        let input = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(20.0, 0.0),
            max_fraction: 1.0,
        };
        let mut closest = None;
        let mut visited = Vec::new();
        tree.raycast(&input, |sub, proxy| {
            let idx = tree.user_data(proxy);
            visited.push(idx);
            match boxes.get(idx).and_then(|b| b.raycast(sub)) {
                Some(hit) => {
                    closest = Some(idx);
                    hit.fraction
                }
                None => -1.0,
            }
        });
        assert_eq!(closest, Some(0));
        assert!(!visited.contains(&99));
    }
}
