//! Broad phase: finds potentially overlapping pairs of proxies
//! based on their fat AABBs in a [`DynamicTree`].
//!
//! Only proxies that were created or had to be reinserted since the last
//! update are queried, so the cost of pair finding is proportional to the
//! amount of movement rather than the size of the world.

use super::{
    aabb::{RayCastInput, AABB},
    dynamic_tree::{DynamicTree, ProxyId},
};
use crate::math::Vec2;

#[derive(Clone, Debug)]
pub struct BroadPhase<T> {
    tree: DynamicTree<T>,
    proxy_count: usize,
    move_buffer: Vec<ProxyId>,
    pair_buffer: Vec<(ProxyId, ProxyId)>,
}

impl<T: Copy> Default for BroadPhase<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> BroadPhase<T> {
    pub fn new() -> Self {
        Self {
            tree: DynamicTree::new(),
            proxy_count: 0,
            move_buffer: Vec::new(),
            pair_buffer: Vec::new(),
        }
    }

    /// Create a proxy with a tight AABB.
    /// A pair is not reported until [`update_pairs`][Self::update_pairs] is called.
    pub fn create_proxy(&mut self, aabb: AABB, user_data: T) -> ProxyId {
        let proxy = self.tree.create_proxy(aabb, user_data);
        self.proxy_count += 1;
        self.move_buffer.push(proxy);
        proxy
    }

    /// Destroy a proxy. Any pairs it was in are up to the caller to remove.
    pub fn destroy_proxy(&mut self, proxy: ProxyId) {
        self.move_buffer.retain(|p| *p != proxy);
        self.proxy_count -= 1;
        self.tree.destroy_proxy(proxy);
    }

    /// Update the AABB of a proxy.
    /// Call as many times as you like, then call `update_pairs` to finalize.
    pub fn move_proxy(&mut self, proxy: ProxyId, aabb: AABB, displacement: Vec2) {
        if self.tree.move_proxy(proxy, aabb, displacement) {
            self.move_buffer.push(proxy);
        }
    }

    /// Mark a proxy as moved so that its pairs are found on the next update
    /// even if it didn't actually move.
    pub fn touch_proxy(&mut self, proxy: ProxyId) {
        self.move_buffer.push(proxy);
    }

    #[inline]
    pub fn fat_aabb(&self, proxy: ProxyId) -> AABB {
        self.tree.fat_aabb(proxy)
    }

    #[inline]
    pub fn user_data(&self, proxy: ProxyId) -> T {
        self.tree.user_data(proxy)
    }

    #[inline]
    pub fn test_overlap(&self, a: ProxyId, b: ProxyId) -> bool {
        self.tree.fat_aabb(a).overlaps(&self.tree.fat_aabb(b))
    }

    #[inline]
    pub fn proxy_count(&self) -> usize {
        self.proxy_count
    }

    #[inline]
    pub fn tree(&self) -> &DynamicTree<T> {
        &self.tree
    }

    /// Find new pairs involving moved proxies and report each of them once.
    pub fn update_pairs(&mut self, mut callback: impl FnMut(T, T)) {
        let Self {
            tree,
            move_buffer,
            pair_buffer,
            ..
        } = self;

        pair_buffer.clear();
        for &query_proxy in move_buffer.iter() {
            let fat = tree.fat_aabb(query_proxy);
            tree.query(&fat, |proxy| {
                // a proxy doesn't pair with itself
                if proxy != query_proxy {
                    pair_buffer.push((proxy.min(query_proxy), proxy.max(query_proxy)));
                }
                true
            });
        }
        move_buffer.clear();

        // two moved proxies find each other twice
        pair_buffer.sort_unstable();
        pair_buffer.dedup();

        for &(a, b) in pair_buffer.iter() {
            callback(tree.user_data(a), tree.user_data(b));
        }
    }

    pub fn query(&self, aabb: &AABB, callback: impl FnMut(ProxyId) -> bool) {
        self.tree.query(aabb, callback);
    }

    pub fn raycast(
        &self,
        input: &RayCastInput,
        callback: impl FnMut(&RayCastInput, ProxyId) -> f64,
    ) {
        self.tree.raycast(input, callback);
    }

    pub fn shift_origin(&mut self, new_origin: Vec2) {
        self.tree.shift_origin(new_origin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f64, half: f64) -> AABB {
        AABB::new(Vec2::new(x - half, -half), Vec2::new(x + half, half))
    }

    fn collect_pairs(bp: &mut BroadPhase<u32>) -> Vec<(u32, u32)> {
        let mut pairs = Vec::new();
        bp.update_pairs(|a, b| pairs.push((a.min(b), a.max(b))));
        pairs.sort_unstable();
        pairs
    }

    #[test]
    fn reports_each_pair_once() {
        let mut bp = BroadPhase::new();
        bp.create_proxy(square(0.0, 1.0), 0);
        bp.create_proxy(square(1.5, 1.0), 1);
        bp.create_proxy(square(10.0, 1.0), 2);
        assert_eq!(bp.proxy_count(), 3);
        itertools::assert_equal(collect_pairs(&mut bp), [(0, 1)]);

        // nothing moved, nothing reported
        assert!(collect_pairs(&mut bp).is_empty());
    }

    #[test]
    fn only_moved_proxies_are_queried() {
        let mut bp = BroadPhase::new();
        let a = bp.create_proxy(square(0.0, 1.0), 0);
        let c = bp.create_proxy(square(10.0, 1.0), 2);
        collect_pairs(&mut bp);

        // small move stays within the fat AABB
        bp.move_proxy(a, square(0.05, 1.0), Vec2::new(0.05, 0.0));
        assert!(collect_pairs(&mut bp).is_empty());

        // moving next to the other proxy
        bp.move_proxy(a, square(8.5, 1.0), Vec2::new(8.45, 0.0));
        itertools::assert_equal(collect_pairs(&mut bp), [(0, 2)]);
        assert!(bp.test_overlap(a, c));

        bp.touch_proxy(c);
        itertools::assert_equal(collect_pairs(&mut bp), [(0, 2)]);

        bp.destroy_proxy(a);
        bp.touch_proxy(c);
        assert!(collect_pairs(&mut bp).is_empty());
        assert_eq!(bp.proxy_count(), 1);
    }
}
