use glam::Vec2;

use super::{
    aabb::{Aabb, RayCastInput},
    dynamic_tree::{DynamicTree, ProxyId, NULL_NODE},
};

/// Broad phase driver: owns the dynamic tree and reports new candidate pairs.
///
/// Only proxies that were created, re-inserted or touched since the last
/// [`BroadPhase::update_pairs`] are queried, so resting bodies cost nothing here.
#[derive(Debug, Clone)]
pub struct BroadPhase<T> {
    tree: DynamicTree<T>,
    move_buffer: Vec<ProxyId>,
    pair_buffer: Vec<(ProxyId, ProxyId)>,
    proxy_count: usize,
}

impl<T> Default for BroadPhase<T> {
    fn default() -> Self {
        Self {
            tree: DynamicTree::default(),
            move_buffer: Vec::new(),
            pair_buffer: Vec::new(),
            proxy_count: 0,
        }
    }
}

impl<T: Copy> BroadPhase<T> {
    pub fn new(margin: f32, multiplier: f32) -> Self {
        Self {
            tree: DynamicTree::new(margin, multiplier),
            move_buffer: Vec::with_capacity(16),
            pair_buffer: Vec::with_capacity(16),
            proxy_count: 0,
        }
    }

    pub fn create_proxy(&mut self, aabb: Aabb, data: T) -> ProxyId {
        let id = self.tree.create_proxy(aabb, data);
        self.proxy_count += 1;
        self.buffer_move(id);
        id
    }

    pub fn destroy_proxy(&mut self, id: ProxyId) {
        self.unbuffer_move(id);
        if self.tree.destroy_proxy(id).is_some() {
            self.proxy_count -= 1;
        }
    }

    /// Forwards to [`DynamicTree::move_proxy`] and queues the proxy when it was re-inserted.
    pub fn move_proxy(&mut self, id: ProxyId, aabb: Aabb, displacement: Vec2) {
        if self.tree.move_proxy(id, aabb, displacement) {
            self.buffer_move(id);
        }
    }

    /// Forces pair discovery for `id` on the next update (used after filter changes).
    pub fn touch_proxy(&mut self, id: ProxyId) {
        self.buffer_move(id);
    }

    pub fn fat_aabb(&self, id: ProxyId) -> Option<Aabb> {
        self.tree.fat_aabb(id)
    }

    pub fn user_data(&self, id: ProxyId) -> Option<T> {
        self.tree.user_data(id).copied()
    }

    /// Whether the fat boxes of two proxies overlap.
    pub fn test_overlap(&self, a: ProxyId, b: ProxyId) -> bool {
        match (self.tree.fat_aabb(a), self.tree.fat_aabb(b)) {
            (Some(a), Some(b)) => a.overlaps(&b),
            _ => false,
        }
    }

    pub fn proxy_count(&self) -> usize {
        self.proxy_count
    }

    pub fn move_count(&self) -> usize {
        self.move_buffer.len()
    }

    pub fn tree(&self) -> &DynamicTree<T> {
        &self.tree
    }

    fn buffer_move(&mut self, id: ProxyId) {
        self.move_buffer.push(id);
    }

    fn unbuffer_move(&mut self, id: ProxyId) {
        for slot in self.move_buffer.iter_mut().filter(|slot| **slot == id) {
            *slot = NULL_NODE;
        }
    }

    /// Reports each new overlapping pair exactly once, sorted by proxy id.
    ///
    /// Pairs where both proxies moved are only produced by the query of the larger id.
    pub fn update_pairs(&mut self, mut callback: impl FnMut(T, T)) {
        self.pair_buffer.clear();

        let tree = &self.tree;
        let pairs = &mut self.pair_buffer;
        for &query_id in &self.move_buffer {
            if query_id == NULL_NODE {
                continue;
            }
            let Some(fat) = tree.fat_aabb(query_id) else {
                continue;
            };
            tree.query(&fat, |proxy_id| {
                if proxy_id == query_id {
                    return true;
                }
                if tree.was_moved(proxy_id) && proxy_id > query_id {
                    return true;
                }
                pairs.push((proxy_id.min(query_id), proxy_id.max(query_id)));
                true
            });
        }

        self.pair_buffer.sort_unstable();
        self.pair_buffer.dedup();

        for &(a, b) in &self.pair_buffer {
            if let (Some(&data_a), Some(&data_b)) = (self.tree.user_data(a), self.tree.user_data(b)) {
                callback(data_a, data_b);
            }
        }

        for &id in &self.move_buffer {
            if id != NULL_NODE {
                self.tree.clear_moved(id);
            }
        }
        self.move_buffer.clear();
    }

    pub fn query(&self, aabb: &Aabb, mut callback: impl FnMut(ProxyId, T) -> bool) {
        self.tree.query(aabb, |id| match self.tree.user_data(id) {
            Some(&data) => callback(id, data),
            None => true,
        });
    }

    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        mut callback: impl FnMut(&RayCastInput, ProxyId, T) -> f32,
    ) {
        self.tree.ray_cast(input, |sub, id| match self.tree.user_data(id) {
            Some(&data) => callback(sub, id, data),
            None => -1.0,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(x: f32, y: f32) -> Aabb {
        Aabb::from_center(Vec2::new(x, y), Vec2::splat(0.5))
    }

    #[test]
    fn new_overlaps_are_reported_once() {
        let mut bp = BroadPhase::new(0.1, 4.0);
        bp.create_proxy(unit_box(0.0, 0.0), 'a');
        bp.create_proxy(unit_box(0.8, 0.0), 'b');
        bp.create_proxy(unit_box(10.0, 0.0), 'c');

        let mut pairs = Vec::new();
        bp.update_pairs(|a, b| pairs.push((a, b)));
        assert_eq!(pairs.len(), 1);
        let (a, b) = pairs[0];
        assert!(matches!((a, b), ('a', 'b') | ('b', 'a')));

        // Nothing moved, nothing reported.
        pairs.clear();
        bp.update_pairs(|a, b| pairs.push((a, b)));
        assert!(pairs.is_empty());
    }

    #[test]
    fn moved_proxy_finds_resting_neighbor() {
        let mut bp = BroadPhase::new(0.1, 4.0);
        let a = bp.create_proxy(unit_box(0.0, 0.0), 1u32);
        bp.create_proxy(unit_box(5.0, 0.0), 2u32);
        bp.update_pairs(|_, _| {});

        bp.move_proxy(a, unit_box(4.5, 0.0), Vec2::new(4.5, 0.0));
        assert_eq!(bp.move_count(), 1);
        let mut pairs = Vec::new();
        bp.update_pairs(|x, y| pairs.push((x.min(y), x.max(y))));
        assert_eq!(pairs, vec![(1, 2)]);
    }

    #[test]
    fn destroyed_proxy_is_dropped_from_move_buffer() {
        let mut bp = BroadPhase::new(0.1, 4.0);
        let a = bp.create_proxy(unit_box(0.0, 0.0), 1u32);
        bp.create_proxy(unit_box(0.5, 0.0), 2u32);
        bp.destroy_proxy(a);
        let mut count = 0;
        bp.update_pairs(|_, _| count += 1);
        assert_eq!(count, 0);
        assert_eq!(bp.proxy_count(), 1);
    }
}
