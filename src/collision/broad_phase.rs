//! Sweep-and-prune broad phase over quantized bounds
//!
//! Each proxy contributes a lower and an upper bound per axis. Bounds are
//! kept sorted in one array per axis, and every bound carries the number of
//! intervals open at its position (the stabbing count). Moving a proxy only
//! swaps the bounds it crosses, buffering pair changes as it goes.
//!
//! Bound values are 16-bit cells over the world AABB. Lower bounds are
//! forced even and upper bounds odd, so two proxies that quantize to the
//! same cell still sort lower-before-upper and are reported as a pair.

use log::warn;

use crate::collision::pair_manager::{PairCallback, PairManager};
use crate::core::config::MAX_PROXY_LIMIT;
use crate::error::PhysicsError;
use crate::math::{Aabb, Segment, Vector2};
use crate::Result;

const INVALID: u16 = u16::MAX;

#[derive(Debug, Clone, Copy, Default)]
struct Bound {
    value: u16,
    proxy_id: u16,
    stabbing_count: u16,
}

impl Bound {
    #[inline]
    fn is_lower(&self) -> bool {
        self.value & 1 == 0
    }

    #[inline]
    fn is_upper(&self) -> bool {
        self.value & 1 == 1
    }
}

/// Quantized bound values of a proxy, per axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundValues {
    pub lower: [u16; 2],
    pub upper: [u16; 2],
}

impl BoundValues {
    /// Returns true if the two quantized boxes overlap on both axes
    pub fn overlaps(&self, other: &BoundValues) -> bool {
        (0..2).all(|axis| self.lower[axis] <= other.upper[axis] && other.lower[axis] <= self.upper[axis])
    }
}

#[derive(Debug, Clone)]
struct Proxy<T> {
    /// Indices into the bound arrays
    lower_bounds: [u16; 2],
    upper_bounds: [u16; 2],
    time_stamp: u16,
    user_data: Option<T>,
    next: Option<u16>,
}

impl<T> Proxy<T> {
    fn free(next: Option<u16>) -> Self {
        Self {
            lower_bounds: [INVALID; 2],
            upper_bounds: [INVALID; 2],
            time_stamp: 0,
            user_data: None,
            next,
        }
    }

    #[inline]
    fn is_valid(&self) -> bool {
        self.user_data.is_some()
    }
}

/// Incremental sweep-and-prune over a fixed world AABB
///
/// `T` is the user data stored per proxy and returned from queries. `P` is
/// the data the pair callback attaches to each overlapping pair.
#[derive(Debug)]
pub struct BroadPhase<T: Copy, P> {
    pair_manager: PairManager<P>,
    proxies: Vec<Proxy<T>>,
    free_proxy: Option<u16>,
    bounds: [Vec<Bound>; 2],
    query_results: Vec<u16>,
    time_stamp: u16,
    world_aabb: Aabb,
    quantization_factor: Vector2,
    proxy_count: usize,
    max_proxies: usize,
}

impl<T: Copy, P> BroadPhase<T, P> {
    /// Creates a broad phase covering `world_aabb`
    ///
    /// `max_proxies` is clamped to what 16-bit proxy ids can address.
    pub fn new(world_aabb: Aabb, max_proxies: usize, max_pairs: usize) -> Result<Self> {
        let extent = world_aabb.max - world_aabb.min;
        if !(world_aabb.is_valid() && extent.x > 0.0 && extent.y > 0.0) {
            return Err(PhysicsError::InvalidParameter(format!(
                "world AABB {:?} has no area",
                world_aabb
            )));
        }

        let max_proxies = max_proxies.min(MAX_PROXY_LIMIT);
        let scale = f32::from(u16::MAX);

        Ok(Self {
            pair_manager: PairManager::new(max_pairs),
            proxies: Vec::new(),
            free_proxy: None,
            bounds: [Vec::new(), Vec::new()],
            query_results: Vec::new(),
            time_stamp: 1,
            world_aabb,
            quantization_factor: Vector2::new(scale / extent.x, scale / extent.y),
            proxy_count: 0,
            max_proxies,
        })
    }

    /// Returns the world AABB
    pub fn get_world_aabb(&self) -> Aabb {
        self.world_aabb
    }

    /// Returns true if `aabb` overlaps the world AABB
    pub fn in_range(&self, aabb: &Aabb) -> bool {
        let dx = (aabb.min.x - self.world_aabb.max.x).max(self.world_aabb.min.x - aabb.max.x);
        let dy = (aabb.min.y - self.world_aabb.max.y).max(self.world_aabb.min.y - aabb.max.y);
        dx.max(dy) < 0.0
    }

    /// Number of live proxies
    pub fn proxy_count(&self) -> usize {
        self.proxy_count
    }

    /// Number of tracked overlapping pairs
    pub fn pair_count(&self) -> usize {
        self.pair_manager.pair_count()
    }

    /// Returns true if two proxies form a committed pair
    pub fn has_pair(&self, id1: u16, id2: u16) -> bool {
        self.pair_manager.has_pair(id1, id2)
    }

    /// Returns the data the pair callback attached to a committed pair
    pub fn get_pair_data(&self, id1: u16, id2: u16) -> Option<&P> {
        self.pair_manager.get_pair_data(id1, id2)
    }

    /// Lists the committed pairs as ordered proxy ids
    pub fn committed_pairs(&self) -> Vec<(u16, u16)> {
        let mut pairs: Vec<_> = self.pair_manager.committed_pairs().collect();
        pairs.sort_unstable();
        pairs
    }

    /// Returns the user data of a live proxy
    pub fn get_user_data(&self, proxy_id: u16) -> Option<T> {
        self.proxies.get(usize::from(proxy_id)).and_then(|p| p.user_data)
    }

    /// Returns the quantized bound values of a live proxy
    pub fn get_bound_values(&self, proxy_id: u16) -> Option<BoundValues> {
        let proxy = self.proxies.get(usize::from(proxy_id)).filter(|p| p.is_valid())?;
        let mut values = BoundValues::default();
        for axis in 0..2 {
            values.lower[axis] = self.bounds[axis][usize::from(proxy.lower_bounds[axis])].value;
            values.upper[axis] = self.bounds[axis][usize::from(proxy.upper_bounds[axis])].value;
        }
        Some(values)
    }

    /// Quantizes an AABB, clamping it to the world AABB
    pub fn compute_bounds(&self, aabb: &Aabb) -> BoundValues {
        let w = &self.world_aabb;
        let min_vertex = aabb.min.clamp(&w.min, &w.max);
        let max_vertex = aabb.max.clamp(&w.min, &w.max);
        let qf = self.quantization_factor;

        // Bump lower bounds down and upper bounds up. This ensures correct sorting of
        // lower/upper bounds that would have equal values.
        BoundValues {
            lower: [
                ((qf.x * (min_vertex.x - w.min.x)) as u16) & (u16::MAX - 1),
                ((qf.y * (min_vertex.y - w.min.y)) as u16) & (u16::MAX - 1),
            ],
            upper: [
                ((qf.x * (max_vertex.x - w.min.x)) as u16) | 1,
                ((qf.y * (max_vertex.y - w.min.y)) as u16) | 1,
            ],
        }
    }

    fn dequantize(&self, values: &BoundValues) -> Aabb {
        let w = &self.world_aabb;
        let qf = self.quantization_factor;
        Aabb::new(
            Vector2::new(
                w.min.x + f32::from(values.lower[0]) / qf.x,
                w.min.y + f32::from(values.lower[1]) / qf.y,
            ),
            Vector2::new(
                w.min.x + f32::from(values.upper[0]) / qf.x,
                w.min.y + f32::from(values.upper[1]) / qf.y,
            ),
        )
    }

    fn test_overlap(&self, b: &BoundValues, proxy_id: u16) -> bool {
        let p = &self.proxies[usize::from(proxy_id)];
        for axis in 0..2 {
            let bounds = &self.bounds[axis];
            if b.lower[axis] > bounds[usize::from(p.upper_bounds[axis])].value {
                return false;
            }
            if b.upper[axis] < bounds[usize::from(p.lower_bounds[axis])].value {
                return false;
            }
        }
        true
    }

    fn increment_time_stamp(&mut self) {
        if self.time_stamp == u16::MAX {
            for proxy in self.proxies.iter_mut() {
                proxy.time_stamp = 0;
            }
            self.time_stamp = 1;
        } else {
            self.time_stamp += 1;
        }
    }

    fn increment_overlap_count(&mut self, proxy_id: u16) {
        let time_stamp = self.time_stamp;
        let proxy = &mut self.proxies[usize::from(proxy_id)];
        // The first hit marks the proxy for this query, the second confirms both axes.
        if proxy.time_stamp < time_stamp {
            proxy.time_stamp = time_stamp;
        } else {
            self.query_results.push(proxy_id);
        }
    }

    /// Finds the insertion range of `[lower_value, upper_value]` on one axis
    ///
    /// Every proxy overlapping the range gets its overlap count bumped; the
    /// second bump (from the other axis) lands it in the query results.
    fn query_axis(&mut self, lower_value: u16, upper_value: u16, axis: usize) -> (usize, usize) {
        let lower_query = binary_search(&self.bounds[axis], lower_value);
        let upper_query = binary_search(&self.bounds[axis], upper_value);

        // Easy case: lower_query <= lower_index(i) < upper_query
        // Solution: search query range for min bounds.
        for j in lower_query..upper_query {
            let bound = self.bounds[axis][j];
            if bound.is_lower() {
                self.increment_overlap_count(bound.proxy_id);
            }
        }

        // Hard case: lower_index(i) < lower_query < upper_index(i)
        // Solution: use the stabbing count to search down the bound array.
        if lower_query > 0 {
            let mut i = lower_query - 1;
            let mut s = self.bounds[axis][i].stabbing_count;

            // Find the s overlaps.
            while s > 0 {
                let bound = self.bounds[axis][i];
                if bound.is_lower() {
                    let upper_index = self.proxies[usize::from(bound.proxy_id)].upper_bounds[axis];
                    if lower_query <= usize::from(upper_index) {
                        self.increment_overlap_count(bound.proxy_id);
                        s -= 1;
                    }
                }
                if i == 0 {
                    break;
                }
                i -= 1;
            }
        }

        (lower_query, upper_query)
    }

    fn allocate_proxy(&mut self) -> Option<u16> {
        if self.proxy_count >= self.max_proxies {
            return None;
        }
        if let Some(id) = self.free_proxy {
            self.free_proxy = self.proxies[usize::from(id)].next;
            return Some(id);
        }
        if self.proxies.len() < self.max_proxies {
            self.proxies.push(Proxy::free(None));
            return Some((self.proxies.len() - 1) as u16);
        }
        None
    }

    /// Inserts a proxy and reports its new pairs through `callback`
    ///
    /// Returns `None` when the pool is full or the AABB lies outside the world.
    pub fn create_proxy<C>(&mut self, aabb: &Aabb, user_data: T, callback: &mut C) -> Option<u16>
    where
        C: PairCallback<T, P>,
    {
        if !self.in_range(aabb) {
            warn!("proxy AABB {:?} lies outside the world", aabb);
            return None;
        }

        let proxy_id = match self.allocate_proxy() {
            Some(id) => id,
            None => {
                warn!("proxy pool exhausted ({} proxies)", self.max_proxies);
                return None;
            }
        };

        {
            let proxy = &mut self.proxies[usize::from(proxy_id)];
            proxy.user_data = Some(user_data);
            proxy.next = None;
        }

        let values = self.compute_bounds(aabb);

        for axis in 0..2 {
            let (lower_index, upper_index) =
                self.query_axis(values.lower[axis], values.upper[axis], axis);

            let bounds = &mut self.bounds[axis];
            bounds.insert(
                upper_index,
                Bound {
                    value: values.upper[axis],
                    proxy_id,
                    stabbing_count: 0,
                },
            );
            bounds.insert(
                lower_index,
                Bound {
                    value: values.lower[axis],
                    proxy_id,
                    stabbing_count: 0,
                },
            );

            // The upper index has increased because of the lower bound insertion.
            let upper_index = upper_index + 1;

            bounds[lower_index].stabbing_count = if lower_index == 0 {
                0
            } else {
                bounds[lower_index - 1].stabbing_count
            };
            bounds[upper_index].stabbing_count = bounds[upper_index - 1].stabbing_count;

            // Adjust the stabbing count between the new bounds.
            for bound in bounds[lower_index..upper_index].iter_mut() {
                bound.stabbing_count += 1;
            }

            // Adjust all the affected bound indices.
            for index in lower_index..bounds.len() {
                let bound = bounds[index];
                let proxy = &mut self.proxies[usize::from(bound.proxy_id)];
                if bound.is_lower() {
                    proxy.lower_bounds[axis] = index as u16;
                } else {
                    proxy.upper_bounds[axis] = index as u16;
                }
            }
        }

        self.proxy_count += 1;

        let results = std::mem::take(&mut self.query_results);
        for other in results.iter().copied() {
            self.pair_manager.add_buffered_pair(proxy_id, other);
        }
        self.query_results = results;
        self.query_results.clear();

        self.commit(callback);
        self.increment_time_stamp();

        Some(proxy_id)
    }

    /// Removes a proxy, reporting its pairs as removed through `callback`
    pub fn destroy_proxy<C>(&mut self, proxy_id: u16, callback: &mut C) -> Result<()>
    where
        C: PairCallback<T, P>,
    {
        if !self
            .proxies
            .get(usize::from(proxy_id))
            .map_or(false, |p| p.is_valid())
        {
            return Err(PhysicsError::ResourceNotFound(format!(
                "proxy {} does not exist",
                proxy_id
            )));
        }

        for axis in 0..2 {
            let (lower_index, upper_index) = {
                let proxy = &self.proxies[usize::from(proxy_id)];
                (
                    usize::from(proxy.lower_bounds[axis]),
                    usize::from(proxy.upper_bounds[axis]),
                )
            };

            let bounds = &mut self.bounds[axis];
            let lower_value = bounds[lower_index].value;
            let upper_value = bounds[upper_index].value;

            bounds.remove(upper_index);
            bounds.remove(lower_index);

            // Fix bound indices.
            for index in lower_index..bounds.len() {
                let bound = bounds[index];
                let proxy = &mut self.proxies[usize::from(bound.proxy_id)];
                if bound.is_lower() {
                    proxy.lower_bounds[axis] = index as u16;
                } else {
                    proxy.upper_bounds[axis] = index as u16;
                }
            }

            // Fix stabbing count.
            for bound in bounds[lower_index..upper_index - 1].iter_mut() {
                bound.stabbing_count -= 1;
            }

            // Query for pairs to be removed.
            self.query_axis(lower_value, upper_value, axis);
        }

        let results = std::mem::take(&mut self.query_results);
        for other in results.iter().copied() {
            self.pair_manager.remove_buffered_pair(proxy_id, other);
        }
        self.query_results = results;
        self.query_results.clear();

        self.commit(callback);
        self.increment_time_stamp();

        // Return the proxy to the pool.
        let next = self.free_proxy;
        self.proxies[usize::from(proxy_id)] = Proxy::free(next);
        self.free_proxy = Some(proxy_id);
        self.proxy_count -= 1;

        Ok(())
    }

    /// Moves a proxy to a new AABB, buffering pair changes until `commit`
    ///
    /// Only the bounds that cross a neighbor are swapped. The new AABB must
    /// be in range; callers freeze bodies that leave the world instead.
    pub fn move_proxy(&mut self, proxy_id: u16, aabb: &Aabb) {
        if !aabb.is_valid()
            || !self
                .proxies
                .get(usize::from(proxy_id))
                .map_or(false, |p| p.is_valid())
        {
            return;
        }

        let bound_count = self.bounds[0].len();

        // Get new bound values
        let new_values = self.compute_bounds(aabb);

        // Get old bound values
        let old_values = match self.get_bound_values(proxy_id) {
            Some(values) => values,
            None => return,
        };

        for axis in 0..2 {
            let pid = usize::from(proxy_id);
            let lower_index = usize::from(self.proxies[pid].lower_bounds[axis]);
            let upper_index = usize::from(self.proxies[pid].upper_bounds[axis]);

            let lower_value = new_values.lower[axis];
            let upper_value = new_values.upper[axis];

            let delta_lower = i32::from(lower_value) - i32::from(self.bounds[axis][lower_index].value);
            let delta_upper = i32::from(upper_value) - i32::from(self.bounds[axis][upper_index].value);

            self.bounds[axis][lower_index].value = lower_value;
            self.bounds[axis][upper_index].value = upper_value;

            //
            // Expanding adds overlaps
            //

            // Should we move the lower bound down?
            if delta_lower < 0 {
                let mut index = lower_index;
                while index > 0 && lower_value < self.bounds[axis][index - 1].value {
                    let prev = self.bounds[axis][index - 1];
                    let prev_id = usize::from(prev.proxy_id);

                    self.bounds[axis][index - 1].stabbing_count += 1;

                    if prev.is_upper() {
                        if self.test_overlap(&new_values, prev.proxy_id) {
                            self.pair_manager.add_buffered_pair(proxy_id, prev.proxy_id);
                        }
                        self.proxies[prev_id].upper_bounds[axis] += 1;
                        self.bounds[axis][index].stabbing_count += 1;
                    } else {
                        self.proxies[prev_id].lower_bounds[axis] += 1;
                        self.bounds[axis][index].stabbing_count -= 1;
                    }

                    self.proxies[pid].lower_bounds[axis] -= 1;
                    self.bounds[axis].swap(index, index - 1);
                    index -= 1;
                }
            }

            // Should we move the upper bound up?
            if delta_upper > 0 {
                let mut index = upper_index;
                while index + 1 < bound_count && self.bounds[axis][index + 1].value <= upper_value {
                    let next = self.bounds[axis][index + 1];
                    let next_id = usize::from(next.proxy_id);

                    self.bounds[axis][index + 1].stabbing_count += 1;

                    if next.is_lower() {
                        if self.test_overlap(&new_values, next.proxy_id) {
                            self.pair_manager.add_buffered_pair(proxy_id, next.proxy_id);
                        }
                        self.proxies[next_id].lower_bounds[axis] -= 1;
                        self.bounds[axis][index].stabbing_count += 1;
                    } else {
                        self.proxies[next_id].upper_bounds[axis] -= 1;
                        self.bounds[axis][index].stabbing_count -= 1;
                    }

                    self.proxies[pid].upper_bounds[axis] += 1;
                    self.bounds[axis].swap(index, index + 1);
                    index += 1;
                }
            }

            //
            // Shrinking removes overlaps
            //

            // Should we move the lower bound up?
            if delta_lower > 0 {
                let mut index = lower_index;
                while index + 1 < bound_count && self.bounds[axis][index + 1].value <= lower_value {
                    let next = self.bounds[axis][index + 1];
                    let next_id = usize::from(next.proxy_id);

                    self.bounds[axis][index + 1].stabbing_count -= 1;

                    if next.is_upper() {
                        if self.test_overlap(&old_values, next.proxy_id) {
                            self.pair_manager.remove_buffered_pair(proxy_id, next.proxy_id);
                        }
                        self.proxies[next_id].upper_bounds[axis] -= 1;
                        self.bounds[axis][index].stabbing_count -= 1;
                    } else {
                        self.proxies[next_id].lower_bounds[axis] -= 1;
                        self.bounds[axis][index].stabbing_count += 1;
                    }

                    self.proxies[pid].lower_bounds[axis] += 1;
                    self.bounds[axis].swap(index, index + 1);
                    index += 1;
                }
            }

            // Should we move the upper bound down?
            if delta_upper < 0 {
                let mut index = upper_index;
                while index > 0 && upper_value < self.bounds[axis][index - 1].value {
                    let prev = self.bounds[axis][index - 1];
                    let prev_id = usize::from(prev.proxy_id);

                    self.bounds[axis][index - 1].stabbing_count -= 1;

                    if prev.is_lower() {
                        if self.test_overlap(&old_values, prev.proxy_id) {
                            self.pair_manager.remove_buffered_pair(proxy_id, prev.proxy_id);
                        }
                        self.proxies[prev_id].lower_bounds[axis] += 1;
                        self.bounds[axis][index].stabbing_count -= 1;
                    } else {
                        self.proxies[prev_id].upper_bounds[axis] += 1;
                        self.bounds[axis][index].stabbing_count += 1;
                    }

                    self.proxies[pid].upper_bounds[axis] -= 1;
                    self.bounds[axis].swap(index, index - 1);
                    index -= 1;
                }
            }
        }
    }

    /// Flushes buffered pair changes through `callback`
    pub fn commit<C>(&mut self, callback: &mut C)
    where
        C: PairCallback<T, P>,
    {
        let proxies = &self.proxies;
        self.pair_manager
            .commit(|id| proxies.get(usize::from(id)).and_then(|p| p.user_data), callback);
    }

    /// Collects the user data of up to `max_count` proxies overlapping `aabb`
    pub fn query_aabb(&mut self, aabb: &Aabb, max_count: usize) -> Vec<T> {
        let values = self.compute_bounds(aabb);
        self.query_axis(values.lower[0], values.upper[0], 0);
        self.query_axis(values.lower[1], values.upper[1], 1);

        let results: Vec<T> = self
            .query_results
            .iter()
            .take(max_count)
            .filter_map(|&id| self.proxies[usize::from(id)].user_data)
            .collect();

        self.query_results.clear();
        self.increment_time_stamp();
        results
    }

    /// Collects proxies whose bounds the segment crosses, with the entry fraction
    ///
    /// Fractions come from the quantized bounds, so they are conservative.
    pub fn query_segment(&mut self, segment: &Segment, max_count: usize, sort: bool) -> Vec<(T, f32)> {
        let aabb = Aabb::new(segment.p1.min(&segment.p2), segment.p1.max(&segment.p2));
        let values = self.compute_bounds(&aabb);
        self.query_axis(values.lower[0], values.upper[0], 0);
        self.query_axis(values.lower[1], values.upper[1], 1);

        let candidates = std::mem::take(&mut self.query_results);
        let mut hits = Vec::with_capacity(candidates.len());
        for id in candidates.iter().copied() {
            let (user_data, bounds) = match (self.get_user_data(id), self.get_bound_values(id)) {
                (Some(data), Some(bounds)) => (data, bounds),
                _ => continue,
            };
            if let Some(fraction) = self.dequantize(&bounds).intersects_segment(segment) {
                hits.push((user_data, fraction));
            }
        }

        self.query_results = candidates;
        self.query_results.clear();
        self.increment_time_stamp();

        if sort {
            hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        }
        hits.truncate(max_count);
        hits
    }

    /// Checks the sorted order, stabbing counts and proxy back-references
    pub fn validate(&self) -> Result<()> {
        for axis in 0..2 {
            let bounds = &self.bounds[axis];
            if bounds.len() != 2 * self.proxy_count {
                return Err(PhysicsError::InternalError(format!(
                    "axis {} holds {} bounds for {} proxies",
                    axis,
                    bounds.len(),
                    self.proxy_count
                )));
            }

            let mut stabbing_count: i32 = 0;
            for (i, bound) in bounds.iter().enumerate() {
                if i > 0 && bounds[i - 1].value > bound.value {
                    return Err(PhysicsError::InternalError(format!(
                        "axis {} bounds unsorted at {}",
                        axis, i
                    )));
                }

                let proxy = match self.proxies.get(usize::from(bound.proxy_id)) {
                    Some(proxy) if proxy.is_valid() => proxy,
                    _ => {
                        return Err(PhysicsError::InternalError(format!(
                            "bound {} references dead proxy {}",
                            i, bound.proxy_id
                        )))
                    }
                };

                let back_reference = if bound.is_lower() {
                    stabbing_count += 1;
                    proxy.lower_bounds[axis]
                } else {
                    stabbing_count -= 1;
                    proxy.upper_bounds[axis]
                };

                if usize::from(back_reference) != i {
                    return Err(PhysicsError::InternalError(format!(
                        "proxy {} points at bound {} instead of {}",
                        bound.proxy_id, back_reference, i
                    )));
                }
                if i32::from(bound.stabbing_count) != stabbing_count {
                    return Err(PhysicsError::InternalError(format!(
                        "axis {} bound {} stabbing count {} expected {}",
                        axis, i, bound.stabbing_count, stabbing_count
                    )));
                }
            }
        }
        Ok(())
    }
}

fn binary_search(bounds: &[Bound], value: u16) -> usize {
    let mut low: i32 = 0;
    let mut high: i32 = bounds.len() as i32 - 1;
    while low <= high {
        let mid = (low + high) >> 1;
        let mid_value = bounds[mid as usize].value;
        if mid_value > value {
            high = mid - 1;
        } else if mid_value < value {
            low = mid + 1;
        } else {
            return mid as usize;
        }
    }
    low as usize
}
