use std::collections::HashMap;

use bitflags::bitflags;
use log::warn;

/// Receives pair events when the broad phase commits
///
/// `T` is the user data stored on each proxy and `P` the user data the
/// callback attaches to a pair.
pub trait PairCallback<T, P> {
    /// Called once when two proxies start overlapping
    ///
    /// Returning `None` keeps the pair tracked without any attached data.
    fn pair_added(&mut self, proxy_data1: T, proxy_data2: T) -> Option<P>;

    /// Called once when a pair created by `pair_added` stops overlapping
    fn pair_removed(&mut self, proxy_data1: T, proxy_data2: T, pair_data: Option<P>);
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct PairFlags: u8 {
        /// Queued in the pair buffer for the next commit
        const BUFFERED = 0x01;
        /// Marked for removal at the next commit
        const REMOVED  = 0x02;
        /// Reported to the callback
        const FINAL    = 0x04;
    }
}

#[derive(Debug)]
struct Pair<P> {
    user_data: Option<P>,
    flags: PairFlags,
}

/// Tracks overlapping proxy pairs and buffers their changes until commit
///
/// Pairs are keyed by their ordered proxy ids. A pair that is added and
/// removed again before a commit never reaches the callback.
#[derive(Debug)]
pub(crate) struct PairManager<P> {
    pairs: HashMap<(u16, u16), Pair<P>>,
    buffer: Vec<(u16, u16)>,
    max_pairs: usize,
}

#[inline]
fn pair_key(id1: u16, id2: u16) -> (u16, u16) {
    if id1 < id2 {
        (id1, id2)
    } else {
        (id2, id1)
    }
}

impl<P> PairManager<P> {
    pub(crate) fn new(max_pairs: usize) -> Self {
        Self {
            pairs: HashMap::with_capacity(max_pairs.min(1024)),
            buffer: Vec::new(),
            max_pairs,
        }
    }

    /// Number of tracked pairs, including ones not yet committed
    pub(crate) fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if a committed pair exists for the two proxies
    pub(crate) fn has_pair(&self, id1: u16, id2: u16) -> bool {
        self.pairs
            .get(&pair_key(id1, id2))
            .map_or(false, |pair| pair.flags.contains(PairFlags::FINAL))
    }

    /// Returns the data attached to a committed pair
    pub(crate) fn get_pair_data(&self, id1: u16, id2: u16) -> Option<&P> {
        self.pairs
            .get(&pair_key(id1, id2))
            .and_then(|pair| pair.user_data.as_ref())
    }

    /// Iterates over committed pairs
    pub(crate) fn committed_pairs(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.pairs
            .iter()
            .filter(|(_, pair)| pair.flags.contains(PairFlags::FINAL))
            .map(|(key, _)| *key)
    }

    /// Queues a pair to be reported as added
    pub(crate) fn add_buffered_pair(&mut self, id1: u16, id2: u16) {
        if id1 == id2 {
            return;
        }
        let key = pair_key(id1, id2);

        if !self.pairs.contains_key(&key) {
            if self.pairs.len() >= self.max_pairs {
                warn!("pair table full ({} pairs), dropping pair {:?}", self.max_pairs, key);
                return;
            }
            self.pairs.insert(
                key,
                Pair {
                    user_data: None,
                    flags: PairFlags::empty(),
                },
            );
        }

        if let Some(pair) = self.pairs.get_mut(&key) {
            // If this pair is not in the pair buffer ...
            if !pair.flags.contains(PairFlags::BUFFERED) {
                // ... then add it to the pair buffer.
                pair.flags.insert(PairFlags::BUFFERED);
                self.buffer.push(key);
            }

            // Confirm this pair for the subsequent call to commit.
            pair.flags.remove(PairFlags::REMOVED);
        }
    }

    /// Queues a pair to be reported as removed
    pub(crate) fn remove_buffered_pair(&mut self, id1: u16, id2: u16) {
        let key = pair_key(id1, id2);

        // The pair never existed. This is legal (due to collision filtering).
        let pair = match self.pairs.get_mut(&key) {
            Some(pair) => pair,
            None => return,
        };

        if !pair.flags.contains(PairFlags::BUFFERED) {
            pair.flags.insert(PairFlags::BUFFERED);
            self.buffer.push(key);
        }

        pair.flags.insert(PairFlags::REMOVED);
    }

    /// Flushes buffered changes through the callback
    ///
    /// `proxy_data` maps a proxy id to its user data and must still resolve
    /// for every proxy referenced by a buffered pair.
    pub(crate) fn commit<T, F, C>(&mut self, proxy_data: F, callback: &mut C)
    where
        F: Fn(u16) -> Option<T>,
        C: PairCallback<T, P>,
    {
        let buffer = std::mem::take(&mut self.buffer);
        let mut removed = Vec::new();

        for key in buffer.iter().copied() {
            let pair = match self.pairs.get_mut(&key) {
                Some(pair) => pair,
                None => continue,
            };
            pair.flags.remove(PairFlags::BUFFERED);

            let (data1, data2) = match (proxy_data(key.0), proxy_data(key.1)) {
                (Some(d1), Some(d2)) => (d1, d2),
                _ => {
                    removed.push(key);
                    continue;
                }
            };

            if pair.flags.contains(PairFlags::REMOVED) {
                // It is possible a pair was added then removed before a commit.
                if pair.flags.contains(PairFlags::FINAL) {
                    callback.pair_removed(data1, data2, pair.user_data.take());
                }
                removed.push(key);
            } else if !pair.flags.contains(PairFlags::FINAL) {
                pair.user_data = callback.pair_added(data1, data2);
                pair.flags.insert(PairFlags::FINAL);
            }
        }

        for key in removed {
            self.pairs.remove(&key);
        }

        // Reuse the allocation for the next step.
        self.buffer = buffer;
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        added: Vec<(u16, u16)>,
        removed: Vec<(u16, u16)>,
    }

    impl PairCallback<u16, u32> for Recorder {
        fn pair_added(&mut self, a: u16, b: u16) -> Option<u32> {
            self.added.push((a, b));
            Some(u32::from(a) * 100 + u32::from(b))
        }

        fn pair_removed(&mut self, a: u16, b: u16, data: Option<u32>) {
            assert_eq!(data, Some(u32::from(a) * 100 + u32::from(b)));
            self.removed.push((a, b));
        }
    }

    #[test]
    fn test_add_then_remove_before_commit_is_silent() {
        let mut manager = PairManager::new(16);
        let mut recorder = Recorder::default();

        manager.add_buffered_pair(1, 2);
        manager.remove_buffered_pair(2, 1);
        manager.commit(Some, &mut recorder);

        assert!(recorder.added.is_empty());
        assert!(recorder.removed.is_empty());
        assert_eq!(manager.pair_count(), 0);
    }

    #[test]
    fn test_commit_reports_once() {
        let mut manager = PairManager::new(16);
        let mut recorder = Recorder::default();

        manager.add_buffered_pair(3, 1);
        manager.add_buffered_pair(1, 3);
        manager.commit(Some, &mut recorder);
        assert_eq!(recorder.added, vec![(1, 3)]);
        assert!(manager.has_pair(3, 1));

        manager.add_buffered_pair(1, 3);
        manager.commit(Some, &mut recorder);
        assert_eq!(recorder.added.len(), 1);

        manager.remove_buffered_pair(1, 3);
        manager.commit(Some, &mut recorder);
        assert_eq!(recorder.removed, vec![(1, 3)]);
        assert!(!manager.has_pair(1, 3));
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut manager: PairManager<u32> = PairManager::new(2);
        let mut recorder = Recorder::default();
        manager.add_buffered_pair(0, 1);
        manager.add_buffered_pair(0, 2);
        manager.add_buffered_pair(0, 3);
        manager.commit(Some, &mut recorder);
        assert_eq!(manager.pair_count(), 2);
    }
}
