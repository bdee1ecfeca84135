/// A handle that addresses a slot of an [`Arena`]
///
/// The generation distinguishes a live value from an older value that used
/// the same slot before it was freed.
pub trait ArenaHandle: Copy + Eq {
    /// Builds a handle from its slot index and generation
    fn from_parts(index: u32, generation: u32) -> Self;

    /// Returns the slot index
    fn index(&self) -> u32;

    /// Returns the generation
    fn generation(&self) -> u32;
}

/// Generic storage trait for physics objects
pub trait Storage<T, H> {
    /// Creates a new empty storage
    fn new() -> Self;

    /// Adds an item to the storage and returns its handle
    fn add(&mut self, item: T) -> H;

    /// Gets a reference to an item by its handle
    fn get(&self, handle: H) -> Option<&T>;

    /// Gets a mutable reference to an item by its handle
    fn get_mut(&mut self, handle: H) -> Option<&mut T>;

    /// Removes an item from the storage
    fn remove(&mut self, handle: H) -> Option<T>;

    /// Returns the number of items in the storage
    fn len(&self) -> usize;

    /// Returns whether the storage is empty
    fn is_empty(&self) -> bool;

    /// Clears all items from the storage
    fn clear(&mut self);

    /// Returns all live handles
    fn handles(&self) -> Vec<H>;
}

#[derive(Debug, Clone)]
enum Entry<T> {
    Occupied { generation: u32, value: T },
    Free { generation: u32, next_free: Option<u32> },
}

/// Slot storage with an index free list
///
/// Freed slots are reused in LIFO order and bump their generation, so stale
/// handles never alias a newer value.
#[derive(Debug, Clone)]
pub struct Arena<T, H> {
    entries: Vec<Entry<T>>,
    free_head: Option<u32>,
    len: usize,
    _handle: std::marker::PhantomData<H>,
}

impl<T, H: ArenaHandle> Default for Arena<T, H> {
    fn default() -> Self {
        <Self as Storage<T, H>>::new()
    }
}

impl<T, H: ArenaHandle> Arena<T, H> {
    /// Returns true if the handle refers to a live value
    pub fn contains(&self, handle: H) -> bool {
        self.get(handle).is_some()
    }

    /// Returns mutable references to two distinct live values
    pub fn get2_mut(&mut self, a: H, b: H) -> Option<(&mut T, &mut T)> {
        let (ia, ib) = (a.index() as usize, b.index() as usize);
        if ia == ib || ia >= self.entries.len() || ib >= self.entries.len() {
            return None;
        }

        let (first, second, swapped) = if ia < ib { (ia, ib, false) } else { (ib, ia, true) };
        let (low, high) = self.entries.split_at_mut(second);
        let (ha, hb) = if swapped { (b, a) } else { (a, b) };

        match (&mut low[first], &mut high[0]) {
            (
                Entry::Occupied { generation: g1, value: v1 },
                Entry::Occupied { generation: g2, value: v2 },
            ) if *g1 == ha.generation() && *g2 == hb.generation() => {
                if swapped {
                    Some((v2, v1))
                } else {
                    Some((v1, v2))
                }
            }
            _ => None,
        }
    }

    /// Iterates over live values with their handles, in slot order
    pub fn iter(&self) -> impl Iterator<Item = (H, &T)> + '_ {
        self.entries.iter().enumerate().filter_map(|(i, entry)| match entry {
            Entry::Occupied { generation, value } => {
                Some((H::from_parts(i as u32, *generation), value))
            }
            Entry::Free { .. } => None,
        })
    }

    /// Iterates mutably over live values with their handles, in slot order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (H, &mut T)> + '_ {
        self.entries.iter_mut().enumerate().filter_map(|(i, entry)| match entry {
            Entry::Occupied { generation, value } => {
                Some((H::from_parts(i as u32, *generation), value))
            }
            Entry::Free { .. } => None,
        })
    }
}

impl<T, H: ArenaHandle> Storage<T, H> for Arena<T, H> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_head: None,
            len: 0,
            _handle: std::marker::PhantomData,
        }
    }

    fn add(&mut self, item: T) -> H {
        self.len += 1;

        if let Some(index) = self.free_head {
            let slot = &mut self.entries[index as usize];
            if let Entry::Free { generation, next_free } = *slot {
                let generation = generation.wrapping_add(1);
                self.free_head = next_free;
                *slot = Entry::Occupied { generation, value: item };
                return H::from_parts(index, generation);
            }
        }

        let index = self.entries.len() as u32;
        self.entries.push(Entry::Occupied { generation: 0, value: item });
        H::from_parts(index, 0)
    }

    fn get(&self, handle: H) -> Option<&T> {
        match self.entries.get(handle.index() as usize) {
            Some(Entry::Occupied { generation, value }) if *generation == handle.generation() => {
                Some(value)
            }
            _ => None,
        }
    }

    fn get_mut(&mut self, handle: H) -> Option<&mut T> {
        match self.entries.get_mut(handle.index() as usize) {
            Some(Entry::Occupied { generation, value }) if *generation == handle.generation() => {
                Some(value)
            }
            _ => None,
        }
    }

    fn remove(&mut self, handle: H) -> Option<T> {
        let index = handle.index();
        let slot = self.entries.get_mut(index as usize)?;

        match slot {
            Entry::Occupied { generation, .. } if *generation == handle.generation() => {
                let freed = Entry::Free {
                    generation: *generation,
                    next_free: self.free_head,
                };
                let old = std::mem::replace(slot, freed);
                self.free_head = Some(index);
                self.len -= 1;
                match old {
                    Entry::Occupied { value, .. } => Some(value),
                    Entry::Free { .. } => None,
                }
            }
            _ => None,
        }
    }

    fn len(&self) -> usize {
        self.len
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.free_head = None;
        self.len = 0;
    }

    fn handles(&self) -> Vec<H> {
        self.iter().map(|(handle, _)| handle).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct TestHandle(u32, u32);

    impl ArenaHandle for TestHandle {
        fn from_parts(index: u32, generation: u32) -> Self {
            TestHandle(index, generation)
        }
        fn index(&self) -> u32 {
            self.0
        }
        fn generation(&self) -> u32 {
            self.1
        }
    }

    #[test]
    fn test_reuse_bumps_generation() {
        let mut arena: Arena<&str, TestHandle> = Arena::new();
        let a = arena.add("a");
        assert_eq!(arena.remove(a), Some("a"));

        let b = arena.add("b");
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(b), Some(&"b"));
    }

    #[test]
    fn test_get2_mut() {
        let mut arena: Arena<i32, TestHandle> = Arena::new();
        let a = arena.add(1);
        let b = arena.add(2);

        {
            let (x, y) = arena.get2_mut(b, a).unwrap();
            assert_eq!((*x, *y), (2, 1));
            *x += 10;
        }
        assert_eq!(arena.get(b), Some(&12));
        assert!(arena.get2_mut(a, a).is_none());
    }
}
