//! Reference-counted deduplication of values shared by many routes.
//!
//! Values live in a growable array of slots. Slots holding values with the same hash are
//! chained through indexes stored in the slots themselves, and a map keeps the head of each
//! chain. Freed slots are reused before the array grows. Slot 0 is never handed out so that
//! index 0 can mean "no slot" in the chain links.
use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::hash::{BuildHasher, Hash, Hasher};
use std::marker::PhantomData;

/// Handle to a value stored in an [InternPool].
pub struct Reference<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Reference<T> {
    const fn new(index: u32) -> Self {
        Reference {
            index,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for Reference<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Reference<T> {}

impl<T> PartialEq for Reference<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Reference<T> {}

impl<T> Hash for Reference<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> Debug for Reference<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Reference({})", self.index)
    }
}

#[derive(Debug, Default)]
struct Slot<T> {
    next: u32,
    previous: u32,
    refs: u32,
    value: T,
}

#[derive(Debug)]
pub struct InternPool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    chains: HashMap<u64, u32>,
    hasher: RandomState,
}

impl<T: Hash + Eq + Default> Default for InternPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Hash + Eq + Default> InternPool<T> {
    pub fn new() -> InternPool<T> {
        InternPool {
            slots: vec![Slot::default()],
            free: vec![],
            chains: HashMap::new(),
            hasher: RandomState::new(),
        }
    }

    /// Find the slot holding `value`, or the tail of the chain it would be appended to.
    fn find(&self, hash: u64, value: &T) -> Result<u32, u32> {
        let Some(&head) = self.chains.get(&hash) else {
            return Err(0);
        };
        let mut index = head;
        loop {
            let slot = &self.slots[index as usize];
            if slot.value == *value {
                return Ok(index);
            }
            if slot.next == 0 {
                return Err(index);
            }
            index = slot.next;
        }
    }

    /// Add a reference to `value`, storing it if it is not already present.
    pub fn put(&mut self, value: T) -> Reference<T> {
        let hash = self.hasher.hash_one(&value);
        let tail = match self.find(hash, &value) {
            Ok(index) => {
                self.slots[index as usize].refs += 1;
                return Reference::new(index);
            }
            Err(tail) => tail,
        };

        let slot = Slot {
            next: 0,
            previous: tail,
            refs: 1,
            value,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = slot;
                index
            }
            None => {
                self.slots.push(slot);
                (self.slots.len() - 1) as u32
            }
        };
        match tail {
            0 => {
                self.chains.insert(hash, index);
            }
            tail => self.slots[tail as usize].next = index,
        }
        Reference::new(index)
    }

    /// Release a reference. The value is dropped when its last reference is released.
    pub fn take(&mut self, reference: Reference<T>) {
        let index = reference.index as usize;
        let slot = &mut self.slots[index];
        debug_assert!(slot.refs > 0, "releasing a freed intern slot {}", index);
        if slot.refs == 0 {
            return;
        }
        slot.refs -= 1;
        if slot.refs > 0 {
            return;
        }

        let (previous, next) = (slot.previous, slot.next);
        let value = std::mem::take(&mut slot.value);
        slot.previous = 0;
        slot.next = 0;
        if next != 0 {
            self.slots[next as usize].previous = previous;
        }
        if previous != 0 {
            self.slots[previous as usize].next = next;
        } else {
            // head of its chain
            let hash = self.hasher.hash_one(&value);
            match next {
                0 => {
                    self.chains.remove(&hash);
                }
                next => {
                    self.chains.insert(hash, next);
                }
            }
        }
        self.free.push(reference.index);
    }

    /// Look a value up without adding a reference.
    pub fn ref_of(&self, value: &T) -> Option<Reference<T>> {
        let hash = self.hasher.hash_one(value);
        self.find(hash, value).ok().map(Reference::new)
    }

    pub fn get(&self, reference: Reference<T>) -> &T {
        &self.slots[reference.index as usize].value
    }

    /// Number of distinct live values.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Value whose hash only depends on `bucket`, to force collisions.
    #[derive(Debug, Default, Clone, PartialEq, Eq)]
    struct Colliding {
        bucket: u8,
        id: u32,
    }

    impl Hash for Colliding {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.bucket.hash(state);
        }
    }

    fn colliding(id: u32) -> Colliding {
        Colliding { bucket: 1, id }
    }

    #[test]
    fn test_put_get_take() {
        let mut pool = InternPool::new();
        let a = pool.put("hello".to_string());
        let b = pool.put("world".to_string());
        let c = pool.put("hello".to_string());
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(a), "hello");
        assert_eq!(pool.get(b), "world");

        pool.take(a);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.ref_of(&"hello".to_string()), Some(a));
        pool.take(c);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.ref_of(&"hello".to_string()), None);
        pool.take(b);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_slot_reuse() {
        let mut pool = InternPool::new();
        let a = pool.put(1u64);
        pool.take(a);
        let b = pool.put(2u64);
        assert_eq!(a, b);
        assert_eq!(*pool.get(b), 2);
        assert_eq!(pool.slots.len(), 2);
    }

    #[test]
    fn test_ref_of_does_not_insert() {
        let mut pool: InternPool<u32> = InternPool::new();
        assert_eq!(pool.ref_of(&10), None);
        assert!(pool.is_empty());
        let r = pool.put(10);
        assert_eq!(pool.ref_of(&10), Some(r));
        pool.take(r);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_collision_chain_unlink() {
        let mut pool = InternPool::new();
        let refs: Vec<_> = (0..4).map(|id| pool.put(colliding(id))).collect();
        assert_eq!(pool.len(), 4);
        assert_eq!(pool.chains.len(), 1);

        // middle, head, tail
        pool.take(refs[1]);
        assert_eq!(pool.ref_of(&colliding(1)), None);
        assert_eq!(pool.ref_of(&colliding(2)), Some(refs[2]));
        pool.take(refs[0]);
        assert_eq!(pool.ref_of(&colliding(3)), Some(refs[3]));
        pool.take(refs[3]);
        assert_eq!(pool.ref_of(&colliding(2)), Some(refs[2]));
        assert_eq!(pool.len(), 1);

        // reuse freed slots inside the same chain
        let again = pool.put(colliding(7));
        assert_eq!(pool.get(again), &colliding(7));
        assert_eq!(pool.ref_of(&colliding(2)), Some(refs[2]));
        pool.take(refs[2]);
        pool.take(again);
        assert!(pool.is_empty());
        assert!(pool.chains.is_empty());
    }

    #[test]
    fn test_many_values_no_leak() {
        let mut pool = InternPool::new();
        let mut refs = vec![];
        for round in 0..3 {
            for value in 0..500u32 {
                refs.push(pool.put(value % (100 + round)));
            }
        }
        assert!(pool.len() <= 102);
        for r in refs.drain(..).rev() {
            pool.take(r);
        }
        assert!(pool.is_empty());
        assert!(pool.chains.is_empty());
    }
}
