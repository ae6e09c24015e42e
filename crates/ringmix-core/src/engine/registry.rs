//! Buffer registry - insertion-ordered arena of live buffers
//!
//! Slots are addressed by a [`BufferId`] carrying the slot index and the
//! generation it was issued at. Removing a buffer bumps the slot generation, so
//! a stale id can never reach a buffer that later reuses the slot.
//!
//! Insertion order is a doubly-linked list threaded through slot indices, which
//! keeps both `register` and `deregister` O(1) without any pointers into the
//! buffers themselves.

use std::sync::{Arc, Mutex};

use super::buffer::AudioBuffer;

/// A buffer shared between the registry and whoever drives it
pub type SharedBuffer = Arc<Mutex<AudioBuffer>>;

/// Generation-checked handle to a registered buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId {
    index: u32,
    generation: u32,
}

impl BufferId {
    /// Slot index (stable for the lifetime of the buffer)
    pub fn index(&self) -> u32 {
        self.index
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    buffer: Option<SharedBuffer>,
    prev: Option<u32>,
    next: Option<u32>,
}

/// Ordered collection of live buffers
#[derive(Debug, Default)]
pub struct Registry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a buffer at the tail
    pub fn register(&mut self, buffer: SharedBuffer) -> BufferId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };

        let prev = self.tail;
        {
            let slot = &mut self.slots[index as usize];
            slot.buffer = Some(buffer);
            slot.prev = prev;
            slot.next = None;
        }

        match prev {
            Some(tail) => self.slots[tail as usize].next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;

        BufferId {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    /// Unlink a buffer and hand it back
    ///
    /// Stale or unknown ids are a no-op. The caller should drop the returned
    /// buffer after releasing the session lock.
    pub fn deregister(&mut self, id: BufferId) -> Option<SharedBuffer> {
        if !self.contains(id) {
            return None;
        }

        let (prev, next, buffer) = {
            let slot = &mut self.slots[id.index as usize];
            let prev = slot.prev.take();
            let next = slot.next.take();
            slot.generation = slot.generation.wrapping_add(1);
            (prev, next, slot.buffer.take())
        };

        match prev {
            Some(p) => self.slots[p as usize].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n as usize].prev = prev,
            None => self.tail = prev,
        }

        self.free.push(id.index);
        self.len -= 1;
        buffer
    }

    /// Whether `id` still refers to a live buffer
    pub fn contains(&self, id: BufferId) -> bool {
        self.slots
            .get(id.index as usize)
            .map(|slot| slot.generation == id.generation && slot.buffer.is_some())
            .unwrap_or(false)
    }

    /// Look up a live buffer
    pub fn get(&self, id: BufferId) -> Option<&SharedBuffer> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.buffer.as_ref()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Oldest live buffer
    pub fn head(&self) -> Option<BufferId> {
        self.head.map(|index| self.id_at(index))
    }

    /// Newest live buffer
    pub fn tail(&self) -> Option<BufferId> {
        self.tail.map(|index| self.id_at(index))
    }

    fn id_at(&self, index: u32) -> BufferId {
        BufferId {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    /// Live buffers in insertion order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            registry: self,
            cursor: self.head,
        }
    }

    /// Remove every buffer, returning them in insertion order
    pub fn drain(&mut self) -> Vec<SharedBuffer> {
        let ids: Vec<BufferId> = self.iter().map(|(id, _)| id).collect();
        ids.into_iter().filter_map(|id| self.deregister(id)).collect()
    }
}

/// Insertion-order iterator over live buffers
pub struct Iter<'a> {
    registry: &'a Registry,
    cursor: Option<u32>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (BufferId, &'a SharedBuffer);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let slot = &self.registry.slots[index as usize];
        self.cursor = slot.next;
        let buffer = slot.buffer.as_ref()?;
        Some((
            BufferId {
                index,
                generation: slot.generation,
            },
            buffer,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::BufferUsage;

    fn shared() -> SharedBuffer {
        Arc::new(Mutex::new(AudioBuffer::new(2, 4, BufferUsage::Static).unwrap()))
    }

    fn order(registry: &Registry) -> Vec<BufferId> {
        registry.iter().map(|(id, _)| id).collect()
    }

    #[test]
    fn test_register_appends_in_order() {
        let mut registry = Registry::new();
        let a = registry.register(shared());
        let b = registry.register(shared());
        let c = registry.register(shared());

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.head(), Some(a));
        assert_eq!(registry.tail(), Some(c));
        assert_eq!(order(&registry), vec![a, b, c]);
    }

    #[test]
    fn test_register_deregister_round_trip() {
        let mut registry = Registry::new();
        let a = registry.register(shared());
        let b = registry.register(shared());
        let (head, tail, len) = (registry.head(), registry.tail(), registry.len());

        let c = registry.register(shared());
        assert!(registry.deregister(c).is_some());

        assert_eq!(registry.head(), head);
        assert_eq!(registry.tail(), tail);
        assert_eq!(registry.len(), len);
        assert_eq!(order(&registry), vec![a, b]);
    }

    #[test]
    fn test_deregister_middle_and_ends() {
        let mut registry = Registry::new();
        let a = registry.register(shared());
        let b = registry.register(shared());
        let c = registry.register(shared());

        registry.deregister(b);
        assert_eq!(order(&registry), vec![a, c]);

        registry.deregister(a);
        assert_eq!(registry.head(), Some(c));
        assert_eq!(registry.tail(), Some(c));

        registry.deregister(c);
        assert!(registry.is_empty());
        assert_eq!(registry.head(), None);
        assert_eq!(registry.tail(), None);
    }

    #[test]
    fn test_stale_id_is_noop() {
        let mut registry = Registry::new();
        let a = registry.register(shared());
        assert!(registry.deregister(a).is_some());
        assert!(registry.deregister(a).is_none());

        // Slot reuse must not resurrect the old id
        let b = registry.register(shared());
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert!(registry.get(a).is_none());
        assert!(registry.get(b).is_some());
        assert!(registry.deregister(a).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_removed_slot_links_cleared() {
        let mut registry = Registry::new();
        let _a = registry.register(shared());
        let b = registry.register(shared());
        let _c = registry.register(shared());

        registry.deregister(b);
        let slot = &registry.slots[b.index() as usize];
        assert!(slot.prev.is_none());
        assert!(slot.next.is_none());
        assert!(slot.buffer.is_none());
    }

    #[test]
    fn test_drain_empties_registry() {
        let mut registry = Registry::new();
        for _ in 0..5 {
            registry.register(shared());
        }
        let drained = registry.drain();
        assert_eq!(drained.len(), 5);
        assert!(registry.is_empty());
        assert_eq!(registry.iter().count(), 0);
    }
}
