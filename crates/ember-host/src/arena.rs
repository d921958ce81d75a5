//! Generational arena for captured functions
//!
//! A captured function is kept alive by its slot until it is released or the
//! engine is torn down. Handles carry the slot's generation, so a handle
//! outliving its slot is detected instead of reaching a reused slot.

use std::rc::Rc;

use ember_sdk::FunctionHandle;

use crate::value::Callable;

struct Slot {
    generation: u32,
    callable: Option<Rc<Callable>>,
}

/// Slots for captured functions
#[derive(Default)]
pub struct FunctionArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

fn next_generation(generation: u32) -> u32 {
    // Generation 0 marks the null handle.
    match generation.wrapping_add(1) {
        0 => 1,
        g => g,
    }
}

impl FunctionArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `callable`, returning its handle
    pub fn insert(&mut self, callable: Rc<Callable>) -> FunctionHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.callable = Some(callable);
            return FunctionHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 1,
            callable: Some(callable),
        });
        FunctionHandle {
            index,
            generation: 1,
        }
    }

    fn slot(&self, handle: FunctionHandle) -> Option<&Slot> {
        if handle.is_null() {
            return None;
        }
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.callable.is_some())
    }

    /// The function behind a live handle
    pub fn get(&self, handle: FunctionHandle) -> Option<Rc<Callable>> {
        self.slot(handle).and_then(|slot| slot.callable.clone())
    }

    /// Check whether `handle` names a live slot
    pub fn contains(&self, handle: FunctionHandle) -> bool {
        self.slot(handle).is_some()
    }

    /// Free the slot behind `handle`. Returns `false` for stale handles.
    pub fn release(&mut self, handle: FunctionHandle) -> bool {
        if !self.contains(handle) {
            return false;
        }
        let slot = &mut self.slots[handle.index as usize];
        slot.callable = None;
        slot.generation = next_generation(slot.generation);
        self.free.push(handle.index);
        true
    }

    /// Free every slot; all outstanding handles become stale
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.callable.take().is_some() {
                slot.generation = next_generation(slot.generation);
                self.free.push(index as u32);
            }
        }
    }

    /// Number of live slots
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Check for no live slots
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn callable(name: &str) -> Rc<Callable> {
        Rc::new(Callable::Script {
            name: Rc::from(name),
            body: Box::new(|_, _| Ok(Value::Undefined)),
        })
    }

    #[test]
    fn test_insert_and_get() {
        let mut arena = FunctionArena::new();
        let h = arena.insert(callable("f"));
        assert!(!h.is_null());
        assert_eq!(arena.get(h).map(|c| c.name().to_string()), Some("f".into()));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_release_makes_handle_stale() {
        let mut arena = FunctionArena::new();
        let old = arena.insert(callable("f"));
        assert!(arena.release(old));
        assert!(!arena.release(old));
        assert!(arena.get(old).is_none());

        // The slot is reused under a new generation.
        let new = arena.insert(callable("g"));
        assert_eq!(new.index, old.index);
        assert_ne!(new.generation, old.generation);
        assert!(arena.get(old).is_none());
        assert!(arena.get(new).is_some());
    }

    #[test]
    fn test_clear_invalidates_everything() {
        let mut arena = FunctionArena::new();
        let a = arena.insert(callable("a"));
        let b = arena.insert(callable("b"));
        arena.clear();
        assert!(arena.is_empty());
        assert!(!arena.contains(a));
        assert!(!arena.contains(b));
        assert!(arena.get(FunctionHandle::NULL).is_none());
    }

    #[test]
    fn test_generation_skips_zero() {
        assert_eq!(next_generation(u32::MAX), 1);
        assert_eq!(next_generation(1), 2);
    }
}
