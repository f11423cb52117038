//! Single-value rendezvous between the workers of a generation and the
//! orchestrator.
//!
//! All accessors live on [`SlotGuard`], so nothing can read or write the
//! value without holding the lock. Dropping the guard releases it.

use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
pub struct ResultSlot<T> {
    value: Mutex<Option<T>>,
}

impl<T> Default for ResultSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to a [`ResultSlot`] for one check-and-act sequence.
#[derive(Debug)]
pub struct SlotGuard<'a, T> {
    value: MutexGuard<'a, Option<T>>,
}

impl<T> ResultSlot<T> {
    pub fn new() -> Self {
        Self { value: Mutex::new(None) }
    }

    pub fn acquire(&self) -> SlotGuard<'_, T> {
        // every write is a whole `Option` store, so a poisoned lock still
        // holds a consistent value
        let value = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        SlotGuard { value }
    }
}

impl<'a, T> SlotGuard<'a, T> {
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Store `value`, replacing whatever was there.
    pub fn publish(&mut self, value: T) {
        *self.value = Some(value);
    }

    /// Store `value` only if the slot is empty. Returns whether it was stored.
    pub fn publish_if_empty(&mut self, value: T) -> bool {
        if self.has_value() {
            return false;
        }
        self.publish(value);
        true
    }

    pub fn clear(&mut self) {
        *self.value = None;
    }

    /// # Panics
    ///
    /// Panics if the slot is empty; check [`SlotGuard::has_value`] first.
    pub fn peek(&self) -> &T {
        match self.value.as_ref() {
            Some(value) => value,
            None => panic!("result slot read while empty"),
        }
    }

    /// Read and clear in one step.
    pub fn take(&mut self) -> Option<T> {
        self.value.take()
    }

    /// Explicit release, same as dropping the guard.
    pub fn release(self) {}
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Barrier},
        thread,
    };

    use super::*;

    #[test]
    fn publish_peek_clear() {
        let slot = ResultSlot::new();
        let mut guard = slot.acquire();
        assert!(!guard.has_value());
        guard.publish(7u64);
        assert!(guard.has_value());
        assert_eq!(*guard.peek(), 7);
        guard.publish(9);
        assert_eq!(*guard.peek(), 9);
        guard.clear();
        assert!(!guard.has_value());
        guard.release();

        assert!(!slot.acquire().has_value());
    }

    #[test]
    fn clear_on_empty_slot_is_a_no_op() {
        let slot = ResultSlot::<u64>::new();
        let mut guard = slot.acquire();
        assert!(!guard.has_value());
        guard.clear();
        assert!(!guard.has_value());
    }

    #[test]
    #[should_panic(expected = "result slot read while empty")]
    fn peek_on_empty_slot_panics() {
        let slot = ResultSlot::<u64>::new();
        let guard = slot.acquire();
        guard.peek();
    }

    #[test]
    fn publish_if_empty_keeps_first_value() {
        let slot = ResultSlot::new();
        assert!(slot.acquire().publish_if_empty(1u64));
        assert!(!slot.acquire().publish_if_empty(2));
        assert_eq!(slot.acquire().take(), Some(1));
        assert_eq!(slot.acquire().take(), None);
    }

    #[test]
    fn racing_publishers_leave_exactly_one_value() {
        let slot = Arc::new(ResultSlot::new());
        let workers = 16;
        let barrier = Arc::new(Barrier::new(workers));

        let handles: Vec<_> = (0..workers as u64)
            .map(|id| {
                let slot = slot.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    slot.acquire().publish_if_empty(id)
                })
            })
            .collect();

        let winners = handles.into_iter().map(|h| h.join().unwrap()).filter(|won| *won).count();
        assert_eq!(winners, 1);
        assert!(slot.acquire().has_value());
    }
}
