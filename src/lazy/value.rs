//! Generation-stamped lazily published value.

use super::{Gate, SharedError};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

struct Slot<T, E> {
    generation: u64,
    value: Option<Result<T, E>>,
}

/// A value that is published once per generation and awaited by readers.
///
/// The owner calls [`LazyValue::invalidate`] before recomputing and
/// [`LazyValue::publish`] once the result is known. Between the two, every
/// [`LazyValue::get`] blocks. Readers woken by a stale wait point re-check
/// the slot and wait again, so a payload from an older generation is never
/// returned.
pub struct LazyValue<T, E = SharedError> {
    slot: RwLock<Slot<T, E>>,
    gate: Gate,
    generation: AtomicU64,
}

impl<T: Clone, E: Clone> Default for LazyValue<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, E: Clone> LazyValue<T, E> {
    /// Create an empty value at generation 0.
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(Slot {
                generation: 0,
                value: None,
            }),
            gate: Gate::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Non-blocking peek at the current generation's result.
    pub fn try_get(&self) -> Option<Result<T, E>> {
        let slot = self.slot.read();
        if slot.generation != self.generation() {
            return None;
        }
        slot.value.clone()
    }

    /// Block until the current generation is published.
    pub fn get(&self) -> Result<T, E> {
        loop {
            if let Some(value) = self.try_get() {
                return value;
            }
            self.gate.wait();
        }
    }

    /// Bounded [`LazyValue::get`]. `None` when nothing was published in time.
    pub fn get_timeout(&self, timeout: Duration) -> Option<Result<T, E>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(value) = self.try_get() {
                return Some(value);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || !self.gate.wait_timeout(remaining) {
                return self.try_get();
            }
        }
    }

    /// Start a new generation: re-arm the gate and clear the slot.
    ///
    /// Returns the new generation.
    pub fn invalidate(&self) -> u64 {
        self.gate.reset();
        let mut slot = self.slot.write();
        let next = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        slot.generation = next;
        slot.value = None;
        next
    }

    /// Publish the result for the current generation and release readers.
    pub fn publish(&self, value: Result<T, E>) {
        {
            let mut slot = self.slot.write();
            slot.generation = self.generation();
            slot.value = Some(value);
        }
        self.gate.fire();
    }

    /// Whether the current generation has been published.
    pub fn is_ready(&self) -> bool {
        let slot = self.slot.read();
        slot.generation == self.generation() && slot.value.is_some()
    }
}
