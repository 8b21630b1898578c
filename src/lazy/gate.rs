//! One-shot readiness gate with reset.
//!
//! The current wait point lives behind an [`ArcSwap`]. Waiters snapshot it and
//! block on the snapshot, so the only shared critical section is the pointer
//! swap itself. A waiter parked on an old wait point is released by the fire
//! that belonged to its generation; resetting never strands it.

use arc_swap::ArcSwap;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A single fire-once wait point.
#[derive(Default)]
struct WaitPoint {
    fired: Mutex<bool>,
    cond: Condvar,
}

impl WaitPoint {
    fn is_fired(&self) -> bool {
        *self.fired.lock()
    }

    fn fire(&self) {
        let mut fired = self.fired.lock();
        if !*fired {
            *fired = true;
            self.cond.notify_all();
        }
    }

    fn wait(&self) {
        let mut fired = self.fired.lock();
        while !*fired {
            self.cond.wait(&mut fired);
        }
    }

    fn wait_until(&self, deadline: Instant) -> bool {
        let mut fired = self.fired.lock();
        while !*fired {
            if self.cond.wait_until(&mut fired, deadline).timed_out() {
                return *fired;
            }
        }
        true
    }
}

/// Resettable one-shot readiness signal.
///
/// States are `unready` and `ready`. [`Gate::fire`] moves to ready and
/// releases every waiter; [`Gate::reset`] re-arms a ready gate with a fresh
/// wait point. Resetting an unready gate is a no-op so existing waiters keep
/// their wait point.
pub struct Gate {
    current: ArcSwap<WaitPoint>,
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate {
    /// Create an unready gate.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(WaitPoint::default()),
        }
    }

    /// Create a gate that is already ready.
    pub fn ready() -> Self {
        let gate = Self::new();
        gate.fire();
        gate
    }

    /// Whether the gate has fired, without waiting.
    pub fn is_ready(&self) -> bool {
        self.current.load().is_fired()
    }

    /// Block until the gate fires. Returns immediately when already ready.
    pub fn wait(&self) {
        let point = self.current.load_full();
        point.wait();
    }

    /// Bounded [`Gate::wait`]. Returns whether the gate fired in time.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let point = self.current.load_full();
        point.wait_until(deadline)
    }

    /// Release all current and future waiters of this generation.
    ///
    /// Firing twice without a reset is harmless.
    pub fn fire(&self) {
        self.current.load().fire();
    }

    /// Re-arm a ready gate.
    pub fn reset(&self) {
        self.current.rcu(|point| {
            if point.is_fired() {
                Arc::new(WaitPoint::default())
            } else {
                Arc::clone(point)
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_wait_after_fire_returns_immediately() {
        let gate = Gate::new();
        assert!(!gate.is_ready());
        gate.fire();
        assert!(gate.is_ready());
        gate.wait();
        assert!(gate.wait_timeout(Duration::ZERO));
    }

    #[test]
    fn test_wait_blocks_until_fire() {
        let gate = Arc::new(Gate::new());
        let released = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let released = Arc::clone(&released);
                thread::spawn(move || {
                    gate.wait();
                    released.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        assert_eq!(released.load(Ordering::SeqCst), 0);

        gate.fire();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(released.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_wait_timeout_unready() {
        let gate = Gate::new();
        assert!(!gate.wait_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn test_reset_rearms() {
        let gate = Gate::ready();
        gate.reset();
        assert!(!gate.is_ready());
        assert!(!gate.wait_timeout(Duration::from_millis(10)));
        gate.fire();
        assert!(gate.is_ready());
    }

    #[test]
    fn test_reset_unready_keeps_waiters() {
        let gate = Arc::new(Gate::new());
        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.wait_timeout(Duration::from_secs(5)))
        };

        thread::sleep(Duration::from_millis(20));
        gate.reset();
        gate.fire();

        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_concurrent_fire_reset_never_deadlocks() {
        let gate = Arc::new(Gate::new());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let gate = Arc::clone(&gate);
            handles.push(thread::spawn(move || {
                for _ in 0..200 {
                    gate.wait_timeout(Duration::from_millis(5));
                }
            }));
        }

        {
            let gate = Arc::clone(&gate);
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    gate.fire();
                    gate.reset();
                }
                gate.fire();
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        gate.wait();
    }
}
