//! One-Shot Deferred Timers for Idle Detection
//!
//! ## Overview
//!
//! The detector's idle timeout rides on a one-shot deferred timer: arm
//! it for N microseconds, and if nothing re-arms or cancels it first,
//! it raises a [`SignalFlag`] from its own execution context. The
//! contract is deliberately small - it matches both a hardware timer
//! peripheral firing an interrupt and the thread-backed implementation
//! used on std hosts.
//!
//! Arming is restart semantics: a pending deadline is replaced, never
//! stacked. The firing side only ever raises the flag; the consumer
//! drains it with `take_fired()` at its own pace.
//!
//! Two implementations ship with the crate:
//! - [`ThreadTimer`]: a worker thread sleeping until the deadline
//!   (std). The worker never holds a lock the arming side waits on.
//! - [`ManualTimer`]: a deadline cell fired explicitly by whoever owns
//!   the clock, for deterministic tests and simulation.

use crate::errors::MeterResult;
use crate::signal::SignalFlag;
use crate::time::TimeSource;

/// One-shot deferred timer driving the idle signal
pub trait DeferredTimer {
    /// Arm (or restart) the timer to fire after `delay_us`.
    ///
    /// Replaces any pending deadline. A firing already delivered but
    /// not yet consumed stays pending; the consumer decides whether it
    /// is stale (see the detector's gap re-check).
    fn arm(&mut self, delay_us: u64) -> MeterResult<()>;

    /// Drop the pending deadline, if any. Does not clear a firing that
    /// has already been delivered.
    fn cancel(&mut self) -> MeterResult<()>;

    /// Consume a delivered firing. Returns `true` at most once per
    /// firing.
    fn take_fired(&self) -> bool;
}

// ---------------------------------------------------------------------------
// Thread-backed implementation (std)
// ---------------------------------------------------------------------------

#[cfg(feature = "std")]
mod thread_timer {
    use super::*;

    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    use alloc::sync::Arc;

    enum Cmd {
        Arm(Instant),
        Cancel,
        Shutdown,
    }

    /// Deferred timer backed by a dedicated worker thread
    ///
    /// The worker owns the pending deadline; arming and canceling are
    /// message sends, so the foreground task never blocks on the
    /// worker. Commands are processed in order, which makes `arm`
    /// after `arm` a clean restart.
    pub struct ThreadTimer {
        fired: Arc<SignalFlag>,
        tx: mpsc::Sender<Cmd>,
        worker: Option<std::thread::JoinHandle<()>>,
    }

    impl ThreadTimer {
        /// Spawn the worker thread and return the timer handle.
        ///
        /// Fails with `Resource` if the thread cannot be created -
        /// fatal at init, like any other unavailable timing resource.
        pub fn spawn() -> crate::errors::MeterResult<Self> {
            let fired = Arc::new(SignalFlag::new());
            let flag = Arc::clone(&fired);
            let (tx, rx) = mpsc::channel::<Cmd>();

            let worker = std::thread::Builder::new()
                .name("flowgauge-idle-timer".into())
                .spawn(move || Self::run(rx, flag))
                .map_err(|_| crate::errors::MeterError::Resource {
                    reason: "idle timer thread unavailable",
                })?;

            Ok(Self { fired, tx, worker: Some(worker) })
        }

        fn run(rx: mpsc::Receiver<Cmd>, fired: Arc<SignalFlag>) {
            let mut pending: Option<Instant> = None;
            loop {
                let cmd = match pending {
                    None => match rx.recv() {
                        Ok(cmd) => cmd,
                        Err(_) => break,
                    },
                    Some(deadline) => {
                        let now = Instant::now();
                        if deadline <= now {
                            fired.raise();
                            pending = None;
                            continue;
                        }
                        match rx.recv_timeout(deadline - now) {
                            Ok(cmd) => cmd,
                            Err(mpsc::RecvTimeoutError::Timeout) => {
                                fired.raise();
                                pending = None;
                                continue;
                            }
                            Err(mpsc::RecvTimeoutError::Disconnected) => break,
                        }
                    }
                };
                match cmd {
                    Cmd::Arm(deadline) => pending = Some(deadline),
                    Cmd::Cancel => pending = None,
                    Cmd::Shutdown => break,
                }
            }
        }
    }

    impl DeferredTimer for ThreadTimer {
        fn arm(&mut self, delay_us: u64) -> MeterResult<()> {
            let deadline = Instant::now() + Duration::from_micros(delay_us);
            // Send only fails once the worker is gone, i.e. during teardown
            let _ = self.tx.send(Cmd::Arm(deadline));
            Ok(())
        }

        fn cancel(&mut self) -> MeterResult<()> {
            let _ = self.tx.send(Cmd::Cancel);
            Ok(())
        }

        fn take_fired(&self) -> bool {
            self.fired.take()
        }
    }

    impl Drop for ThreadTimer {
        fn drop(&mut self) {
            let _ = self.tx.send(Cmd::Shutdown);
            if let Some(worker) = self.worker.take() {
                let _ = worker.join();
            }
        }
    }
}

#[cfg(feature = "std")]
pub use thread_timer::ThreadTimer;

// ---------------------------------------------------------------------------
// Manually-driven implementation (tests, simulation, no_std)
// ---------------------------------------------------------------------------

use core::sync::atomic::{AtomicU64, Ordering};

use alloc::sync::Arc;

/// Sentinel for "no deadline armed"
const DISARMED: u64 = u64::MAX;

struct ManualShared<T: TimeSource> {
    clock: T,
    deadline_us: AtomicU64,
    fired: SignalFlag,
}

/// Deferred timer fired explicitly by the owner of the clock
///
/// Clones share the deadline and flag, so a simulation can hold one
/// handle and call [`ManualTimer::fire_due`] as it advances its mock
/// clock, while the detector owns another handle:
///
/// ```
/// use flowgauge_core::time::MockTime;
/// use flowgauge_core::timer::{DeferredTimer, ManualTimer};
///
/// let clock = MockTime::new(0);
/// let mut timer = ManualTimer::new(clock.clone());
/// let sim = timer.clone();
///
/// timer.arm(1_000).unwrap();
/// clock.advance_us(999);
/// sim.fire_due();
/// assert!(!timer.take_fired());
///
/// clock.advance_us(1);
/// sim.fire_due();
/// assert!(timer.take_fired());
/// ```
pub struct ManualTimer<T: TimeSource> {
    shared: Arc<ManualShared<T>>,
}

impl<T: TimeSource> Clone for ManualTimer<T> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<T: TimeSource> ManualTimer<T> {
    /// Create a disarmed timer reading deadlines off `clock`
    pub fn new(clock: T) -> Self {
        Self {
            shared: Arc::new(ManualShared {
                clock,
                deadline_us: AtomicU64::new(DISARMED),
                fired: SignalFlag::new(),
            }),
        }
    }

    /// Deliver the firing if the armed deadline has passed.
    ///
    /// The simulation calls this after every clock step; a disarmed
    /// timer is a no-op.
    pub fn fire_due(&self) {
        let shared = &*self.shared;
        let deadline = shared.deadline_us.load(Ordering::Acquire);
        if deadline != DISARMED && shared.clock.now_us() >= deadline {
            shared.deadline_us.store(DISARMED, Ordering::Release);
            shared.fired.raise();
        }
    }
}

impl<T: TimeSource> DeferredTimer for ManualTimer<T> {
    fn arm(&mut self, delay_us: u64) -> MeterResult<()> {
        let deadline = self.shared.clock.now_us().saturating_add(delay_us);
        self.shared.deadline_us.store(deadline, Ordering::Release);
        Ok(())
    }

    fn cancel(&mut self) -> MeterResult<()> {
        self.shared.deadline_us.store(DISARMED, Ordering::Release);
        Ok(())
    }

    fn take_fired(&self) -> bool {
        self.shared.fired.take()
    }
}
