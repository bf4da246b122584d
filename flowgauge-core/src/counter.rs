//! Edge Counting with Glitch Filtering and a Watch Point
//!
//! ## Overview
//!
//! This module defines the `EdgeCounter` contract the session detector
//! measures against, and `SoftEdgeCounter`, a software counting unit
//! fed from interrupt context through a cloneable [`PulseProbe`].
//!
//! The contract mirrors what dedicated pulse-counting hardware offers:
//! an enable/disable gate, a count that can only be zeroed while the
//! gate is closed, a non-blocking count snapshot, and a one-shot
//! "watch point" that fires from interrupt context when the count
//! reaches a programmed threshold. Platforms with such a peripheral
//! implement the trait over it directly; `SoftEdgeCounter` covers
//! plain GPIO-interrupt platforms and every host-side test.
//!
//! ## Interrupt discipline
//!
//! `PulseProbe::pulse` is the only entry point intended for interrupt
//! context. It touches nothing but atomics and the watch signal:
//!
//! ```text
//! GPIO edge ISR ──▶ probe.pulse(now_us)
//!                     ├─ glitch filter (min spacing since last edge)
//!                     ├─ count += 1
//!                     ├─ first edge? stamp the onset slot
//!                     └─ threshold reached while armed? raise onset
//! ```
//!
//! The probe is the counting resource: it can be claimed exactly once,
//! so there is a single producer by construction. A second `probe()`
//! call fails with [`MeterError::Resource`], the same way allocating an
//! already-claimed hardware unit would.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use alloc::sync::Arc;

use crate::errors::{MeterError, MeterResult};
use crate::signal::OnsetSignal;
use crate::time::Timestamp;

/// Sentinel for "no edge accepted since the last clear"
const NO_EDGE: u64 = u64::MAX;

/// Contract between the session detector and the counting resource
///
/// Counts are monotonically non-decreasing between `clear()` calls.
/// The watch point is one-shot: it fires at most once per arming and
/// may be re-armed after firing. Its firing happens in interrupt
/// context, where the implementation's only allowed actions are
/// capturing the trigger timestamp and raising the onset signal that
/// `take_watch()` drains.
pub trait EdgeCounter {
    /// Enable counting. Edges arriving while stopped are ignored.
    fn start(&mut self) -> MeterResult<()>;

    /// Disable counting. The count remains readable.
    fn stop(&mut self) -> MeterResult<()>;

    /// Zero the count. Fails with `InvalidState` while counting.
    fn clear(&mut self) -> MeterResult<()>;

    /// Non-blocking snapshot of the current count.
    ///
    /// Safe to call at any time, including while counting; reading
    /// does not stop or perturb the count.
    fn read(&self) -> u32;

    /// Arm the one-shot watch point at the given count threshold.
    ///
    /// Any firing still pending from a previous arming is discarded.
    fn arm_watch(&mut self, threshold: u32) -> MeterResult<()>;

    /// Consume a pending watch-point firing.
    ///
    /// Returns the timestamp of the session's first counted edge - the
    /// value the interrupt path stamped before raising - or `None` if
    /// the watch point has not fired since the last take.
    fn take_watch(&self) -> Option<Timestamp>;
}

struct CounterShared {
    count: AtomicU32,
    counting: AtomicBool,
    /// Timestamp of the last accepted edge, for the glitch filter
    last_edge_us: AtomicU64,
    watch: OnsetSignal,
    watch_threshold: AtomicU32,
    watch_armed: AtomicBool,
    probe_claimed: AtomicBool,
    /// Minimum spacing between accepted edges, in nanoseconds
    glitch_ns: u32,
}

/// Software edge-counting unit
///
/// Owns the count and the watch point; hands out a single
/// [`PulseProbe`] for the interrupt path. Construction plays the role
/// of configuring a hardware unit: the glitch filter width is fixed
/// for the counter's lifetime.
pub struct SoftEdgeCounter {
    shared: Arc<CounterShared>,
}

impl SoftEdgeCounter {
    /// Create a stopped, zeroed counter with the given glitch filter
    /// width in nanoseconds.
    pub fn new(glitch_ns: u32) -> Self {
        Self {
            shared: Arc::new(CounterShared {
                count: AtomicU32::new(0),
                counting: AtomicBool::new(false),
                last_edge_us: AtomicU64::new(NO_EDGE),
                watch: OnsetSignal::new(),
                watch_threshold: AtomicU32::new(0),
                watch_armed: AtomicBool::new(false),
                probe_claimed: AtomicBool::new(false),
                glitch_ns,
            }),
        }
    }

    /// Claim the interrupt-side probe.
    ///
    /// The probe is the counting resource; claiming it twice fails
    /// with `Resource`, as the single-producer discipline would
    /// otherwise be unenforceable.
    pub fn probe(&self) -> MeterResult<PulseProbe> {
        if self.shared.probe_claimed.swap(true, Ordering::AcqRel) {
            return Err(MeterError::Resource { reason: "pulse probe already claimed" });
        }
        Ok(PulseProbe { shared: Arc::clone(&self.shared) })
    }
}

impl EdgeCounter for SoftEdgeCounter {
    fn start(&mut self) -> MeterResult<()> {
        self.shared.counting.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&mut self) -> MeterResult<()> {
        self.shared.counting.store(false, Ordering::Release);
        Ok(())
    }

    fn clear(&mut self) -> MeterResult<()> {
        if self.shared.counting.load(Ordering::Acquire) {
            return Err(MeterError::InvalidState { operation: "clear while counting" });
        }
        self.shared.count.store(0, Ordering::Release);
        self.shared.last_edge_us.store(NO_EDGE, Ordering::Release);
        Ok(())
    }

    fn read(&self) -> u32 {
        self.shared.count.load(Ordering::Acquire)
    }

    fn arm_watch(&mut self, threshold: u32) -> MeterResult<()> {
        if threshold == 0 {
            return Err(MeterError::InvalidState { operation: "arm_watch at zero" });
        }
        // Discard a stale firing from a previous arming
        let _ = self.shared.watch.take();
        self.shared.watch_threshold.store(threshold, Ordering::Release);
        self.shared.watch_armed.store(true, Ordering::Release);
        Ok(())
    }

    fn take_watch(&self) -> Option<Timestamp> {
        self.shared.watch.take()
    }
}

/// Interrupt-side handle feeding edges into a [`SoftEdgeCounter`]
///
/// `pulse()` never blocks and never allocates; it is safe to call
/// from an interrupt service routine. The caller supplies the edge
/// timestamp, read from the same monotonic clock the detector uses.
pub struct PulseProbe {
    shared: Arc<CounterShared>,
}

impl core::fmt::Debug for PulseProbe {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PulseProbe").finish_non_exhaustive()
    }
}

impl PulseProbe {
    /// Register one edge observed at `now_us`.
    ///
    /// Edges are dropped while the counter is stopped, and edges
    /// closer than the glitch filter width to the previously accepted
    /// edge are rejected as noise.
    pub fn pulse(&self, now_us: Timestamp) {
        let shared = &*self.shared;
        if !shared.counting.load(Ordering::Acquire) {
            return;
        }

        let last = shared.last_edge_us.load(Ordering::Relaxed);
        if last != NO_EDGE {
            let spacing_ns = now_us.saturating_sub(last).saturating_mul(1_000);
            if spacing_ns < shared.glitch_ns as u64 {
                return;
            }
        }
        shared.last_edge_us.store(now_us, Ordering::Relaxed);

        let previous = shared.count.fetch_add(1, Ordering::AcqRel);
        if previous == 0 {
            // First edge of the session: stamp before any raise can
            // happen, per the producer-before-signal ordering rule.
            shared.watch.stamp(now_us);
        }

        let threshold = shared.watch_threshold.load(Ordering::Acquire);
        if previous + 1 >= threshold && shared.watch_armed.swap(false, Ordering::AcqRel) {
            shared.watch.raise();
        }
    }
}
