//! Lock-Free Interrupt-to-Task Hand-Off Signals
//!
//! ## Overview
//!
//! This module implements the two notification primitives the session
//! engine shares between its interrupt-context producer and its
//! foreground consumer: a single-slot binary signal, and the same
//! signal paired with a timestamp side-slot for the flow-onset event.
//!
//! ## Why Lock-Free?
//!
//! The producer runs in interrupt context and must never block. A
//! mutex is out of the question there (priority inversion, deadlock on
//! re-entry), so both primitives are built on bare atomics:
//!
//! ```text
//! Producer (ISR)                      Consumer (task)
//!      │                                   │
//!  write stamp (Relaxed)                   │
//!  raise flag  (Release) ───────────▶  take flag  (Acquire)
//!      │                               read stamp (Relaxed)
//!  Never blocks                        Never blocks
//! ```
//!
//! ## Semantics
//!
//! A signal holds at most one pending notification. Raising an
//! already-raised signal is a no-op, not an error: if the watch point
//! re-fires before the consumer gets around to taking the flag, only
//! the first set matters. The signal carries no payload; any data
//! belonging to the triggering event lives in a side slot that the
//! producer writes *before* raising and the consumer reads only
//! *after* observing the flag. The Release store on raise and the
//! Acquire swap on take order those two accesses, so the consumer can
//! never observe a stale or torn stamp.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::time::Timestamp;

/// Single-slot binary signal, settable from interrupt context
///
/// The `const` constructor allows placement in a `static` when an
/// interrupt handler needs a fixed address to raise against.
#[derive(Debug)]
pub struct SignalFlag {
    raised: AtomicBool,
}

impl SignalFlag {
    /// Create a lowered signal
    pub const fn new() -> Self {
        Self { raised: AtomicBool::new(false) }
    }

    /// Raise the signal. Idempotent; safe from interrupt context.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Consume a pending raise, lowering the signal.
    ///
    /// Returns `true` exactly once per raise..take cycle no matter how
    /// many times the producer raised in between.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::Acquire)
    }

    /// Peek without consuming
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

impl Default for SignalFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Binary signal with a timestamp side-slot for the onset event
///
/// The producer stamps the slot when the session's first edge arrives
/// and raises the flag later, when the watch point confirms the flow
/// is real. `stamp()` must happen-before `raise()` on the producer
/// side; the flag's Release/Acquire pair then guarantees the consumer
/// reads the stamp only after it is fully written.
#[derive(Debug)]
pub struct OnsetSignal {
    stamp_us: AtomicU64,
    flag: SignalFlag,
}

impl OnsetSignal {
    /// Create a lowered signal with a zeroed stamp
    pub const fn new() -> Self {
        Self {
            stamp_us: AtomicU64::new(0),
            flag: SignalFlag::new(),
        }
    }

    /// Record the event timestamp. Producer side, before `raise()`.
    pub fn stamp(&self, timestamp_us: Timestamp) {
        self.stamp_us.store(timestamp_us, Ordering::Relaxed);
    }

    /// Raise the signal. The stamp must already be written.
    pub fn raise(&self) {
        self.flag.raise();
    }

    /// Consume a pending raise, returning the stamped timestamp.
    ///
    /// Returns `None` while the signal is lowered. The stamp is only
    /// read after the flag is observed, per the ordering contract.
    pub fn take(&self) -> Option<Timestamp> {
        if self.flag.take() {
            Some(self.stamp_us.load(Ordering::Relaxed))
        } else {
            None
        }
    }
}

impl Default for OnsetSignal {
    fn default() -> Self {
        Self::new()
    }
}
