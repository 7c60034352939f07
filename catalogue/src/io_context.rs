//! Explicit replacement for the global mutable tick/progress/debug state the
//! original tool kept at file scope (§9 "Global mutable counters and flags").
//! Every core operation that needs to report progress or check for a
//! requested stop takes `&mut IoContext` as an ordinary parameter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One progress notification handed to the caller's callback.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub progress: u64,
    pub progress_hi: u64,
    pub message: String,
}

bitflags::bitflags! {
    /// Debug bitmask; bits are independent and may be combined.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DebugFlags: u32 {
        const VERBOSE_GENERATOR = 1 << 0;
        const VERBOSE_NORMALISE = 1 << 1;
        const VERBOSE_DEPRECIATE = 1 << 2;
    }
}

/// Carries the counters and flags that used to be global statics: a tick
/// flag flipped by a signal handler, progress counters, a debug bitmask, and
/// an optional progress callback. Owns no tables of its own.
pub struct IoContext {
    tick: Arc<AtomicBool>,
    pub progress: u64,
    pub progress_hi: u64,
    pub debug: DebugFlags,
    callback: Option<Box<dyn FnMut(&ProgressEvent)>>,
}

impl IoContext {
    pub fn new() -> Self {
        Self {
            tick: Arc::new(AtomicBool::new(false)),
            progress: 0,
            progress_hi: 0,
            debug: DebugFlags::empty(),
            callback: None,
        }
    }

    /// A clonable handle a signal handler (or any other external source) can
    /// set without touching the `IoContext` itself.
    pub fn tick_handle(&self) -> Arc<AtomicBool> {
        self.tick.clone()
    }

    pub fn tick_requested(&self) -> bool {
        self.tick.load(Ordering::Relaxed)
    }

    pub fn clear_tick(&self) {
        self.tick.store(false, Ordering::Relaxed);
    }

    pub fn set_callback(&mut self, cb: impl FnMut(&ProgressEvent) + 'static) {
        self.callback = Some(Box::new(cb));
    }

    /// Advances `progress` and, if a tick was requested since the last call,
    /// invokes the callback and clears the flag. Core loops call this at
    /// well-defined boundaries (never mid-mutation).
    pub fn report(&mut self, delta: u64, message: impl Into<String>) {
        self.progress += delta;
        if self.tick_requested() {
            if let Some(cb) = self.callback.as_mut() {
                cb(&ProgressEvent {
                    progress: self.progress,
                    progress_hi: self.progress_hi,
                    message: message.into(),
                });
            }
            self.clear_tick();
        }
    }
}

impl Default for IoContext {
    fn default() -> Self {
        Self::new()
    }
}
