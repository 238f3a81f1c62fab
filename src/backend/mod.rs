//! Privileged counter interfaces.
//!
//! A [`CounterBackend`] programs the physical counter registers of the calling
//! thread. Sessions never look a backend up themselves, it is always handed
//! to them, so any implementation (including [`replay::ReplayBackend`] for
//! tests) can drive a session.
//!
//! All operations apply to the *calling thread's* counter context: reads never
//! observe other threads, and a backend configured on one thread must be read
//! on that same thread. Callers who need stable core placement must pin the
//! thread themselves before building a session, see
//! [`set_thread_qos`][crate::config::set_thread_qos].


use arrayvec::ArrayVec;

use crate::error::Result;

#[cfg(target_os = "macos")]
pub mod kperf;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub mod perf;
pub mod replay;

/// Upper bound of physical counter registers a backend may report.
pub const MAX_SLOTS: usize = 32;

/// Raw register values captured at one point in time, indexed by slot.
pub type RawSample = ArrayVec<u64, MAX_SLOTS>;

pub trait CounterBackend {
    /// Number of configurable counter registers usable by this process.
    fn available_slot_count(&self) -> Result<usize>;

    /// Writes one encoded event config per slot, starting at slot 0.
    ///
    /// Slots past `configs.len()` are left unused.
    fn configure(&mut self, configs: &[u64]) -> Result<()>;

    /// Turns on global and per-thread counting.
    fn enable_counting(&mut self) -> Result<()>;

    /// Turns counting off again. Called once when a session is dropped.
    fn disable_counting(&mut self) -> Result<()>;

    /// Reads the first `slots` registers of the calling thread.
    fn read_thread_counters(&mut self, slots: usize) -> Result<RawSample>;
}

impl<B: CounterBackend + ?Sized> CounterBackend for &mut B {
    fn available_slot_count(&self) -> Result<usize> {
        (**self).available_slot_count()
    }

    fn configure(&mut self, configs: &[u64]) -> Result<()> {
        (**self).configure(configs)
    }

    fn enable_counting(&mut self) -> Result<()> {
        (**self).enable_counting()
    }

    fn disable_counting(&mut self) -> Result<()> {
        (**self).disable_counting()
    }

    #[inline]
    fn read_thread_counters(&mut self, slots: usize) -> Result<RawSample> {
        (**self).read_thread_counters(slots)
    }
}

impl<B: CounterBackend + ?Sized> CounterBackend for Box<B> {
    fn available_slot_count(&self) -> Result<usize> {
        (**self).available_slot_count()
    }

    fn configure(&mut self, configs: &[u64]) -> Result<()> {
        (**self).configure(configs)
    }

    fn enable_counting(&mut self) -> Result<()> {
        (**self).enable_counting()
    }

    fn disable_counting(&mut self) -> Result<()> {
        (**self).disable_counting()
    }

    #[inline]
    fn read_thread_counters(&mut self, slots: usize) -> Result<RawSample> {
        (**self).read_thread_counters(slots)
    }
}

/// The backend of the host OS.
#[cfg(target_os = "macos")]
pub type Native = kperf::KperfBackend;

/// The backend of the host OS.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub type Native = perf::PerfBackend;

/// Opens the backend of the host OS.
///
/// Resolving the privileged interface happens once per process, later calls
/// reuse the resolved handle.
#[cfg(any(target_os = "macos", target_os = "linux", target_os = "android"))]
pub fn native() -> Result<Native> {
    Native::new()
}
