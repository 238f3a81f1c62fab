//! Hardware performance counters around a block of code.
//!
//! Measures instructions retired, cache misses, branch mispredictions, cycles
//! and elapsed wall time of the calling thread, with as little overhead in
//! the measured window as possible.
//!
//! ## Example
//!
//! Count what a benchmark loop costs per iteration. The native backend needs
//! root (macOS) or a permissive `perf_event_paranoid` (Linux), so this example
//! replays scripted counter values instead.
//!
//! ```rust
//! use blockperf::backend::replay::ReplayBackend;
//! use blockperf::count::CounterSession;
//! use blockperf::event::Event;
//!
//! // let backend = blockperf::backend::native().unwrap();
//! let backend = ReplayBackend::new(2);
//! backend.push_sample([100, 40]);
//! backend.push_sample([600, 140]);
//!
//! let events = [Event::InstructionsRetired, Event::Cycles];
//! let mut session = CounterSession::new(backend, events).unwrap();
//!
//! let n = 100;
//! let mut acc = 0u64;
//! session.start().unwrap();
//! for i in 0..n {
//!     acc += 0xABCDEF03 / (i + 1);
//!     std::hint::black_box(acc);
//! }
//! let measurement = session.stop().unwrap();
//!
//! let averaged = measurement.averaged(n).unwrap();
//! assert_eq!(averaged.get(Event::InstructionsRetired), Some(5.0));
//! assert_eq!(averaged.get(Event::Cycles), Some(1.0));
//! println!("{}", averaged);
//! ```
//!
//! For a whole block, [`ScopedSession`][count::ScopedSession] starts on
//! construction and reports the averages when it goes out of scope.
//!
//! ## Stable measurements
//!
//! Counters only see the calling thread. On processors mixing performance and
//! efficiency cores, ask for a [scheduling class][config::set_thread_qos]
//! before building a session.

pub mod backend;
pub mod config;
pub mod count;
pub mod error;
pub mod event;
#[cfg(any(target_os = "linux", target_os = "android"))]
mod ffi;

pub use error::{Error, Result};
