//! Counter sessions and their measurements.
//!
//! A [`CounterSession`] maps the requested events onto the counter
//! registers of a [`CounterBackend`], and turns `start`/`stop` pairs into
//! [`Measurement`]s of the code executed in between.
//!
//! Counters are thread-scoped: a session must be started and stopped on the
//! thread that built it. Sessions sharing a backend reprogram all of its
//! registers when built, so only the most recently built one measures what
//! it asked for.

#[cfg(test)]
mod test;

mod mapping;
mod measurement;
mod report;
pub mod scoped;

use std::hint::black_box;
use std::io::{self, ErrorKind};
use std::time::Instant;

pub use mapping::*;
pub use measurement::*;
pub use report::*;
pub use scoped::ScopedSession;

use crate::backend::{CounterBackend, RawSample, MAX_SLOTS};
use crate::config::Opts;
use crate::error::{Error, Result};
use crate::event::Event;

/// Lifecycle of a [`CounterSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Registers are programmed, no window was opened yet.
    Configured,
    /// Between `start` and `stop`.
    Running,
    /// The last window was closed, `start` may open a new one.
    Stopped,
}

/// Measures hardware counters around a block of code.
///
/// Starting and stopping is designed to add as little as possible to the
/// measured window, but it still skews the counts slightly. Counters also
/// have a limited precision. Benchmarks should repeat their body many times
/// and [average][Measurement::averaged] the resulting measurement.
///
/// Dropping the session disables counting, failures to do so are logged.
pub struct CounterSession<B: CounterBackend> {
    backend: B,
    mapping: EventSlotMapping,
    dropped: Vec<Event>,
    counting: bool,
    state: State,
    started_at: Instant,
    baseline: RawSample,
}

impl<B: CounterBackend> CounterSession<B> {
    /// Programs the backend to count `events`.
    ///
    /// If the backend has fewer counter registers than requested events, the
    /// surplus events are not measured; they are logged and kept in
    /// [`dropped`][Self::dropped].
    pub fn new<I>(mut backend: B, events: I) -> Result<Self>
    where
        I: IntoIterator<Item = Event>,
    {
        let events: Vec<Event> = events.into_iter().collect();

        let available = backend.available_slot_count().map_err(Error::init)?;
        let (mapping, surplus) = EventSlotMapping::new(&events, available);

        if !surplus.is_empty() {
            log::warn!(
                "CounterSession::new: only {} counter registers mapped ({} available, at most {}), not measuring {:?}",
                mapping.len(),
                available,
                MAX_SLOTS,
                surplus,
            );
        }
        if mapping.len() < available {
            log::debug!(
                "CounterSession::new: {} counter registers available but only {} selected",
                available,
                mapping.len(),
            );
        }

        backend.configure(&mapping.configs()).map_err(Error::init)?;

        Ok(Self {
            backend,
            dropped: surplus.to_vec(),
            mapping,
            counting: false,
            state: State::Configured,
            started_at: Instant::now(),
            baseline: RawSample::new(),
        })
    }

    /// Programs the backend to count [`Event::defaults`].
    pub fn with_default_events(backend: B) -> Result<Self> {
        Self::new(backend, Event::defaults().iter().copied())
    }

    /// Applies the scheduling hint of `opts`, then programs its events.
    pub fn with_opts(backend: B, opts: &Opts) -> Result<Self> {
        opts.apply_qos();
        Self::new(backend, opts.events.iter().copied())
    }

    pub fn mapping(&self) -> &EventSlotMapping {
        &self.mapping
    }

    /// Requested events that did not get a counter register.
    pub fn dropped(&self) -> &[Event] {
        &self.dropped
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Opens a measurement window.
    ///
    /// Counting is enabled on the first call only. The wall clock is taken
    /// right before the counters, so the window never looks shorter than
    /// the counted work.
    #[inline]
    pub fn start(&mut self) -> Result<()> {
        if self.state == State::Running {
            return Err(Error::InvalidSessionState {
                op: "start",
                state: self.state,
            });
        }

        if !self.counting {
            self.backend.enable_counting()?;
            self.counting = true;
        }

        let started_at = Instant::now();
        let baseline = self.read()?;

        self.started_at = started_at;
        self.baseline = baseline;
        self.state = State::Running;
        Ok(())
    }

    /// Closes the window opened by [`start`][Self::start] and returns the
    /// counter deltas since then.
    ///
    /// Counters are read before the wall clock, mirroring `start`. A failed
    /// read discards the window, the session can be started again.
    ///
    /// Deltas use wrapping subtraction. A register overflowing more than once
    /// during the window is not detected and yields a wrong delta; an end value
    /// below its baseline is logged as a wraparound.
    #[inline]
    pub fn stop(&mut self) -> Result<Measurement> {
        if self.state != State::Running {
            return Err(Error::InvalidSessionState {
                op: "stop",
                state: self.state,
            });
        }

        let end = self.read();
        let elapsed = self.started_at.elapsed();
        self.state = State::Stopped;
        let end = end?;

        let values = self.mapping.iter().map(|(event, slot)| {
            let (baseline, end) = (self.baseline[slot], end[slot]);
            if end < baseline {
                log::warn!(
                    "CounterSession::stop: {} counter wrapped around ({} -> {})",
                    event,
                    baseline,
                    end,
                );
            }
            (event, end.wrapping_sub(baseline))
        });

        Ok(Measurement::new(values, elapsed.as_nanos() as u64))
    }

    /// Measures `f` in a fresh window.
    pub fn measure<F, R>(&mut self, f: F) -> Result<(R, Measurement)>
    where
        F: FnOnce() -> R,
    {
        self.start()?;
        let ret = black_box(f());
        let measurement = self.stop()?;
        Ok((ret, measurement))
    }

    #[inline]
    fn read(&mut self) -> Result<RawSample> {
        let slots = self.mapping.len();
        let sample = self.backend.read_thread_counters(slots)?;
        if sample.len() < slots {
            let err = io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("backend returned {} of {} counters", sample.len(), slots),
            );
            return Err(Error::ReadFailed(err));
        }
        Ok(sample)
    }
}

impl<B: CounterBackend> Drop for CounterSession<B> {
    fn drop(&mut self) {
        if let Err(e) = self.backend.disable_counting() {
            log::warn!("CounterSession::drop: {}", e);
        }
    }
}
