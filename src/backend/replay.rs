//! Deterministic backend replaying scripted register values.
//!
//! Useful to exercise sessions without privileged access:
//!
//! ```rust
//! use blockperf::backend::replay::{Call, ReplayBackend};
//! use blockperf::count::CounterSession;
//! use blockperf::event::Event;
//!
//! let backend = ReplayBackend::new(2);
//! backend.push_sample([100, 40]);
//! backend.push_sample([600, 140]);
//!
//! let probe = backend.clone();
//! let mut session =
//!     CounterSession::new(backend, [Event::InstructionsRetired, Event::Cycles]).unwrap();
//! session.start().unwrap();
//! let measurement = session.stop().unwrap();
//! drop(session);
//!
//! assert_eq!(measurement.get(Event::InstructionsRetired), Some(500));
//! assert_eq!(probe.calls().last(), Some(&Call::DisableCounting));
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, ErrorKind};
use std::rc::Rc;

use super::{CounterBackend, RawSample, MAX_SLOTS};
use crate::error::{Error, Result};

/// Backend operations, used to inject failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    AvailableSlotCount,
    Configure,
    EnableCounting,
    DisableCounting,
    ReadThreadCounters,
}

/// A recorded backend call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    AvailableSlotCount,
    Configure(Vec<u64>),
    EnableCounting,
    DisableCounting,
    ReadThreadCounters(usize),
}

#[derive(Default)]
struct Script {
    slots: usize,
    samples: VecDeque<RawSample>,
    last: RawSample,
    failing: Vec<Op>,
    calls: Vec<Call>,
    counting: bool,
}

/// Scripted backend with a fixed number of slots.
///
/// Each read pops the next queued sample; once the queue runs dry the last
/// sample is repeated (all zeros if none was ever queued), so an idle window
/// measures zero deltas. Clones share the same script, keep one around to
/// inspect the call journal after a session consumed the backend.
///
/// Like real counters this is bound to one thread.
#[derive(Clone, Default)]
pub struct ReplayBackend {
    script: Rc<RefCell<Script>>,
}

impl ReplayBackend {
    /// Creates a backend reporting `slots` configurable registers.
    pub fn new(slots: usize) -> Self {
        let script = Script {
            slots,
            ..Default::default()
        };
        Self {
            script: Rc::new(RefCell::new(script)),
        }
    }

    /// Queues the register values returned by a later read, slot by slot.
    ///
    /// Values past [`MAX_SLOTS`] are ignored.
    pub fn push_sample<I>(&self, values: I)
    where
        I: IntoIterator<Item = u64>,
    {
        let sample = values.into_iter().take(MAX_SLOTS).collect();
        self.script.borrow_mut().samples.push_back(sample);
    }

    /// Makes every following call of `op` fail until [`recover`][Self::recover].
    pub fn fail(&self, op: Op) {
        let mut script = self.script.borrow_mut();
        if !script.failing.contains(&op) {
            script.failing.push(op);
        }
    }

    pub fn recover(&self, op: Op) {
        self.script.borrow_mut().failing.retain(|it| *it != op);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.script.borrow().calls.clone()
    }

    /// Configs written by the most recent successful `configure`.
    pub fn configs(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .rev()
            .find_map(|it| match it {
                Call::Configure(configs) => Some(configs),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn is_counting(&self) -> bool {
        self.script.borrow().counting
    }

    fn enter(&self, call: Call, op: Op) -> Result<()> {
        let mut script = self.script.borrow_mut();
        script.calls.push(call);
        if !script.failing.contains(&op) {
            return Ok(());
        }

        let err = io::Error::new(ErrorKind::PermissionDenied, "replayed failure");
        Err(match op {
            Op::AvailableSlotCount => Error::BackendUnavailable(err),
            Op::Configure => Error::ConfigurationRejected(err),
            Op::EnableCounting => Error::CountingNotEnabled(err),
            Op::DisableCounting => Error::CountingNotDisabled(err),
            Op::ReadThreadCounters => Error::ReadFailed(err),
        })
    }
}

impl CounterBackend for ReplayBackend {
    fn available_slot_count(&self) -> Result<usize> {
        self.enter(Call::AvailableSlotCount, Op::AvailableSlotCount)?;
        Ok(self.script.borrow().slots)
    }

    fn configure(&mut self, configs: &[u64]) -> Result<()> {
        self.enter(Call::Configure(configs.to_vec()), Op::Configure)?;
        if configs.len() > self.script.borrow().slots {
            let err = io::Error::new(ErrorKind::InvalidInput, "more configs than slots");
            return Err(Error::ConfigurationRejected(err));
        }
        Ok(())
    }

    fn enable_counting(&mut self) -> Result<()> {
        self.enter(Call::EnableCounting, Op::EnableCounting)?;
        self.script.borrow_mut().counting = true;
        Ok(())
    }

    fn disable_counting(&mut self) -> Result<()> {
        self.enter(Call::DisableCounting, Op::DisableCounting)?;
        self.script.borrow_mut().counting = false;
        Ok(())
    }

    fn read_thread_counters(&mut self, slots: usize) -> Result<RawSample> {
        self.enter(Call::ReadThreadCounters(slots), Op::ReadThreadCounters)?;

        let mut script = self.script.borrow_mut();
        if slots > script.slots.min(MAX_SLOTS) {
            let err = io::Error::new(ErrorKind::InvalidInput, "more slots than available");
            return Err(Error::ReadFailed(err));
        }
        if let Some(next) = script.samples.pop_front() {
            script.last = next;
        }

        let mut sample: RawSample = script.last.iter().copied().take(slots).collect();
        while sample.len() < slots {
            sample.push(0);
        }
        Ok(sample)
    }
}
