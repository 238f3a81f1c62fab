use std::io::{self, Stdout, Write};
use std::thread;

use super::{CounterSession, Measurement};
use crate::backend::CounterBackend;
use crate::config::Opts;
use crate::error::{Error, Result};
use crate::event::Event;

/// Block counter: measures everything until it goes out of scope.
///
/// The window opens as the last step of construction. When the value is
/// dropped, on every exit path including early returns and unwinding, the
/// window is closed, averaged over the iteration count and rendered to the
/// sink.
///
/// # Panics
///
/// Dropping panics if the window cannot be closed or reported, a benchmark
/// is never left without its measurement. While the thread is already
/// unwinding the failure is logged instead. Use [`finish`][Self::finish] to
/// handle these errors.
///
/// ```rust
/// use blockperf::backend::replay::ReplayBackend;
/// use blockperf::count::ScopedSession;
/// use blockperf::event::Event;
///
/// let backend = ReplayBackend::new(2);
/// backend.push_sample([0, 0]);
/// backend.push_sample([3_000, 1_000]);
///
/// let n = 1_000;
/// {
///     let events = [Event::InstructionsRetired, Event::Cycles];
///     let _block = ScopedSession::new(backend, n, events).unwrap();
///     for i in 0..n {
///         std::hint::black_box(i);
///     }
/// } // Prints the per-iteration averages here.
/// ```
pub struct ScopedSession<B: CounterBackend, W: Write = Stdout> {
    session: CounterSession<B>,
    iterations: u64,
    column_width: usize,
    sink: W,
    finished: bool,
}

impl<B: CounterBackend> ScopedSession<B> {
    /// Starts measuring `events`, reporting to stdout.
    ///
    /// `iterations` is the number of times the measured block repeats its
    /// benchmark body, the report shows values divided by it.
    pub fn new<I>(backend: B, iterations: u64, events: I) -> Result<Self>
    where
        I: IntoIterator<Item = Event>,
    {
        let opts = Opts {
            events: events.into_iter().collect(),
            ..Default::default()
        };
        Self::with_opts(backend, iterations, &opts, io::stdout())
    }
}

impl<B: CounterBackend, W: Write> ScopedSession<B, W> {
    /// Starts measuring as configured by `opts`, reporting to `sink`.
    pub fn with_opts(backend: B, iterations: u64, opts: &Opts, sink: W) -> Result<Self> {
        if iterations == 0 {
            return Err(Error::InvalidDivisor(iterations));
        }

        let mut session = CounterSession::with_opts(backend, opts)?;
        session.start().map_err(Error::init)?;

        Ok(Self {
            session,
            iterations,
            column_width: opts.column_width,
            sink,
            finished: false,
        })
    }

    pub fn session(&self) -> &CounterSession<B> {
        &self.session
    }

    /// Closes the window now, renders the averaged measurement and returns it.
    pub fn finish(mut self) -> Result<Measurement<f64>> {
        self.report()
    }

    fn report(&mut self) -> Result<Measurement<f64>> {
        self.finished = true;

        let measurement = self.session.stop()?.averaged(self.iterations)?;
        measurement
            .render(&mut self.sink, self.column_width)
            .map_err(Error::Report)?;
        Ok(measurement)
    }
}

impl<B: CounterBackend, W: Write> Drop for ScopedSession<B, W> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.report() {
            if thread::panicking() {
                log::error!("ScopedSession::drop: {}", e);
            } else {
                panic!("ScopedSession::drop: {}", e);
            }
        }
    }
}
