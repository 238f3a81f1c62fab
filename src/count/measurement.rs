use std::fmt;
use std::io::{self, Write};

use arrayvec::ArrayVec;

use super::report::Report;
use crate::backend::MAX_SLOTS;
use crate::config::DEFAULT_COLUMN_WIDTH;
use crate::error::{Error, Result};
use crate::event::Event;

mod private {
    pub trait Sealed {}
    impl Sealed for u64 {}
    impl Sealed for f64 {}
}

/// Counter values a [`Measurement`] can hold: raw `u64` deltas, or `f64`
/// averages.
pub trait Value: Copy + PartialEq + fmt::Debug + private::Sealed {
    fn as_f64(self) -> f64;

    /// Writes the value right-aligned in a `width` chars wide cell.
    fn fmt_cell(self, f: &mut fmt::Formatter<'_>, width: usize) -> fmt::Result;
}

impl Value for u64 {
    fn as_f64(self) -> f64 {
        self as f64
    }

    fn fmt_cell(self, f: &mut fmt::Formatter<'_>, width: usize) -> fmt::Result {
        write!(f, "{:>width$}", self)
    }
}

impl Value for f64 {
    fn as_f64(self) -> f64 {
        self
    }

    fn fmt_cell(self, f: &mut fmt::Formatter<'_>, width: usize) -> fmt::Result {
        write!(f, "{:>width$.6}", self)
    }
}

/// Counter deltas and elapsed wall time of one start/stop window.
///
/// Values are kept in mapping order. Raw measurements hold `u64` deltas,
/// [`averaged`][Self::averaged] ones hold `f64` values.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Measurement<T = u64> {
    values: ArrayVec<(Event, T), MAX_SLOTS>,
    elapsed_ns: T,
}

impl<T: Value> Measurement<T> {
    /// Builds a measurement from `(event, value)` pairs.
    ///
    /// Pairs past [`MAX_SLOTS`] are ignored.
    pub fn new<I>(values: I, elapsed_ns: T) -> Self
    where
        I: IntoIterator<Item = (Event, T)>,
    {
        Self {
            values: values.into_iter().take(MAX_SLOTS).collect(),
            elapsed_ns,
        }
    }

    /// Value of `event`, if it was measured.
    pub fn get(&self, event: Event) -> Option<T> {
        self.values
            .iter()
            .find(|(it, _)| *it == event)
            .map(|(_, value)| *value)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (Event, T)> + '_ {
        self.values.iter().copied()
    }

    pub fn events(&self) -> impl ExactSizeIterator<Item = Event> + '_ {
        self.values.iter().map(|(event, _)| *event)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Wall time of the window in nanoseconds.
    pub fn elapsed_ns(&self) -> T {
        self.elapsed_ns
    }

    /// Divides every value, and the elapsed time, by `n`.
    ///
    /// Meant to turn the totals of an `n` iterations benchmark loop into
    /// per-iteration figures. `self` is left untouched, so the same raw
    /// measurement can be averaged again with other divisors.
    pub fn averaged(&self, n: u64) -> Result<Measurement<f64>> {
        if n == 0 {
            return Err(Error::InvalidDivisor(n));
        }

        let n = n as f64;
        let values = self
            .values
            .iter()
            .map(|(event, value)| (*event, value.as_f64() / n))
            .collect();

        Ok(Measurement {
            values,
            elapsed_ns: self.elapsed_ns.as_f64() / n,
        })
    }

    /// Two-row table (header and values) with `column_width` chars per column.
    pub fn report(&self, column_width: usize) -> Report<'_, T> {
        Report::new(self, column_width)
    }

    /// Writes the [report][Self::report] to `out`.
    pub fn render<W>(&self, out: &mut W, column_width: usize) -> io::Result<()>
    where
        W: Write + ?Sized,
    {
        write!(out, "{}", self.report(column_width))?;
        out.flush()
    }
}

impl<T: Value> fmt::Display for Measurement<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.report(DEFAULT_COLUMN_WIDTH), f)
    }
}
