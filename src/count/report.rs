use std::fmt;

use super::measurement::{Measurement, Value};

/// Header of the elapsed time column.
pub const ELAPSED_LABEL: &str = "Elapsed [ns]";

/// Fixed-width table of a [`Measurement`].
///
/// ```text
///    Elapsed [ns]   Instructions         Cycles
///        1.250000       5.000000       1.000000
/// ```
///
/// Every cell is right-aligned to the column width, cells wider than that
/// are written in full and push the rest of the row.
pub struct Report<'a, T> {
    measurement: &'a Measurement<T>,
    column_width: usize,
}

impl<'a, T: Value> Report<'a, T> {
    pub(super) fn new(measurement: &'a Measurement<T>, column_width: usize) -> Self {
        Self {
            measurement,
            column_width,
        }
    }
}

impl<T: Value> fmt::Display for Report<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.column_width;

        write!(f, "{:>width$}", ELAPSED_LABEL)?;
        for event in self.measurement.events() {
            write!(f, "{:>width$}", event.label())?;
        }
        writeln!(f)?;

        self.measurement.elapsed_ns().fmt_cell(f, width)?;
        for (_, value) in self.measurement.iter() {
            value.fmt_cell(f, width)?;
        }
        writeln!(f)
    }
}
