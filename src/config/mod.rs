use crate::event::Event;

mod qos;

pub use qos::*;

/// Default width (in chars) of each report column, enough to align values
/// up to about ten significant digits.
pub const DEFAULT_COLUMN_WIDTH: usize = 15;

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Opts {
    /// Events to measure, in report order.
    ///
    /// Only as many as the backend has counter registers are measured,
    /// the rest are dropped with a warning.
    pub events: Vec<Event>,

    /// Width of each report column.
    pub column_width: usize,

    /// Scheduling class applied to the calling thread before the session is
    /// built. Failing to apply it is logged and otherwise ignored.
    pub qos: Option<Qos>,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            events: Event::defaults().to_vec(),
            column_width: DEFAULT_COLUMN_WIDTH,
            qos: None,
        }
    }
}

impl Opts {
    pub(crate) fn apply_qos(&self) {
        if let Some(qos) = self.qos {
            if let Err(e) = set_thread_qos(qos) {
                log::warn!("Opts::apply_qos: failed to set {:?}: {}", qos, e);
            }
        }
    }
}
