use std::io;

use thiserror::Error;

use crate::count::State;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while driving hardware counters.
///
/// Backend failures keep the underlying OS error as their source, most of
/// them boil down to the process lacking the privilege to program counters.
#[derive(Debug, Error)]
pub enum Error {
    /// The privileged counter interface could not be reached.
    #[error("counter backend unavailable. Did you forget to run as root?")]
    BackendUnavailable(#[source] io::Error),

    /// The hardware refused the requested event encoding.
    #[error("counter configuration rejected")]
    ConfigurationRejected(#[source] io::Error),

    #[error("failed to enable counting")]
    CountingNotEnabled(#[source] io::Error),

    #[error("failed to disable counting")]
    CountingNotDisabled(#[source] io::Error),

    #[error("failed to read thread counters")]
    ReadFailed(#[source] io::Error),

    /// Any of the above while a session was being built.
    #[error("failed to initialize counter session")]
    SessionInitialization(#[source] Box<Error>),

    #[error("cannot {op} a session in {state:?} state")]
    InvalidSessionState { op: &'static str, state: State },

    #[error("cannot average over {0} iterations")]
    InvalidDivisor(u64),

    #[error("failed to write report")]
    Report(#[source] io::Error),
}

impl Error {
    pub(crate) fn init(self) -> Self {
        Self::SessionInitialization(Box::new(self))
    }
}
