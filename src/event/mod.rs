//! Hardware events and their human readable labels.
//!
//! The set of events is closed and fixed per target: each supported
//! architecture has its own table of event selector codes, chosen at
//! build time.


#[cfg(target_arch = "x86_64")]
mod x86;
#[cfg(target_arch = "x86_64")]
pub use x86::Event;

#[cfg(all(target_arch = "aarch64", target_vendor = "apple"))]
mod apple;
#[cfg(all(target_arch = "aarch64", target_vendor = "apple"))]
pub use apple::Event;

#[cfg(all(target_arch = "aarch64", not(target_vendor = "apple")))]
mod arm;
#[cfg(all(target_arch = "aarch64", not(target_vendor = "apple")))]
pub use arm::Event;

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
compile_error!("hardware events are only defined for x86_64 and aarch64 targets");

/// Bits of a config word holding the raw event selector (and unit mask).
pub const SELECTOR_MASK: u64 = 0xFFFF;

/// Count events while the CPU executes user-mode code.
///
/// Intel 64 and IA-32 Architectures Software Developer's Manual, Volume 3,
/// Section 18.2.1.1 (`IA32_PERFEVTSELx.USR`). The Apple PMU config uses the
/// same bit for EL0 counting.
pub const USER_MODE: u64 = 0x1_0000;

macro_rules! catalog {
    ($($(#[$meta:meta])* $name:ident = $code:literal => $label:literal,)+) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub enum Event {
            $($(#[$meta])* $name,)+
        }

        impl Event {
            /// Every event this target knows about, in declaration order.
            pub const ALL: &'static [Event] = &[$(Event::$name,)+];

            /// Platform defined event selector code.
            pub const fn code(self) -> u64 {
                match self {
                    $(Event::$name => $code,)+
                }
            }

            pub const fn label(self) -> &'static str {
                match self {
                    $(Event::$name => $label,)+
                }
            }

            pub const fn from_code(code: u64) -> Option<Self> {
                match code {
                    $($code => Some(Event::$name),)+
                    _ => None,
                }
            }
        }
    };
}
use catalog;

impl Event {
    /// Events measured when the caller does not ask for specific ones.
    pub fn defaults() -> &'static [Event] {
        DEFAULT
    }

    /// Encodes the event into the register configuration word handed to
    /// [`CounterBackend::configure`][crate::backend::CounterBackend::configure].
    pub const fn config(self) -> u64 {
        (self.code() & SELECTOR_MASK) | USER_MODE
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(target_arch = "x86_64")]
use x86::DEFAULT;

#[cfg(all(target_arch = "aarch64", target_vendor = "apple"))]
use apple::DEFAULT;

#[cfg(all(target_arch = "aarch64", not(target_vendor = "apple")))]
use arm::DEFAULT;

/// Lookup from raw event codes to labels.
#[derive(Clone, Copy, Debug, Default)]
pub struct EventCatalog;

impl EventCatalog {
    /// Label rendered for codes this target does not define.
    pub const UNIMPLEMENTED: &'static str = "Unimplemented";

    /// Returns the label of `code`, or [`UNIMPLEMENTED`][Self::UNIMPLEMENTED]
    /// if no event on this target uses it.
    pub fn label_for(code: u64) -> &'static str {
        match Event::from_code(code) {
            Some(event) => event.label(),
            None => Self::UNIMPLEMENTED,
        }
    }

    pub fn events() -> &'static [Event] {
        Event::ALL
    }
}
