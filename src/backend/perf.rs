//! Linux backend built on the `perf_event_open` system call.
//!
//! Every configured slot becomes one raw perf event bound to the calling
//! thread (`pid = 0`, any CPU). The events form a single group led by the
//! first slot, so they are scheduled onto the PMU together and read with
//! one `read` call. The leader is pinned: if the group cannot stay on the
//! PMU, reads fail instead of returning multiplexed estimates.
//!
//! Opening raw user-mode events requires `/proc/sys/kernel/perf_event_paranoid`
//! to be 2 or lower (or `CAP_PERFMON`). Only Intel processors are supported,
//! other CPUs report [`BackendUnavailable`][Error::BackendUnavailable].

use std::fs::File;
use std::io::{self, ErrorKind};
use std::os::fd::AsRawFd;
use std::sync::LazyLock;

use super::{CounterBackend, RawSample, MAX_SLOTS};
use crate::error::{Error, Result};
use crate::event::{SELECTOR_MASK, USER_MODE};
use crate::ffi::bindings as b;
use crate::ffi::syscall::{ioctl_arg, perf_event_open, read};
use crate::ffi::{Attr, PERF_IOC_OP_DISABLE, PERF_IOC_OP_ENABLE};

// Counter topology never changes while the process runs.
static SLOTS: LazyLock<Option<usize>> = LazyLock::new(|| {
    let slots = detect_slots();
    log::info!("PerfBackend: general purpose counters: {:?}", slots);
    slots
});

pub struct PerfBackend {
    slots: usize,
    // Group leader first.
    counters: Vec<File>,
}

impl PerfBackend {
    /// Checks that perf events can be opened for the calling thread and
    /// discovers the number of programmable counters.
    pub fn new() -> Result<Self> {
        let slots = (*SLOTS).ok_or_else(|| {
            let err = io::Error::new(
                ErrorKind::Unsupported,
                "no supported general purpose counters on this CPU (Intel only)",
            );
            Error::BackendUnavailable(err)
        })?;

        // A software event only needs the weakest permission, failing here
        // means no counter can be opened at all.
        let mut probe = Attr {
            size: size_of::<Attr>() as _,
            type_: b::PERF_TYPE_SOFTWARE as _,
            config: b::PERF_COUNT_SW_DUMMY as _,
            ..Default::default()
        };
        probe.set_disabled(1);
        probe.set_exclude_kernel(1);
        probe.set_exclude_hv(1);
        let flags = b::PERF_FLAG_FD_CLOEXEC as u64;
        perf_event_open(&probe, 0, -1, -1, flags).map_err(Error::BackendUnavailable)?;

        Ok(Self {
            slots: slots.min(MAX_SLOTS),
            counters: vec![],
        })
    }

    fn leader(&self) -> Option<&File> {
        self.counters.first()
    }
}

impl CounterBackend for PerfBackend {
    fn available_slot_count(&self) -> Result<usize> {
        Ok(self.slots)
    }

    fn configure(&mut self, configs: &[u64]) -> Result<()> {
        if configs.len() > self.slots {
            let err = io::Error::new(ErrorKind::InvalidInput, "more configs than counters");
            return Err(Error::ConfigurationRejected(err));
        }

        // Dropping the previous group closes its events.
        self.counters.clear();

        let mut counters: Vec<File> = Vec::with_capacity(configs.len());
        for &config in configs {
            let leader = counters.first();
            let attr = attr_from(config, leader.is_none());
            let group_fd = leader.map_or(-1, |it| it.as_raw_fd());
            let flags = b::PERF_FLAG_FD_CLOEXEC as u64;
            let perf =
                perf_event_open(&attr, 0, -1, group_fd, flags).map_err(Error::ConfigurationRejected)?;
            counters.push(perf);
        }
        self.counters = counters;

        Ok(())
    }

    fn enable_counting(&mut self) -> Result<()> {
        if let Some(leader) = self.leader() {
            let flag = b::PERF_IOC_FLAG_GROUP as u64;
            ioctl_arg(leader, PERF_IOC_OP_ENABLE, flag).map_err(Error::CountingNotEnabled)?;
        }
        Ok(())
    }

    fn disable_counting(&mut self) -> Result<()> {
        if let Some(leader) = self.leader() {
            let flag = b::PERF_IOC_FLAG_GROUP as u64;
            ioctl_arg(leader, PERF_IOC_OP_DISABLE, flag).map_err(Error::CountingNotDisabled)?;
        }
        Ok(())
    }

    #[inline]
    fn read_thread_counters(&mut self, slots: usize) -> Result<RawSample> {
        let mut sample = RawSample::new();
        if slots == 0 {
            return Ok(sample);
        }
        let Some(leader) = self.leader() else {
            let err = io::Error::new(ErrorKind::InvalidInput, "no counters configured");
            return Err(Error::ReadFailed(err));
        };

        // struct read_format {
        //     u64 nr;
        //     { u64 value; } cntr[nr];
        // } && PERF_FORMAT_GROUP
        let mut buf = [0; size_of::<u64>() * (1 + MAX_SLOTS)];
        let len = read(leader, &mut buf).map_err(Error::ReadFailed)?;

        let mut words = buf[..len].chunks_exact(size_of::<u64>()).map(|chunk| {
            let mut word = [0; size_of::<u64>()];
            word.copy_from_slice(chunk);
            u64::from_ne_bytes(word)
        });

        // A pinned group that lost its PMU reads as end-of-file.
        let nr = words.next().unwrap_or(0) as usize;
        if nr < slots {
            let err = io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("read {} of {} counters", nr, slots),
            );
            return Err(Error::ReadFailed(err));
        }

        sample.extend(words.take(slots));
        Ok(sample)
    }
}

pub(super) fn attr_from(config: u64, leader: bool) -> Attr {
    let mut attr = Attr {
        size: size_of::<Attr>() as _,
        type_: b::PERF_TYPE_RAW as _,
        config: config & SELECTOR_MASK,
        read_format: b::PERF_FORMAT_GROUP as _,
        ..Default::default()
    };
    // Siblings follow the leader's enable state.
    attr.set_disabled(u64::from(leader));
    attr.set_pinned(u64::from(leader));
    attr.set_exclude_kernel(u64::from(config & USER_MODE != 0));
    attr.set_exclude_hv(1);
    attr
}

#[cfg(target_arch = "x86_64")]
fn detect_slots() -> Option<usize> {
    use std::arch::x86_64::__cpuid;

    #[allow(unused_unsafe)]
    let leaf0 = unsafe { __cpuid(0) };
    let mut vendor = [0; 12];
    vendor[0..4].copy_from_slice(&leaf0.ebx.to_le_bytes());
    vendor[4..8].copy_from_slice(&leaf0.edx.to_le_bytes());
    vendor[8..12].copy_from_slice(&leaf0.ecx.to_le_bytes());

    #[allow(unused_unsafe)]
    let pmu = (leaf0.eax >= 0xa).then(|| unsafe { __cpuid(0xa) }.eax);
    slots_from(&vendor, pmu)
}

/// Programmable counters of a CPU from its vendor string and the EAX of its
/// architectural performance monitoring leaf (0xA), if it has one.
///
/// EAX[7:0] is the version, EAX[15:8] the counters per logical processor.
/// The x86 event table uses Intel selector encodings, which mean something
/// else on other vendors (AMD counts core cycles with 0x76, not 0x3C), so
/// they report no counters.
#[cfg(target_arch = "x86_64")]
pub(super) fn slots_from(vendor: &[u8; 12], pmu: Option<u32>) -> Option<usize> {
    if vendor != b"GenuineIntel" {
        return None;
    }

    let eax = pmu?;
    let version = eax & 0xff;
    let counters = (eax >> 8) & 0xff;
    (version > 0 && counters > 0).then_some(counters as usize)
}

#[cfg(not(target_arch = "x86_64"))]
fn detect_slots() -> Option<usize> {
    None
}
