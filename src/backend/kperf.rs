//! macOS backend built on the private kperf framework.
//!
//! The framework is not linked, it is loaded with `dlopen` the first time a
//! backend is created and the resolved entry points are kept for the rest of
//! the process. Programming counters requires root.
//!
//! Only the configurable counter class is used: the fixed counters of Intel
//! Macs always count every ring, and leaving them out keeps slot `i` equal to
//! the `i`-th value returned by `kpc_get_thread_counters`.

use std::ffi::{c_void, CStr};
use std::io;
use std::mem::transmute;
use std::sync::OnceLock;

use super::{CounterBackend, RawSample, MAX_SLOTS};
use crate::error::{Error, Result};

const KPERF_PATH: &CStr = c"/System/Library/PrivateFrameworks/kperf.framework/Versions/A/kperf";

const KPC_CLASS_CONFIGURABLE_MASK: u32 = 1 << 1;

type KpcForceAllCtrsSet = unsafe extern "C" fn(i32) -> i32;
type KpcSetCounting = unsafe extern "C" fn(u32) -> i32;
type KpcSetThreadCounting = unsafe extern "C" fn(u32) -> i32;
type KpcSetConfig = unsafe extern "C" fn(u32, *mut c_void) -> i32;
type KpcGetThreadCounters = unsafe extern "C" fn(i32, u32, *mut c_void) -> i32;
type KpcGetCounterCount = unsafe extern "C" fn(u32) -> u32;
type KpcGetConfigCount = unsafe extern "C" fn(u32) -> u32;

pub(super) struct Kperf {
    force_all_ctrs_set: KpcForceAllCtrsSet,
    set_counting: KpcSetCounting,
    set_thread_counting: KpcSetThreadCounting,
    set_config: KpcSetConfig,
    get_thread_counters: KpcGetThreadCounters,
    get_counter_count: KpcGetCounterCount,
    get_config_count: KpcGetConfigCount,
}

// A failed load is kept as well, `dlopen` is not retried.
static KPERF: OnceLock<Result<Kperf, String>> = OnceLock::new();

pub(super) fn load() -> Result<&'static Kperf> {
    let kperf = KPERF.get_or_init(|| {
        let kperf = unsafe { resolve() };
        match &kperf {
            Ok(_) => log::debug!("kperf: resolved {:?}", KPERF_PATH),
            Err(e) => log::debug!("kperf: {}", e),
        }
        kperf
    });

    kperf
        .as_ref()
        .map_err(|msg| Error::BackendUnavailable(io::Error::other(msg.clone())))
}

unsafe fn resolve() -> Result<Kperf, String> {
    let lib = libc::dlopen(KPERF_PATH.as_ptr(), libc::RTLD_LAZY);
    if lib.is_null() {
        return Err(format!("unable to load kperf: {}", dlerror()));
    }

    macro_rules! sym {
        ($name:literal) => {{
            let sym = libc::dlsym(lib, concat!($name, "\0").as_ptr() as *const _);
            if sym.is_null() {
                return Err(format!("kperf missing symbol {}: {}", $name, dlerror()));
            }
            transmute::<*mut c_void, _>(sym)
        }};
    }

    Ok(Kperf {
        force_all_ctrs_set: sym!("kpc_force_all_ctrs_set"),
        set_counting: sym!("kpc_set_counting"),
        set_thread_counting: sym!("kpc_set_thread_counting"),
        set_config: sym!("kpc_set_config"),
        get_thread_counters: sym!("kpc_get_thread_counters"),
        get_counter_count: sym!("kpc_get_counter_count"),
        get_config_count: sym!("kpc_get_config_count"),
    })
}

fn dlerror() -> String {
    let msg = unsafe { libc::dlerror() };
    if msg.is_null() {
        return "unknown error".to_string();
    }
    unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
}

fn check(ret: i32, what: &str) -> io::Result<()> {
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::other(format!("{} returned {}", what, ret)))
    }
}

pub struct KperfBackend {
    kperf: &'static Kperf,
}

impl KperfBackend {
    pub fn new() -> Result<Self> {
        Ok(Self { kperf: load()? })
    }
}

impl CounterBackend for KperfBackend {
    fn available_slot_count(&self) -> Result<usize> {
        let count = unsafe { (self.kperf.get_counter_count)(KPC_CLASS_CONFIGURABLE_MASK) };
        Ok((count as usize).min(MAX_SLOTS))
    }

    fn configure(&mut self, configs: &[u64]) -> Result<()> {
        let kperf = self.kperf;

        let count = unsafe { (kperf.get_config_count)(KPC_CLASS_CONFIGURABLE_MASK) } as usize;
        if configs.len() > count {
            let err = io::Error::new(io::ErrorKind::InvalidInput, "more configs than counters");
            return Err(Error::ConfigurationRejected(err));
        }

        // `kpc_set_config` always writes the whole class.
        let mut buf = vec![0u64; count];
        buf[..configs.len()].copy_from_slice(configs);

        let ret = unsafe { (kperf.set_config)(KPC_CLASS_CONFIGURABLE_MASK, buf.as_mut_ptr() as _) };
        check(ret, "kpc_set_config").map_err(Error::ConfigurationRejected)?;

        // Take the counters away from the OS (e.g. the power manager).
        let ret = unsafe { (kperf.force_all_ctrs_set)(1) };
        check(ret, "kpc_force_all_ctrs_set").map_err(Error::ConfigurationRejected)?;

        Ok(())
    }

    fn enable_counting(&mut self) -> Result<()> {
        let kperf = self.kperf;
        let ret = unsafe { (kperf.set_counting)(KPC_CLASS_CONFIGURABLE_MASK) };
        check(ret, "kpc_set_counting").map_err(Error::CountingNotEnabled)?;
        let ret = unsafe { (kperf.set_thread_counting)(KPC_CLASS_CONFIGURABLE_MASK) };
        check(ret, "kpc_set_thread_counting").map_err(Error::CountingNotEnabled)?;
        Ok(())
    }

    fn disable_counting(&mut self) -> Result<()> {
        let kperf = self.kperf;
        // Attempt every step, report the first failure.
        let results = unsafe {
            [
                check((kperf.set_thread_counting)(0), "kpc_set_thread_counting"),
                check((kperf.set_counting)(0), "kpc_set_counting"),
                check((kperf.force_all_ctrs_set)(0), "kpc_force_all_ctrs_set"),
            ]
        };
        results
            .into_iter()
            .collect::<io::Result<Vec<_>>>()
            .map_err(Error::CountingNotDisabled)?;
        Ok(())
    }

    #[inline]
    fn read_thread_counters(&mut self, slots: usize) -> Result<RawSample> {
        let kperf = self.kperf;

        let mut buf = [0u64; MAX_SLOTS];
        let count = unsafe { (kperf.get_counter_count)(KPC_CLASS_CONFIGURABLE_MASK) } as usize;
        let count = count.min(MAX_SLOTS);
        if slots > count {
            let err = io::Error::new(io::ErrorKind::InvalidInput, "more slots than counters");
            return Err(Error::ReadFailed(err));
        }

        let ret = unsafe { (kperf.get_thread_counters)(0, count as _, buf.as_mut_ptr() as _) };
        check(ret, "kpc_get_thread_counters").map_err(Error::ReadFailed)?;

        Ok(buf[..slots].iter().copied().collect())
    }
}
