pub mod syscall;

pub use perf_event_open_sys::bindings;

pub type Attr = bindings::perf_event_attr;

// `_IO('$', nr)` requests:
// https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L550
pub const PERF_IOC_OP_ENABLE: u64 = 0x2400;
pub const PERF_IOC_OP_DISABLE: u64 = 0x2401;
