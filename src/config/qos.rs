use std::io::Result;

/// Quality of service classes of the calling thread.
///
/// On processors mixing performance and efficiency cores the class decides
/// which kind of core the scheduler prefers, pinning benchmarks to
/// [`UserInteractive`][Self::UserInteractive] keeps them on performance cores:
/// <https://developer.apple.com/library/archive/documentation/Performance/Conceptual/power_efficiency_guidelines_osx/PrioritizeWorkAtTheTaskLevel.html>
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Qos {
    #[default]
    UserInteractive,
    UserInitiated,
    Default,
    Utility,
    Background,
}

/// Applies `qos` to the calling thread.
///
/// Only macOS exposes thread QoS classes, other targets return
/// [`Unsupported`][std::io::ErrorKind::Unsupported]. Whether the scheduler
/// honors the hint is not verified.
#[cfg(target_os = "macos")]
pub fn set_thread_qos(qos: Qos) -> Result<()> {
    use libc::qos_class_t as q;

    let class = match qos {
        Qos::UserInteractive => q::QOS_CLASS_USER_INTERACTIVE,
        Qos::UserInitiated => q::QOS_CLASS_USER_INITIATED,
        Qos::Default => q::QOS_CLASS_DEFAULT,
        Qos::Utility => q::QOS_CLASS_UTILITY,
        Qos::Background => q::QOS_CLASS_BACKGROUND,
    };

    let result = unsafe { libc::pthread_set_qos_class_self_np(class, 0) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::from_raw_os_error(result))
    }
}

#[cfg(not(target_os = "macos"))]
pub fn set_thread_qos(qos: Qos) -> Result<()> {
    let _ = qos;
    Err(std::io::ErrorKind::Unsupported.into())
}
