use kernel_vmem::TlbMissPolicy;
use std::time::Duration;
use utils_accessors_derive::Setters;

/// Boot-time kernel parameters.
///
/// ```
/// use kernel::KernelConfig;
/// use std::time::Duration;
///
/// let config = KernelConfig::new()
///     .with_quantum(Duration::from_millis(10))
///     .with_seed(Some(7));
/// assert_eq!(config.demotion_threshold(), 5);
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq, Setters)]
pub struct KernelConfig {
    /// Interval of the timer interrupt.
    #[setters(get)]
    quantum: Duration,

    /// Consecutive dispatches after which a running process is demoted.
    #[setters(get)]
    demotion_threshold: u32,

    #[setters(get)]
    tlb_miss_policy: TlbMissPolicy,

    /// Return a terminated process's mapped pages to the pool.
    #[setters(get)]
    release_pages_on_exit: bool,

    /// Seed for every random source in the kernel; entropy when `None`.
    #[setters(get)]
    seed: Option<u64>,

    /// Run the timer thread. Without it, only blocking calls switch processes.
    #[setters(get)]
    timer_enabled: bool,
}

impl KernelConfig {
    pub const DEFAULT_QUANTUM: Duration = Duration::from_millis(250);
    pub const DEFAULT_DEMOTION_THRESHOLD: u32 = 5;

    #[must_use]
    pub const fn new() -> Self {
        Self {
            quantum: Self::DEFAULT_QUANTUM,
            demotion_threshold: Self::DEFAULT_DEMOTION_THRESHOLD,
            tlb_miss_policy: TlbMissPolicy::TrueMapping,
            release_pages_on_exit: true,
            seed: None,
            timer_enabled: true,
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}
