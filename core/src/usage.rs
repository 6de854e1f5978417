/// Accumulated user+system CPU time reported by the host for a child
/// process, as read back by `wait4`/`getrusage`.
///
/// The two components are kept separate (rather than pre-summed) because
/// the host layer fills them in straight from `struct rusage`, and summing
/// is a read-time concern (see [`ResourceUsage::total_ms`]).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResourceUsage {
    pub user_ms: u64,
    pub system_ms: u64,
}

impl ResourceUsage {
    pub const ZERO: Self = Self {
        user_ms: 0,
        system_ms: 0,
    };

    pub fn from_user_system_ms(user_ms: u64, system_ms: u64) -> Self {
        Self {
            user_ms,
            system_ms,
        }
    }

    /// Total accumulated CPU time in milliseconds.
    pub fn total_ms(&self) -> u64 {
        self.user_ms + self.system_ms
    }

    /// Difference between `self` (the more recent sample) and `prev`.
    ///
    /// Saturates at zero: CPU time reported by the host is monotonically
    /// nondecreasing for a live process, but a fresh [`ResourceUsage`]
    /// sample from a just-spawned task can legitimately be `<=` an earlier
    /// one if the task is short-lived enough that both samples land in the
    /// same accounting tick.
    pub fn delta_ms(&self, prev: ResourceUsage) -> u64 {
        self.total_ms().saturating_sub(prev.total_ms())
    }
}
