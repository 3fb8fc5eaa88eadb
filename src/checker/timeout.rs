use std::time::Duration;

/// Size of one timeout increment step.
pub const BYTES_PER_STEP: u64 = 100 * 1024 * 1024;

/// Size-scaled verification timeout, bounded on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    pub base: Duration,
    pub min: Duration,
    pub max: Duration,
    pub per_100mb: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(300),
            min: Duration::from_secs(60),
            max: Duration::from_secs(1800),
            per_100mb: Duration::from_secs(60),
        }
    }
}

impl TimeoutPolicy {
    /// `clamp(min, max, base + floor(size / 100MB) * per_100mb)`
    pub fn for_size(&self, size_bytes: u64) -> Duration {
        let steps = u32::try_from(size_bytes / BYTES_PER_STEP).unwrap_or(u32::MAX);
        let scaled = self.base.saturating_add(self.per_100mb.saturating_mul(steps));
        scaled.max(self.min).min(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn test_scales_with_size() {
        let policy = TimeoutPolicy::default();
        assert_eq!(policy.for_size(250 * MB), Duration::from_secs(420));
        assert_eq!(policy.for_size(99 * MB), Duration::from_secs(300));
        assert_eq!(policy.for_size(0), Duration::from_secs(300));
    }

    #[test]
    fn test_clamped_to_bounds() {
        let policy = TimeoutPolicy::default();
        assert_eq!(policy.for_size(100_000 * MB), Duration::from_secs(1800));
        assert_eq!(policy.for_size(u64::MAX), Duration::from_secs(1800));

        let short = TimeoutPolicy {
            base: Duration::from_secs(5),
            ..TimeoutPolicy::default()
        };
        assert_eq!(short.for_size(10 * MB), Duration::from_secs(60));
    }
}
