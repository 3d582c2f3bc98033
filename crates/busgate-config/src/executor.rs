//! Typed views over the executor-related configuration values.

use std::time::Duration;

/// When handler modules are re-imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadInterval {
    /// Modules are loaded once and kept.
    Disabled,
    /// Modules are reloaded before every resolution.
    Always,
    /// Modules are reloaded once this much time has passed since last load.
    Every(Duration),
}

impl ReloadInterval {
    /// Interprets a raw seconds value: negative (or NaN) disables reloading,
    /// zero reloads on every call.
    #[must_use]
    pub fn from_secs(secs: f64) -> Self {
        if secs.is_nan() || secs < 0.0 {
            return Self::Disabled;
        }
        if secs == 0.0 {
            return Self::Always;
        }
        Duration::try_from_secs_f64(secs).map_or(Self::Disabled, Self::Every)
    }

    /// Whether a module loaded `elapsed` ago must be reloaded.
    #[must_use]
    pub fn is_due(self, elapsed: Duration) -> bool {
        match self {
            Self::Disabled => false,
            Self::Always => true,
            Self::Every(interval) => elapsed >= interval,
        }
    }
}

/// Number of logical cores on the host, never less than one.
#[must_use]
pub fn host_concurrency() -> usize {
    num_cpus::get().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(-1.0, ReloadInterval::Disabled)]
    #[case(f64::NAN, ReloadInterval::Disabled)]
    #[case(0.0, ReloadInterval::Always)]
    #[case(2.5, ReloadInterval::Every(Duration::from_millis(2500)))]
    fn interprets_raw_seconds(#[case] secs: f64, #[case] expected: ReloadInterval) {
        assert_eq!(ReloadInterval::from_secs(secs), expected);
    }

    #[rstest]
    fn interval_is_due_only_after_elapsing() {
        let policy = ReloadInterval::Every(Duration::from_secs(10));
        assert!(!policy.is_due(Duration::from_secs(9)));
        assert!(policy.is_due(Duration::from_secs(10)));
        assert!(ReloadInterval::Always.is_due(Duration::ZERO));
        assert!(!ReloadInterval::Disabled.is_due(Duration::from_secs(3600)));
    }
}
