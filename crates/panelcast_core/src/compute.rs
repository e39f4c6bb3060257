//! Explicit compute-resource configuration.

use serde::{Deserialize, Serialize};

/// Thread-count limits for the numerical backend.
///
/// Matrix kernels oversubscribe the machine when several experiment
/// processes run concurrently. These limits are passed explicitly to
/// the backend's thread pool at process start by the caller; panelcast
/// itself never mutates ambient environment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeSettings {
    /// Maximum worker threads for matrix kernels. `None` leaves the
    /// backend default in place.
    pub max_threads: Option<usize>,
}

impl ComputeSettings {
    /// No limit; the backend chooses.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self { max_threads: None }
    }

    /// Cap matrix kernels at `n` threads.
    #[must_use]
    pub const fn with_max_threads(n: usize) -> Self {
        Self {
            max_threads: Some(n),
        }
    }

    /// A conservative cap for running several trials side by side in
    /// separate processes.
    #[must_use]
    pub const fn shared_host() -> Self {
        Self::with_max_threads(2)
    }
}

impl Default for ComputeSettings {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_settings() {
        assert_eq!(ComputeSettings::default().max_threads, None);
        assert_eq!(ComputeSettings::shared_host().max_threads, Some(2));
        assert_eq!(ComputeSettings::with_max_threads(4).max_threads, Some(4));
    }
}
