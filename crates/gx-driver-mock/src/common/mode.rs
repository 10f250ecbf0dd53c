//! Operational modes for the mock SDK.
//!
//! - **Instant**: frames are ready as soon as they are dequeued, for unit tests
//! - **Realistic**: frames arrive at the configured frame interval

use serde::Deserialize;

/// Operational modes for mock devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MockMode {
    /// Zero delays, deterministic - for unit tests
    #[default]
    Instant,
    /// Hardware-like frame pacing - for integration tests and demos
    Realistic,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode() {
        assert_eq!(MockMode::default(), MockMode::Instant);
    }
}
