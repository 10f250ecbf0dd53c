//! Error injection framework for the mock SDK.
//!
//! Enables configurable failures per SDK entry point (`open`, `stream_on`,
//! `dequeue_frame`, ...) so the session controller's failure paths can be
//! exercised without hardware.

use super::rng::MockRng;
use gx_core::error::{SdkError, SdkErrorKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Error injection configuration for a mock device.
#[derive(Clone, Debug)]
pub struct ErrorConfig {
    /// Per-operation failure rate (0.0 to 1.0)
    failure_rates: Arc<HashMap<&'static str, f64>>,
    /// Specific failure scenarios
    scenarios: Arc<Vec<ErrorScenario>>,
    /// RNG for failure decisions
    rng: Arc<MockRng>,
    /// State tracking for scenarios
    state: Arc<Mutex<ErrorState>>,
}

/// A scripted failure.
#[derive(Debug, Clone)]
pub enum ErrorScenario {
    /// Fail `operation` on every call after `count` successful ones
    FailAfterN {
        /// SDK entry point name.
        operation: &'static str,
        /// Successful calls before failures start.
        count: u32,
    },
    /// Always time out on `operation`
    Timeout {
        /// SDK entry point name.
        operation: &'static str,
    },
    /// Fail `operation` once with a communication error, then recover
    Transient {
        /// SDK entry point name.
        operation: &'static str,
    },
    /// Device reports a hardware fault on `operation` and every call after
    HardwareFault {
        /// SDK entry point name.
        operation: &'static str,
        /// Vendor fault code.
        code: u32,
    },
}

#[derive(Default, Debug)]
struct ErrorState {
    /// Operation counters for FailAfterN scenarios
    operation_counts: HashMap<&'static str, u32>,
    /// Transient scenarios that already fired
    transient_fired: HashMap<&'static str, bool>,
    /// Hardware fault code (0 = no fault)
    hardware_fault_code: u32,
}

impl ErrorConfig {
    /// Create error config with no errors (default)
    pub fn none() -> Self {
        Self::build(HashMap::new(), Vec::new(), None)
    }

    /// Create error config with uniform random failures and specific seed
    pub fn random_failures_seeded(rate: f64, seed: Option<u64>) -> Self {
        let mut rates = HashMap::new();
        rates.insert("*", rate); // Wildcard for all operations
        Self::build(rates, Vec::new(), seed)
    }

    /// Create error config with a single scenario
    pub fn scenario(scenario: ErrorScenario) -> Self {
        Self::scenarios(vec![scenario])
    }

    /// Create error config with multiple scenarios
    pub fn scenarios(scenarios: Vec<ErrorScenario>) -> Self {
        Self::build(HashMap::new(), scenarios, None)
    }

    /// Create error config with custom failure rates per operation
    pub fn with_rates(rates: HashMap<&'static str, f64>) -> Self {
        Self::build(rates, Vec::new(), None)
    }

    fn build(
        rates: HashMap<&'static str, f64>,
        scenarios: Vec<ErrorScenario>,
        seed: Option<u64>,
    ) -> Self {
        Self {
            failure_rates: Arc::new(rates),
            scenarios: Arc::new(scenarios),
            rng: Arc::new(MockRng::new(seed)),
            state: Arc::new(Mutex::new(ErrorState::default())),
        }
    }

    /// Check if an operation should fail and return the matching SDK error
    pub fn check_operation(&self, operation: &'static str) -> Result<(), SdkError> {
        let mut state = self.state.lock();

        if state.hardware_fault_code != 0 {
            return Err(SdkError::new(
                operation,
                SdkErrorKind::Hardware,
                format!("Hardware fault: {}", state.hardware_fault_code),
            ));
        }

        for scenario in self.scenarios.iter() {
            match scenario {
                ErrorScenario::FailAfterN { operation: op, count } if *op == operation => {
                    let current = state.operation_counts.entry(operation).or_insert(0);
                    *current += 1;
                    if *current > *count {
                        return Err(SdkError::new(
                            operation,
                            SdkErrorKind::Hardware,
                            format!("Injected failure after {} operations", count),
                        ));
                    }
                }
                ErrorScenario::Timeout { operation: op } if *op == operation => {
                    return Err(SdkError::timeout(operation));
                }
                ErrorScenario::Transient { operation: op } if *op == operation => {
                    let fired = state.transient_fired.entry(operation).or_insert(false);
                    if !*fired {
                        *fired = true;
                        return Err(SdkError::new(
                            operation,
                            SdkErrorKind::Communication,
                            "Transient communication error",
                        ));
                    }
                }
                ErrorScenario::HardwareFault { operation: op, code } if *op == operation => {
                    state.hardware_fault_code = *code;
                    return Err(SdkError::new(
                        operation,
                        SdkErrorKind::Hardware,
                        format!("Hardware fault: {}", code),
                    ));
                }
                _ => {}
            }
        }

        let rate = self
            .failure_rates
            .get(operation)
            .or_else(|| self.failure_rates.get("*"))
            .copied()
            .unwrap_or(0.0);

        if self.rng.should_fail(rate) {
            return Err(SdkError::new(
                operation,
                SdkErrorKind::Hardware,
                format!("Random failure on operation '{}'", operation),
            ));
        }

        Ok(())
    }

    /// Reset error state (clear counters, faults)
    pub fn reset(&self) {
        *self.state.lock() = ErrorState::default();
    }
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self::none()
    }
}
