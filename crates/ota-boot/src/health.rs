// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Health check policy
//!
//! What counts as a healthy boot is up to the device: a self test, a
//! successful connection to the backend, a watchdog that stayed quiet.
//! [`HealthCheck`] is the seam; any `FnMut() -> bool` closure qualifies.

use core::fmt;

/// Decides whether the firmware that just booted may be kept
pub trait HealthCheck {
    /// `true` if the running firmware is good
    fn is_healthy(&mut self) -> bool;
}

impl<F: FnMut() -> bool> HealthCheck for F {
    fn is_healthy(&mut self) -> bool {
        self()
    }
}

/// Why a candidate slot was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RevertReason {
    /// Candidate booted the maximum number of times without a commit
    AttemptsExhausted = 1,
    /// Health check reported a failure
    HealthCheckFailed = 2,
}

impl RevertReason {
    /// Short description for logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AttemptsExhausted => "boot attempts exhausted",
            Self::HealthCheckFailed => "health check failed",
        }
    }
}

impl fmt::Display for RevertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Countdown(u8);

    impl HealthCheck for Countdown {
        fn is_healthy(&mut self) -> bool {
            self.0 = self.0.saturating_sub(1);
            self.0 == 0
        }
    }

    #[test]
    fn test_closure_is_health_check() {
        let mut calls = 0;
        let mut check = || {
            calls += 1;
            calls > 1
        };
        assert!(!check.is_healthy());
        assert!(check.is_healthy());
    }

    #[test]
    fn test_stateful_check() {
        let mut check = Countdown(2);
        assert!(!check.is_healthy());
        assert!(check.is_healthy());
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(
            std::format!("{}", RevertReason::AttemptsExhausted),
            "boot attempts exhausted"
        );
    }
}
