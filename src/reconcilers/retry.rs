// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Exponential backoff for failed reconciliations.
//!
//! A hard error returned from a reconcile pass is handed to the controller's
//! error policy, which requeues the route after a delay that doubles with each
//! consecutive failure of that route. A successful pass resets the count.
//! Soft target errors are successes and never reach this module.

use crate::constants::{
    ERROR_BACKOFF_INITIAL_MILLIS, ERROR_BACKOFF_MAX_SECS, ERROR_BACKOFF_MULTIPLIER,
    ERROR_BACKOFF_RANDOMIZATION,
};
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Simple exponential backoff implementation.
///
/// Provides exponential backoff with randomization (jitter) to prevent thundering herd.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    /// Interval before any failure
    pub initial_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
}

impl Default for ExponentialBackoff {
    /// - **Initial interval**: 1 second
    /// - **Max interval**: 5 minutes
    /// - **Multiplier**: 2.0
    /// - **Randomization**: ±10%
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(ERROR_BACKOFF_INITIAL_MILLIS),
            max_interval: Duration::from_secs(ERROR_BACKOFF_MAX_SECS),
            multiplier: ERROR_BACKOFF_MULTIPLIER,
            randomization_factor: ERROR_BACKOFF_RANDOMIZATION,
        }
    }
}

impl ExponentialBackoff {
    /// Un-jittered interval after `failures` consecutive failures (1-based).
    #[must_use]
    pub fn interval(&self, failures: u32) -> Duration {
        let exponent = i32::try_from(failures.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_interval.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_interval.as_secs_f64() {
            return self.max_interval;
        }
        Duration::from_secs_f64(secs)
    }

    /// Apply randomization (jitter) to an interval.
    #[must_use]
    pub fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let min = secs - delta;
        let max = secs + delta;

        let mut rng = rand::rng();
        let jittered = rng.random_range(min..=max);

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Consecutive failure counts per object key.
#[derive(Debug, Default)]
pub struct FailureBackoff {
    backoff: ExponentialBackoff,
    failures: Mutex<HashMap<String, u32>>,
}

impl FailureBackoff {
    #[must_use]
    pub fn new(backoff: ExponentialBackoff) -> Self {
        Self {
            backoff,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failure for `key` and return how long to wait before retrying.
    pub fn next_delay(&self, key: &str) -> Duration {
        let failures = {
            let mut failures = self
                .failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let count = failures.entry(key.to_string()).or_insert(0);
            *count = count.saturating_add(1);
            *count
        };
        let delay = self.backoff.apply_jitter(self.backoff.interval(failures));
        debug!(key, failures, delay = ?delay, "Backing off after reconcile failure");
        delay
    }

    /// Forget the failures of `key` after a successful pass.
    pub fn reset(&self, key: &str) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Drop the failure counts of every key `keep` rejects.
    ///
    /// Routes deleted while failing never pass again, so their keys are only
    /// released here.
    pub fn retain(&self, mut keep: impl FnMut(&str) -> bool) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|key, _| keep(key));
    }

    /// Current consecutive failure count of `key`.
    #[must_use]
    pub fn failures(&self, key: &str) -> u32 {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
