/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

//! Failure accounting and restart throttling.
//!
//! A child keeps its own [`RestartStatistics`] and ships a copy inside every
//! [`Failure`](crate::message::Failure) it reports. The supervisor's [`RestartLimiter`]
//! reads those statistics to decide whether another restart is allowed and how long to
//! back off before issuing it.

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// Failure history of one actor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartStatistics {
    failure_times: Vec<SystemTime>,
}

impl RestartStatistics {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure now.
    pub fn fail(&mut self) {
        self.failure_times.push(SystemTime::now());
    }

    /// Records a failure at `at`.
    pub fn fail_at(&mut self, at: SystemTime) {
        self.failure_times.push(at);
    }

    /// Total failures recorded.
    pub fn failure_count(&self) -> usize {
        self.failure_times.len()
    }

    /// Failures recorded within `within` of now. A zero window counts everything.
    pub fn number_of_failures(&self, within: Duration) -> usize {
        if within.is_zero() {
            return self.failure_times.len();
        }
        let now = SystemTime::now();
        self.failure_times
            .iter()
            .filter(|at| now.duration_since(**at).unwrap_or_default() < within)
            .count()
    }

    /// Forgets every failure.
    pub fn reset(&mut self) {
        self.failure_times.clear();
    }
}

/// Limits for [`RestartLimiter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartLimiterConfig {
    /// When `false` every restart is allowed immediately.
    pub enabled: bool,
    /// Maximum failures tolerated inside the window.
    pub max_restarts: u32,
    /// Sliding window in milliseconds.
    pub window_ms: u64,
    /// Backoff before the first restart; zero restarts immediately.
    pub initial_backoff_ms: u64,
    /// Backoff ceiling.
    pub max_backoff_ms: u64,
    /// Growth factor applied per additional failure in the window.
    pub backoff_multiplier: f64,
}

impl Default for RestartLimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_restarts: 10,
            window_ms: 10_000,
            initial_backoff_ms: 0,
            max_backoff_ms: 1_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RestartLimiterConfig {
    /// Allows unlimited immediate restarts.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            max_restarts: 0,
            window_ms: 0,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            backoff_multiplier: 0.0,
        }
    }

    /// The window as a `Duration`.
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Decides whether a failing child may be restarted again.
#[derive(Debug, Clone, Default)]
pub struct RestartLimiter {
    config: RestartLimiterConfig,
}

impl RestartLimiter {
    /// Creates a limiter.
    #[must_use]
    pub const fn new(config: RestartLimiterConfig) -> Self {
        Self { config }
    }

    /// The limiter's configuration.
    pub const fn config(&self) -> &RestartLimiterConfig {
        &self.config
    }

    /// Returns the backoff to wait before restarting, or an error when the child has
    /// failed more than `max_restarts` times inside the window.
    pub fn check(&self, stats: &RestartStatistics) -> Result<Duration, RestartLimitExceeded> {
        if !self.config.enabled {
            return Ok(Duration::ZERO);
        }

        let failures = stats.number_of_failures(self.config.window());
        if failures > self.config.max_restarts as usize {
            return Err(RestartLimitExceeded {
                failures,
                max_restarts: self.config.max_restarts,
                window_ms: self.config.window_ms,
            });
        }

        Ok(self.backoff_for(failures))
    }

    fn backoff_for(&self, failures: usize) -> Duration {
        if self.config.initial_backoff_ms == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(failures.saturating_sub(1)).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss)]
        let backoff_ms =
            self.config.initial_backoff_ms as f64 * self.config.backoff_multiplier.powi(exponent);
        #[allow(
            clippy::cast_sign_loss,
            clippy::cast_possible_truncation,
            clippy::cast_precision_loss
        )]
        let capped = backoff_ms.min(self.config.max_backoff_ms as f64).max(0.0) as u64;
        Duration::from_millis(capped)
    }
}

/// A child failed too often.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartLimitExceeded {
    /// Failures inside the window.
    pub failures: usize,
    /// Configured maximum.
    pub max_restarts: u32,
    /// Configured window.
    pub window_ms: u64,
}

impl fmt::Display for RestartLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "restart limit exceeded: {} failures (max {}) in {} ms",
            self.failures, self.max_restarts, self.window_ms
        )
    }
}

impl std::error::Error for RestartLimitExceeded {}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_with(failures: usize) -> RestartStatistics {
        let mut stats = RestartStatistics::new();
        for _ in 0..failures {
            stats.fail();
        }
        stats
    }

    #[test]
    fn statistics_window_excludes_old_failures() {
        let mut stats = RestartStatistics::new();
        stats.fail_at(SystemTime::now() - Duration::from_secs(120));
        stats.fail();

        assert_eq!(stats.failure_count(), 2);
        assert_eq!(stats.number_of_failures(Duration::from_secs(60)), 1);
        assert_eq!(stats.number_of_failures(Duration::ZERO), 2);

        stats.reset();
        assert_eq!(stats.failure_count(), 0);
    }

    #[test]
    fn limiter_rejects_after_max_restarts() {
        let limiter = RestartLimiter::new(RestartLimiterConfig {
            max_restarts: 3,
            ..RestartLimiterConfig::default()
        });

        assert!(limiter.check(&stats_with(3)).is_ok());
        let err = limiter.check(&stats_with(4)).unwrap_err();
        assert_eq!(err.failures, 4);
        assert_eq!(err.max_restarts, 3);
    }

    #[test]
    fn disabled_limiter_always_allows() {
        let limiter = RestartLimiter::new(RestartLimiterConfig::disabled());
        assert_eq!(limiter.check(&stats_with(100)), Ok(Duration::ZERO));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let limiter = RestartLimiter::new(RestartLimiterConfig {
            max_restarts: 20,
            initial_backoff_ms: 100,
            max_backoff_ms: 500,
            ..RestartLimiterConfig::default()
        });

        assert_eq!(limiter.check(&stats_with(1)), Ok(Duration::from_millis(100)));
        assert_eq!(limiter.check(&stats_with(2)), Ok(Duration::from_millis(200)));
        assert_eq!(limiter.check(&stats_with(3)), Ok(Duration::from_millis(400)));
        assert_eq!(limiter.check(&stats_with(4)), Ok(Duration::from_millis(500)));
    }
}
