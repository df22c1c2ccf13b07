//! Frame Cadence Configuration
//!
//! Tuning knobs for the rate estimator, the refresh-frame requester and the
//! zero-hertz repeat cadence, with a builder pattern for ergonomic
//! construction.
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//! use lamco_frame_cadence::CadenceConfig;
//!
//! // Using builder pattern
//! let config = CadenceConfig::builder()
//!     .frame_rate_window(Duration::from_secs(2))
//!     .idle_repeat_period(Duration::from_millis(500))
//!     .build();
//!
//! // Using struct literal with defaults
//! let config = CadenceConfig {
//!     zero_hertz_enabled: false,
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;

use crate::{
    FRAME_RATE_AVERAGING_WINDOW, ON_DISCARDED_FRAME_REFRESH_FRAME_PERIOD,
    ZERO_HERTZ_IDLE_REPEAT_RATE_PERIOD,
};

/// Configuration for a frame cadence adapter
///
/// Use [`CadenceConfig::builder()`] for ergonomic construction or struct
/// literal syntax with [`Default::default()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CadenceConfig {
    /// Averaging window of the input frame rate estimator (default: 1s)
    ///
    /// Longer windows give a steadier estimate but react slower to rate
    /// changes. Must be longer than 1ms.
    pub frame_rate_window: Duration,

    /// Frame periods to wait before requesting a refresh frame (default: 3)
    ///
    /// Applies after a discarded frame, after entering zero-hertz mode and
    /// after an unanswered key frame request. Once the grace period has
    /// passed, refresh frames are requested every frame period until a real
    /// frame arrives.
    pub refresh_grace_periods: u32,

    /// Repeat period once every enabled layer has converged (default: 1s)
    pub idle_repeat_period: Duration,

    /// Allow zero-hertz mode to activate (default: true)
    ///
    /// When false, zero-hertz parameters are remembered but frames are
    /// always passed straight through.
    pub zero_hertz_enabled: bool,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            frame_rate_window: FRAME_RATE_AVERAGING_WINDOW,
            refresh_grace_periods: ON_DISCARDED_FRAME_REFRESH_FRAME_PERIOD,
            idle_repeat_period: ZERO_HERTZ_IDLE_REPEAT_RATE_PERIOD,
            zero_hertz_enabled: true,
        }
    }
}

impl CadenceConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lamco_frame_cadence::CadenceConfig;
    ///
    /// let config = CadenceConfig::builder()
    ///     .refresh_grace_periods(5)
    ///     .build();
    /// assert_eq!(config.refresh_grace_periods, 5);
    /// ```
    #[must_use]
    pub fn builder() -> CadenceConfigBuilder {
        CadenceConfigBuilder::default()
    }

    /// Validate configuration and return any issues
    ///
    /// Returns `Ok(())` if configuration is valid, or a list of issues.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut issues = Vec::new();

        if self.frame_rate_window <= Duration::from_millis(1) {
            issues.push("frame_rate_window must be longer than 1ms".to_string());
        }

        if self.refresh_grace_periods == 0 {
            issues.push("refresh_grace_periods must be at least 1".to_string());
        }

        if self.idle_repeat_period.is_zero() {
            issues.push("idle_repeat_period must be non-zero".to_string());
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

/// Builder for [`CadenceConfig`]
#[derive(Debug, Clone, Default)]
pub struct CadenceConfigBuilder {
    frame_rate_window: Option<Duration>,
    refresh_grace_periods: Option<u32>,
    idle_repeat_period: Option<Duration>,
    zero_hertz_enabled: Option<bool>,
}

impl CadenceConfigBuilder {
    /// Set the input frame rate averaging window
    #[must_use]
    pub fn frame_rate_window(mut self, window: Duration) -> Self {
        self.frame_rate_window = Some(window);
        self
    }

    /// Set the refresh grace period in frame periods
    #[must_use]
    pub fn refresh_grace_periods(mut self, periods: u32) -> Self {
        self.refresh_grace_periods = Some(periods);
        self
    }

    /// Set the converged repeat period
    #[must_use]
    pub fn idle_repeat_period(mut self, period: Duration) -> Self {
        self.idle_repeat_period = Some(period);
        self
    }

    /// Set whether zero-hertz mode may activate
    #[must_use]
    pub fn zero_hertz_enabled(mut self, enable: bool) -> Self {
        self.zero_hertz_enabled = Some(enable);
        self
    }

    /// Build the configuration
    ///
    /// Returns a [`CadenceConfig`] with builder values overriding defaults.
    #[must_use]
    pub fn build(self) -> CadenceConfig {
        let defaults = CadenceConfig::default();

        CadenceConfig {
            frame_rate_window: self.frame_rate_window.unwrap_or(defaults.frame_rate_window),
            refresh_grace_periods: self
                .refresh_grace_periods
                .unwrap_or(defaults.refresh_grace_periods),
            idle_repeat_period: self
                .idle_repeat_period
                .unwrap_or(defaults.idle_repeat_period),
            zero_hertz_enabled: self
                .zero_hertz_enabled
                .unwrap_or(defaults.zero_hertz_enabled),
        }
    }
}
