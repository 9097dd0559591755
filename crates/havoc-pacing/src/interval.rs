//! Dynamic interval: paces terminations to the size of the eligible pool.
//!
//! A large pool gets short intervals so that a fixed fraction of it is hit
//! within one working week; a small pool gets long ones. With the dynamic
//! mode off, or nothing eligible, the base interval is used unchanged.

use std::time::Duration;

use tracing::{debug, warn};

/// Working minutes in a week: 5 days × 8 hours × 60 minutes.
pub const TOTAL_WORKING_MINUTES: f64 = 2400.0;

/// Share of the eligible pool to terminate over `TOTAL_WORKING_MINUTES`.
pub const TARGET_FRACTION: f64 = 0.5;

const MINIMUM_MINUTES: f64 = 1.0;

/// Derives the wait before the next cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalCalculator {
    enabled: bool,
    factor: f64,
    base: Duration,
    total_working_minutes: f64,
    target_fraction: f64,
}

impl IntervalCalculator {
    /// A calculator that always returns `base`.
    pub fn fixed(base: Duration) -> Self {
        Self {
            enabled: false,
            factor: 1.0,
            base,
            total_working_minutes: TOTAL_WORKING_MINUTES,
            target_fraction: TARGET_FRACTION,
        }
    }

    /// A calculator that scales with the pool; `factor` > 1 kills faster.
    pub fn dynamic(base: Duration, factor: f64) -> Self {
        Self {
            enabled: true,
            factor,
            ..Self::fixed(base)
        }
    }

    /// Override the working-time budget and target fraction.
    pub fn with_constants(mut self, total_working_minutes: f64, target_fraction: f64) -> Self {
        self.total_working_minutes = total_working_minutes;
        self.target_fraction = target_fraction;
        self
    }

    pub fn is_dynamic(&self) -> bool {
        self.enabled
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// The interval to wait given `eligible` instances in the pool.
    pub fn next_interval(&self, eligible: usize) -> Duration {
        if !self.enabled || eligible == 0 {
            return self.base;
        }

        let divisor = eligible as f64 * self.target_fraction * self.factor;
        let minutes = self.total_working_minutes / divisor;
        if !minutes.is_finite() || minutes <= 0.0 {
            warn!(
                eligible,
                factor = self.factor,
                target_fraction = self.target_fraction,
                "dynamic interval is not computable, using base interval"
            );
            return self.base;
        }

        let rounded = minutes.round().max(MINIMUM_MINUTES);
        let Ok(interval) = Duration::try_from_secs_f64(rounded * 60.0) else {
            warn!(
                eligible,
                factor = self.factor,
                minutes = rounded,
                "dynamic interval is out of range, using base interval"
            );
            return self.base;
        };
        debug!(
            eligible,
            factor = self.factor,
            raw_minutes = minutes,
            minutes = rounded,
            "calculated dynamic interval"
        );
        interval
    }
}

/// Next pacing interval for `eligible` instances.
pub fn next_interval(eligible: usize, factor: f64, base: Duration, enabled: bool) -> Duration {
    let calc = if enabled {
        IntervalCalculator::dynamic(base, factor)
    } else {
        IntervalCalculator::fixed(base)
    };
    calc.next_interval(eligible)
}
