//! havoc-pacing — when to strike, and how often.
//!
//! Two independent pieces decide the rhythm of the chaos loop:
//!
//! - [`ExclusionPolicy`] answers "is now a blackout?" for configured
//!   weekdays, time-of-day periods, and recurring calendar days, evaluated
//!   in the configured timezone.
//! - [`IntervalCalculator`] turns the size of the eligible pool into the
//!   wait before the next cycle.
//!
//! # Interval Algorithm
//!
//! ```text
//! C = eligible instances (all filters except the blackout gate)
//! F = aggressiveness factor (> 0)
//!
//! if !enabled or C == 0:
//!     interval = base_interval
//! else:
//!     minutes  = TOTAL_WORKING_MINUTES / (C * TARGET_FRACTION * F)
//!     interval = max(round(minutes), 1) minutes
//! ```
//!
//! `TOTAL_WORKING_MINUTES` is one working week (5 × 8 × 60 = 2400) and
//! `TARGET_FRACTION` plans to hit half the pool within it. Both can be
//! overridden.

pub mod interval;
pub mod window;

pub use interval::{IntervalCalculator, TARGET_FRACTION, TOTAL_WORKING_MINUTES, next_interval};
pub use window::{
    Exclusion, ExclusionPolicy, PolicyError, TimePeriod, YearDay, is_excluded, minute_of_day,
    parse_time_periods, parse_weekdays, parse_year_days,
};
