//! Blackout windows: weekdays, time-of-day periods, and calendar days.
//!
//! All checks run on "now" converted into the policy's timezone. Time of
//! day is compared as minutes since midnight so that periods crossing
//! midnight stay a pure integer comparison.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::debug;

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Longest day per month; February allows the 29th.
const DAYS_IN_MONTH: [u32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("invalid weekday: {0:?}")]
    Weekday(String),

    #[error("invalid time period {0:?}, expected HH:MM-HH:MM")]
    TimePeriod(String),

    #[error("invalid day of year {0:?}, expected e.g. Dec24")]
    YearDay(String),

    #[error("unknown timezone: {0:?}")]
    Timezone(String),
}

/// Minutes elapsed since midnight for a wall-clock time.
pub fn minute_of_day(t: NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}

// ── TimePeriod ────────────────────────────────────────────────────

/// Half-open `[start, end)` time-of-day interval in minutes since midnight.
///
/// When `start > end` the period wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePeriod {
    start: u32,
    end: u32,
}

impl TimePeriod {
    /// Build a period from wall-clock times, truncated to the minute.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            start: minute_of_day(start),
            end: minute_of_day(end),
        }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn crosses_midnight(&self) -> bool {
        self.start > self.end
    }

    /// Whether `minute` (since midnight) falls inside the period.
    pub fn contains(&self, minute: u32) -> bool {
        if self.start <= self.end {
            self.start <= minute && minute < self.end
        } else {
            minute >= self.start || minute < self.end
        }
    }
}

impl FromStr for TimePeriod {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PolicyError::TimePeriod(s.to_string());
        let (from, to) = s.trim().split_once('-').ok_or_else(invalid)?;
        let start = NaiveTime::parse_from_str(from.trim(), "%H:%M").map_err(|_| invalid())?;
        let end = NaiveTime::parse_from_str(to.trim(), "%H:%M").map_err(|_| invalid())?;
        Ok(Self::new(start, end))
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start / 60,
            self.start % 60,
            self.end / 60,
            self.end % 60
        )
    }
}

// ── YearDay ───────────────────────────────────────────────────────

/// A recurring calendar day; the year is never considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearDay {
    month: u32,
    day: u32,
}

impl YearDay {
    pub fn new(month: u32, day: u32) -> Result<Self, PolicyError> {
        let valid = (1..=12).contains(&month) && day >= 1 && day <= DAYS_IN_MONTH[month as usize - 1];
        if !valid {
            return Err(PolicyError::YearDay(format!("{month}/{day}")));
        }
        Ok(Self { month, day })
    }

    /// Take month and day from any date, discarding its year.
    pub fn of<D: Datelike>(date: &D) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
        }
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }
}

impl FromStr for YearDay {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PolicyError::YearDay(s.to_string());
        let s = s.trim();
        if s.len() < 4 || !s.is_char_boundary(3) {
            return Err(invalid());
        }
        let (name, day) = s.split_at(3);
        let month = MONTHS
            .iter()
            .position(|m| m.eq_ignore_ascii_case(name))
            .ok_or_else(invalid)? as u32
            + 1;
        let day = day.trim().parse::<u32>().map_err(|_| invalid())?;
        Self::new(month, day).map_err(|_| invalid())
    }
}

impl fmt::Display for YearDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = MONTHS[self.month as usize - 1];
        let mut chars = name.chars();
        let first = chars.next().map(|c| c.to_ascii_uppercase()).unwrap_or_default();
        write!(f, "{first}{}{}", chars.as_str(), self.day)
    }
}

// ── List parsing ──────────────────────────────────────────────────

fn split_list(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').map(str::trim).filter(|item| !item.is_empty())
}

/// Parse `"Sat,Sun"` style weekday lists.
pub fn parse_weekdays(s: &str) -> Result<Vec<Weekday>, PolicyError> {
    split_list(s)
        .map(|d| d.parse::<Weekday>().map_err(|_| PolicyError::Weekday(d.to_string())))
        .collect()
}

/// Parse `"22:00-08:00,12:00-13:00"` style period lists.
pub fn parse_time_periods(s: &str) -> Result<Vec<TimePeriod>, PolicyError> {
    split_list(s).map(str::parse).collect()
}

/// Parse `"Apr1,Dec24"` style calendar day lists.
pub fn parse_year_days(s: &str) -> Result<Vec<YearDay>, PolicyError> {
    split_list(s).map(str::parse).collect()
}

// ── ExclusionPolicy ───────────────────────────────────────────────

/// The check that put "now" inside a blackout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    Weekday(Weekday),
    TimeOfDay(TimePeriod),
    YearDay(YearDay),
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclusion::Weekday(d) => write!(f, "weekday {d}"),
            Exclusion::TimeOfDay(p) => write!(f, "time of day {p}"),
            Exclusion::YearDay(d) => write!(f, "day of year {d}"),
        }
    }
}

/// Blackout configuration, evaluated in `timezone`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExclusionPolicy {
    pub weekdays: Vec<Weekday>,
    pub time_periods: Vec<TimePeriod>,
    pub year_days: Vec<YearDay>,
    pub timezone: Tz,
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self {
            weekdays: Vec::new(),
            time_periods: Vec::new(),
            year_days: Vec::new(),
            timezone: Tz::UTC,
        }
    }
}

impl ExclusionPolicy {
    /// Resolve an IANA timezone name such as `"Europe/Berlin"`.
    pub fn parse_timezone(name: &str) -> Result<Tz, PolicyError> {
        name.trim()
            .parse::<Tz>()
            .map_err(|_| PolicyError::Timezone(name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.weekdays.is_empty() && self.time_periods.is_empty() && self.year_days.is_empty()
    }

    /// The first check that excludes `now`, if any.
    pub fn exclusion(&self, now: DateTime<Utc>) -> Option<Exclusion> {
        let local = now.with_timezone(&self.timezone);

        let weekday = local.weekday();
        if self.weekdays.contains(&weekday) {
            return Some(Exclusion::Weekday(weekday));
        }

        let minute = minute_of_day(local.time());
        if let Some(period) = self.time_periods.iter().find(|p| p.contains(minute)) {
            return Some(Exclusion::TimeOfDay(*period));
        }

        let today = YearDay::of(&local);
        if self.year_days.contains(&today) {
            return Some(Exclusion::YearDay(today));
        }

        None
    }

    pub fn is_excluded(&self, now: DateTime<Utc>) -> bool {
        match self.exclusion(now) {
            Some(reason) => {
                debug!(%reason, timezone = %self.timezone, "inside blackout window");
                true
            }
            None => false,
        }
    }
}

/// Whether `now` falls inside any blackout of `policy`.
pub fn is_excluded(now: DateTime<Utc>, policy: &ExclusionPolicy) -> bool {
    policy.is_excluded(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// A Friday afternoon.
    fn friday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 24, 15, 4, 5).unwrap()
    }

    fn hm(h: u32, m: u32) -> u32 {
        h * 60 + m
    }

    #[test]
    fn period_within_a_day() {
        let p: TimePeriod = "09:00-17:30".parse().unwrap();
        assert!(!p.crosses_midnight());
        assert!(!p.contains(hm(8, 59)));
        assert!(p.contains(hm(9, 0)));
        assert!(p.contains(hm(17, 29)));
        assert!(!p.contains(hm(17, 30)));
    }

    #[test]
    fn period_across_midnight() {
        let p: TimePeriod = "22:00-08:00".parse().unwrap();
        assert!(p.crosses_midnight());
        assert!(p.contains(hm(23, 0)));
        assert!(p.contains(hm(7, 59)));
        assert!(p.contains(hm(0, 0)));
        assert!(!p.contains(hm(8, 0)));
        assert!(!p.contains(hm(21, 59)));
    }

    #[test]
    fn empty_period_never_matches() {
        let p: TimePeriod = "10:00-10:00".parse().unwrap();
        assert!(!p.contains(hm(10, 0)));
        assert!(!p.contains(hm(3, 0)));
    }

    #[test]
    fn period_display_and_errors() {
        let p: TimePeriod = " 07:05 - 19:45 ".parse().unwrap();
        assert_eq!(p.to_string(), "07:05-19:45");
        assert!("25:00-08:00".parse::<TimePeriod>().is_err());
        assert!("22:00".parse::<TimePeriod>().is_err());
    }

    #[test]
    fn year_day_parsing() {
        let d: YearDay = "Dec24".parse().unwrap();
        assert_eq!((d.month(), d.day()), (12, 24));
        assert_eq!(d.to_string(), "Dec24");
        assert_eq!("apr1".parse::<YearDay>().unwrap(), YearDay::new(4, 1).unwrap());
        assert!("Feb29".parse::<YearDay>().is_ok());
        assert!("Feb30".parse::<YearDay>().is_err());
        assert!("Foo12".parse::<YearDay>().is_err());
        assert!("Dec".parse::<YearDay>().is_err());
    }

    #[test]
    fn list_parsing_skips_blanks() {
        assert_eq!(
            parse_weekdays("Sat, Sunday,").unwrap(),
            vec![Weekday::Sat, Weekday::Sun]
        );
        assert!(parse_weekdays("Caturday").is_err());
        assert!(parse_time_periods("").unwrap().is_empty());
        assert_eq!(parse_year_days("Apr1,Dec24").unwrap().len(), 2);
    }

    #[test]
    fn empty_policy_never_excludes() {
        let policy = ExclusionPolicy::default();
        assert!(policy.is_empty());
        assert!(!policy.is_excluded(friday()));
    }

    #[test]
    fn excluded_weekday() {
        let policy = ExclusionPolicy {
            weekdays: vec![Weekday::Mon, Weekday::Fri],
            ..Default::default()
        };
        assert_eq!(policy.exclusion(friday()), Some(Exclusion::Weekday(Weekday::Fri)));
        assert!(!policy.is_excluded(friday() + chrono::Duration::days(1)));
        assert!(policy.is_excluded(friday() + chrono::Duration::days(7)));
    }

    #[test]
    fn excluded_time_of_day() {
        let policy = ExclusionPolicy {
            time_periods: vec!["14:04-16:04".parse().unwrap()],
            ..Default::default()
        };
        assert!(policy.is_excluded(friday()));
        assert!(!policy.is_excluded(friday() + chrono::Duration::hours(2)));
        assert!(policy.is_excluded(friday() + chrono::Duration::hours(24)));
    }

    #[test]
    fn weekday_is_evaluated_in_policy_timezone() {
        // 15:04 UTC on Friday is already Saturday morning in Brisbane.
        let policy = ExclusionPolicy {
            weekdays: vec![Weekday::Fri],
            time_periods: vec!["14:04-16:04".parse().unwrap()],
            timezone: ExclusionPolicy::parse_timezone("Australia/Brisbane").unwrap(),
            ..Default::default()
        };
        assert!(!policy.is_excluded(friday()));
    }

    #[test]
    fn year_day_ignores_year() {
        let policy = ExclusionPolicy {
            year_days: vec![YearDay::new(9, 24).unwrap()],
            ..Default::default()
        };
        let old = Utc.with_ymd_and_hms(1869, 9, 24, 15, 4, 5).unwrap();
        let recent = Utc.with_ymd_and_hms(2031, 9, 24, 0, 0, 0).unwrap();
        assert!(policy.is_excluded(old));
        assert!(policy.is_excluded(recent));
        assert!(!policy.is_excluded(Utc.with_ymd_and_hms(2031, 9, 25, 0, 0, 0).unwrap()));
        assert!(!policy.is_excluded(Utc.with_ymd_and_hms(2031, 10, 24, 0, 0, 0).unwrap()));
    }

    #[test]
    fn any_single_match_excludes() {
        let policy = ExclusionPolicy {
            year_days: vec![YearDay::new(9, 25).unwrap(), YearDay::new(10, 24).unwrap()],
            ..Default::default()
        };
        assert!(is_excluded(friday(), &policy));
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        assert_eq!(
            ExclusionPolicy::parse_timezone("Mars/Olympus"),
            Err(PolicyError::Timezone("Mars/Olympus".to_string()))
        );
        assert_eq!(ExclusionPolicy::parse_timezone("UTC"), Ok(Tz::UTC));
    }
}
