//! havoc.toml configuration.
//!
//! [`ChaosConfig`] is the file form: every field optional, strings as the
//! operator writes them. [`Configuration`] is the compiled form the engine
//! runs on, built once at startup by [`Configuration::from_config`].

use std::fmt;
use std::path::Path;
use std::time::Duration;

use havoc_core::{Selector, format_duration, parse_duration};
use havoc_pacing::{
    ExclusionPolicy, IntervalCalculator, TARGET_FRACTION, TOTAL_WORKING_MINUTES,
    parse_time_periods, parse_weekdays, parse_year_days,
};
use havoc_select::FilterCriteria;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(10 * 60);
const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChaosConfig {
    #[serde(default)]
    pub filters: FiltersConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub termination: TerminationConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FiltersConfig {
    pub labels: Option<String>,
    pub annotations: Option<String>,
    pub kinds: Option<String>,
    pub namespaces: Option<String>,
    pub namespace_labels: Option<String>,
    pub included_names: Option<String>,
    pub excluded_names: Option<String>,
    pub minimum_age: Option<String>,
    /// Only list instances in this namespace; empty or absent means all.
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub interval: Option<String>,
    pub dynamic_interval: Option<bool>,
    pub dynamic_factor: Option<f64>,
    pub total_working_minutes: Option<f64>,
    pub target_fraction: Option<f64>,
    pub excluded_weekdays: Option<String>,
    pub excluded_times_of_day: Option<String>,
    pub excluded_days_of_year: Option<String>,
    pub timezone: Option<String>,
    pub max_runtime: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerminationConfig {
    pub dry_run: Option<bool>,
    pub max_kill: Option<usize>,
    pub grace_period: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    pub webhook: Option<String>,
    pub timeout: Option<String>,
}

impl ChaosConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

// ── Compiled form ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookSettings {
    pub url: String,
    pub timeout: Duration,
}

/// Immutable runtime configuration.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub criteria: FilterCriteria,
    pub policy: ExclusionPolicy,
    pub namespace_scope: Option<String>,
    pub dry_run: bool,
    pub max_kill: usize,
    pub grace_period: Option<Duration>,
    pub interval: IntervalCalculator,
    pub max_runtime: Option<Duration>,
    pub webhook: Option<WebhookSettings>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            criteria: FilterCriteria::default(),
            policy: ExclusionPolicy::default(),
            namespace_scope: None,
            dry_run: true,
            max_kill: 1,
            grace_period: None,
            interval: IntervalCalculator::fixed(DEFAULT_INTERVAL),
            max_runtime: None,
            webhook: None,
        }
    }
}

fn selector(field: &'static str, expr: Option<&str>) -> Result<Selector, ConfigError> {
    Selector::parse(expr.unwrap_or_default()).map_err(|source| ConfigError::Selector { field, source })
}

/// A selector over single names: only bare and negated terms make sense.
fn membership(field: &'static str, expr: Option<&str>) -> Result<Selector, ConfigError> {
    let sel = selector(field, expr)?;
    if !sel.is_membership() {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("\"{sel}\" may only list names and !names"),
        });
    }
    Ok(sel)
}

fn pattern(field: &'static str, expr: Option<&str>) -> Result<Option<Regex>, ConfigError> {
    match expr.map(str::trim) {
        None | Some("") => Ok(None),
        Some(expr) => Regex::new(expr)
            .map(Some)
            .map_err(|source| ConfigError::Pattern { field, source }),
    }
}

fn duration(field: &'static str, value: Option<&str>) -> Result<Option<Duration>, ConfigError> {
    value
        .map(|v| parse_duration(v).map_err(|source| ConfigError::Duration { field, source }))
        .transpose()
}

fn positive(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("must be greater than zero, got {value}"),
        })
    }
}

impl Configuration {
    /// Compile and validate the file form.
    pub fn from_config(config: &ChaosConfig) -> Result<Self, ConfigError> {
        let f = &config.filters;
        let criteria = FilterCriteria {
            labels: selector("filters.labels", f.labels.as_deref())?,
            annotations: selector("filters.annotations", f.annotations.as_deref())?,
            kinds: membership("filters.kinds", f.kinds.as_deref())?,
            namespaces: membership("filters.namespaces", f.namespaces.as_deref())?,
            namespace_labels: selector("filters.namespace_labels", f.namespace_labels.as_deref())?,
            included_names: pattern("filters.included_names", f.included_names.as_deref())?,
            excluded_names: pattern("filters.excluded_names", f.excluded_names.as_deref())?,
            minimum_age: duration("filters.minimum_age", f.minimum_age.as_deref())?
                .unwrap_or_default(),
        };
        let namespace_scope = f
            .scope
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let s = &config.schedule;
        let policy = ExclusionPolicy {
            weekdays: parse_weekdays(s.excluded_weekdays.as_deref().unwrap_or_default())?,
            time_periods: parse_time_periods(s.excluded_times_of_day.as_deref().unwrap_or_default())?,
            year_days: parse_year_days(s.excluded_days_of_year.as_deref().unwrap_or_default())?,
            timezone: ExclusionPolicy::parse_timezone(s.timezone.as_deref().unwrap_or("UTC"))?,
        };

        let base = duration("schedule.interval", s.interval.as_deref())?.unwrap_or(DEFAULT_INTERVAL);
        if base.is_zero() {
            return Err(ConfigError::Invalid {
                field: "schedule.interval",
                reason: "must be greater than zero".to_string(),
            });
        }
        let factor = positive("schedule.dynamic_factor", s.dynamic_factor.unwrap_or(1.0))?;
        let total = positive(
            "schedule.total_working_minutes",
            s.total_working_minutes.unwrap_or(TOTAL_WORKING_MINUTES),
        )?;
        let fraction = positive("schedule.target_fraction", s.target_fraction.unwrap_or(TARGET_FRACTION))?;
        let interval = if s.dynamic_interval.unwrap_or(false) {
            IntervalCalculator::dynamic(base, factor)
        } else {
            IntervalCalculator::fixed(base)
        }
        .with_constants(total, fraction);
        let max_runtime = duration("schedule.max_runtime", s.max_runtime.as_deref())?;

        let t = &config.termination;
        let max_kill = t.max_kill.unwrap_or(1);
        if max_kill < 1 {
            return Err(ConfigError::Invalid {
                field: "termination.max_kill",
                reason: "must be at least 1".to_string(),
            });
        }
        let grace_period = duration("termination.grace_period", t.grace_period.as_deref())?;

        let n = &config.notifier;
        let webhook = match n.webhook.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(url) => Some(WebhookSettings {
                url: url.to_string(),
                timeout: duration("notifier.timeout", n.timeout.as_deref())?
                    .unwrap_or(DEFAULT_WEBHOOK_TIMEOUT),
            }),
        };

        Ok(Self {
            criteria,
            policy,
            namespace_scope,
            dry_run: t.dry_run.unwrap_or(true),
            max_kill,
            grace_period,
            interval,
            max_runtime,
            webhook,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_config(&ChaosConfig::from_file(path)?)
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    if items.is_empty() {
        return "-".to_string();
    }
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(",")
}

fn or_dash(s: String) -> String {
    if s.is_empty() { "-".to_string() } else { s }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.criteria;
        let regex = |r: &Option<Regex>| r.as_ref().map(|r| r.as_str().to_string()).unwrap_or_default();
        writeln!(f, "labels:            {}", or_dash(c.labels.to_string()))?;
        writeln!(f, "annotations:       {}", or_dash(c.annotations.to_string()))?;
        writeln!(f, "kinds:             {}", or_dash(c.kinds.to_string()))?;
        writeln!(f, "namespaces:        {}", or_dash(c.namespaces.to_string()))?;
        writeln!(f, "namespace labels:  {}", or_dash(c.namespace_labels.to_string()))?;
        writeln!(f, "included names:    {}", or_dash(regex(&c.included_names)))?;
        writeln!(f, "excluded names:    {}", or_dash(regex(&c.excluded_names)))?;
        writeln!(f, "minimum age:       {}", format_duration(c.minimum_age))?;
        writeln!(
            f,
            "scope:             {}",
            self.namespace_scope.as_deref().unwrap_or("all namespaces")
        )?;
        writeln!(f, "excluded weekdays: {}", join(&self.policy.weekdays))?;
        writeln!(f, "excluded times:    {}", join(&self.policy.time_periods))?;
        writeln!(f, "excluded days:     {}", join(&self.policy.year_days))?;
        writeln!(f, "timezone:          {}", self.policy.timezone)?;
        writeln!(f, "interval:          {}", format_duration(self.interval.base()))?;
        if self.interval.is_dynamic() {
            writeln!(f, "dynamic factor:    {}", self.interval.factor())?;
        }
        if let Some(max) = self.max_runtime {
            writeln!(f, "max runtime:       {}", format_duration(max))?;
        }
        writeln!(f, "dry run:           {}", self.dry_run)?;
        writeln!(f, "max kill:          {}", self.max_kill)?;
        if let Some(grace) = self.grace_period {
            writeln!(f, "grace period:      {}", format_duration(grace))?;
        }
        if let Some(hook) = &self.webhook {
            writeln!(f, "webhook:           {}", hook.url)?;
        }
        Ok(())
    }
}
