//! Candidate filter pipeline.
//!
//! Each stage is an independent predicate over the snapshot. [`eligible`]
//! runs every predicate stage; [`filter`] additionally applies the blackout
//! gate, which empties the whole result rather than dropping instances one
//! by one.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use havoc_core::{Instance, NamespaceIndex, Selector};
use havoc_pacing::ExclusionPolicy;
use regex::Regex;
use tracing::debug;

/// Compiled per-instance predicates.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    pub labels: Selector,
    pub annotations: Selector,
    /// Membership selector over the lowercased controller kind.
    pub kinds: Selector,
    /// Membership selector over the namespace name.
    pub namespaces: Selector,
    pub namespace_labels: Selector,
    pub included_names: Option<Regex>,
    pub excluded_names: Option<Regex>,
    pub minimum_age: Duration,
}

impl FilterCriteria {
    /// Whether the pipeline needs the namespace label lookup.
    pub fn needs_namespace_labels(&self) -> bool {
        !self.namespace_labels.is_empty()
    }
}

/// Instances that passed every filter of one cycle.
///
/// Never contains a terminating, non-running, or static instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    instances: Vec<Instance>,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn as_slice(&self) -> &[Instance] {
        &self.instances
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instance> {
        self.instances.iter()
    }

    pub fn into_vec(self) -> Vec<Instance> {
        self.instances
    }
}

impl IntoIterator for CandidateSet {
    type Item = Instance;
    type IntoIter = std::vec::IntoIter<Instance>;

    fn into_iter(self) -> Self::IntoIter {
        self.instances.into_iter()
    }
}

/// Run every predicate stage, without the blackout gate.
///
/// `namespaces` is only consulted when the namespace label selector is set.
pub fn eligible(
    instances: Vec<Instance>,
    criteria: &FilterCriteria,
    namespaces: &NamespaceIndex,
    now: DateTime<Utc>,
) -> CandidateSet {
    let listed = instances.len();

    let instances = filter_by_phase(instances);
    let instances = filter_terminating(instances);
    let instances = filter_static(instances);
    let instances = filter_by_labels(instances, &criteria.labels);
    let instances = filter_by_annotations(instances, &criteria.annotations);
    let instances = filter_by_kinds(instances, &criteria.kinds);
    let instances = filter_by_namespaces(instances, &criteria.namespaces);
    let instances = filter_by_namespace_labels(instances, &criteria.namespace_labels, namespaces);
    let instances = filter_by_name(
        instances,
        criteria.included_names.as_ref(),
        criteria.excluded_names.as_ref(),
    );
    let instances = filter_by_minimum_age(instances, criteria.minimum_age, now);

    debug!(listed, eligible = instances.len(), "filtered instances");
    CandidateSet { instances }
}

/// Full candidate filter: every predicate plus the blackout gate.
pub fn filter(
    instances: Vec<Instance>,
    criteria: &FilterCriteria,
    policy: &ExclusionPolicy,
    namespaces: &NamespaceIndex,
    now: DateTime<Utc>,
) -> CandidateSet {
    if let Some(reason) = policy.exclusion(now) {
        debug!(%reason, "blackout window active, no candidates this cycle");
        return CandidateSet::default();
    }
    eligible(instances, criteria, namespaces, now)
}

// ── Stages ────────────────────────────────────────────────────────

pub fn filter_by_phase(instances: Vec<Instance>) -> Vec<Instance> {
    instances.into_iter().filter(Instance::is_running).collect()
}

pub fn filter_terminating(instances: Vec<Instance>) -> Vec<Instance> {
    instances.into_iter().filter(|i| !i.is_terminating()).collect()
}

/// Static instances are never candidates, whatever the other filters say.
pub fn filter_static(instances: Vec<Instance>) -> Vec<Instance> {
    instances.into_iter().filter(|i| !i.is_static()).collect()
}

pub fn filter_by_labels(instances: Vec<Instance>, selector: &Selector) -> Vec<Instance> {
    if selector.is_empty() {
        return instances;
    }
    instances
        .into_iter()
        .filter(|i| selector.matches(&i.labels))
        .collect()
}

pub fn filter_by_annotations(instances: Vec<Instance>, selector: &Selector) -> Vec<Instance> {
    if selector.is_empty() {
        return instances;
    }
    instances
        .into_iter()
        .filter(|i| selector.matches(&i.annotations))
        .collect()
}

/// Keep instances whose controller kind the membership selector admits.
///
/// Kinds compare case-insensitively; unowned instances have the empty kind.
pub fn filter_by_kinds(instances: Vec<Instance>, selector: &Selector) -> Vec<Instance> {
    if selector.is_empty() {
        return instances;
    }
    let selector = selector.with_lowercase_keys();
    instances
        .into_iter()
        .filter(|i| selector.admits(&i.controller_kind()))
        .collect()
}

pub fn filter_by_namespaces(instances: Vec<Instance>, selector: &Selector) -> Vec<Instance> {
    if selector.is_empty() {
        return instances;
    }
    instances
        .into_iter()
        .filter(|i| selector.admits(&i.namespace))
        .collect()
}

/// Keep instances whose namespace's own labels match.
///
/// Instances in namespaces missing from `namespaces` are dropped.
pub fn filter_by_namespace_labels(
    instances: Vec<Instance>,
    selector: &Selector,
    namespaces: &NamespaceIndex,
) -> Vec<Instance> {
    if selector.is_empty() {
        return instances;
    }
    instances
        .into_iter()
        .filter(|i| {
            namespaces
                .get(&i.namespace)
                .is_some_and(|labels| selector.matches(labels))
        })
        .collect()
}

/// Apply the include/exclude name patterns; empty patterns are ignored.
pub fn filter_by_name(
    instances: Vec<Instance>,
    included: Option<&Regex>,
    excluded: Option<&Regex>,
) -> Vec<Instance> {
    let included = included.filter(|re| !re.as_str().is_empty());
    let excluded = excluded.filter(|re| !re.as_str().is_empty());
    if included.is_none() && excluded.is_none() {
        return instances;
    }
    instances
        .into_iter()
        .filter(|i| included.is_none_or(|re| re.is_match(&i.name)))
        .filter(|i| excluded.is_none_or(|re| !re.is_match(&i.name)))
        .collect()
}

/// Keep instances strictly older than `minimum_age`; zero disables the check.
pub fn filter_by_minimum_age(
    instances: Vec<Instance>,
    minimum_age: Duration,
    now: DateTime<Utc>,
) -> Vec<Instance> {
    if minimum_age.is_zero() {
        return instances;
    }
    let minimum = TimeDelta::from_std(minimum_age).unwrap_or(TimeDelta::MAX);
    instances
        .into_iter()
        .filter(|i| now.signed_duration_since(i.created_at) > minimum)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Weekday};
    use havoc_core::{Labels, MIRROR_ANNOTATION, Phase};

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    /// Friday 2025-10-24 15:04:05 UTC.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 24, 15, 4, 5).unwrap()
    }

    fn pod(namespace: &str, name: &str) -> Instance {
        Instance::new(namespace, name, epoch())
            .with_label("app", name)
            .with_annotation("chaos", name)
    }

    fn snapshot() -> Vec<Instance> {
        vec![
            pod("default", "foo"),
            pod("testing", "bar"),
            pod("testing", "baz").with_phase(Phase::Pending),
        ]
    }

    fn namespaces() -> NamespaceIndex {
        NamespaceIndex::from([
            ("default".to_string(), Labels::from([("env".to_string(), "default".to_string())])),
            ("testing".to_string(), Labels::from([("env".to_string(), "testing".to_string())])),
        ])
    }

    fn names(set: &CandidateSet) -> Vec<&str> {
        set.iter().map(|i| i.name.as_str()).collect()
    }

    fn run(criteria: &FilterCriteria) -> CandidateSet {
        eligible(snapshot(), criteria, &namespaces(), now())
    }

    fn sel(expr: &str) -> Selector {
        Selector::parse(expr).unwrap()
    }

    #[test]
    fn label_annotation_and_namespace_selectors() {
        let cases: &[(&str, &str, &str, &[&str])] = &[
            ("", "", "", &["foo", "bar"]),
            ("app=foo", "", "", &["foo"]),
            ("app!=foo", "", "", &["bar"]),
            ("", "chaos=foo", "", &["foo"]),
            ("", "chaos!=foo", "", &["bar"]),
            ("", "", "default", &["foo"]),
            ("", "", "default,testing", &["foo", "bar"]),
            ("", "", "!testing", &["foo"]),
            ("", "", "!default,!testing", &[]),
            ("", "", "default,!testing", &["foo"]),
            ("", "", "default,!default", &[]),
        ];
        for (labels, annotations, ns, expected) in cases {
            let criteria = FilterCriteria {
                labels: sel(labels),
                annotations: sel(annotations),
                namespaces: sel(ns),
                ..Default::default()
            };
            assert_eq!(
                names(&run(&criteria)),
                expected.to_vec(),
                "labels={labels:?} annotations={annotations:?} namespaces={ns:?}"
            );
        }
    }

    #[test]
    fn namespace_label_selector() {
        let cases: &[(&str, &[&str])] = &[
            ("", &["foo", "bar"]),
            ("env", &["foo", "bar"]),
            ("!env", &[]),
            ("env=default", &["foo"]),
            ("env=testing", &["bar"]),
            ("env!=default", &["bar"]),
            ("env!=testing", &["foo"]),
            ("env!=default,env!=testing", &[]),
            ("env=default,env!=testing", &["foo"]),
            ("env=default,env!=default", &[]),
            ("nomatch", &[]),
        ];
        for (expr, expected) in cases {
            let criteria = FilterCriteria {
                namespace_labels: sel(expr),
                ..Default::default()
            };
            assert_eq!(names(&run(&criteria)), expected.to_vec(), "namespace labels {expr:?}");
        }
    }

    #[test]
    fn namespace_missing_from_lookup_is_dropped() {
        let criteria = FilterCriteria {
            namespace_labels: sel("env"),
            ..Default::default()
        };
        let set = eligible(snapshot(), &criteria, &NamespaceIndex::new(), now());
        assert!(set.is_empty());
    }

    #[test]
    fn name_patterns() {
        let re = |s: &str| Some(Regex::new(s).unwrap());
        let cases: Vec<(Option<Regex>, Option<Regex>, &[&str])> = vec![
            (None, None, &["foo", "bar"]),
            (re("fo.*"), None, &["foo"]),
            (None, re("fo.*"), &["bar"]),
            (re("fo.*"), re(""), &["foo"]),
            (re(""), re("fo.*"), &["bar"]),
            (re("fo.*"), re("f.*"), &[]),
        ];
        for (included, excluded, expected) in cases {
            let criteria = FilterCriteria {
                included_names: included,
                excluded_names: excluded,
                ..Default::default()
            };
            assert_eq!(names(&run(&criteria)), expected.to_vec());
        }
    }

    #[test]
    fn kinds_membership() {
        let foo = pod("default", "foo").with_owner("TestKind", "parent-1");
        let foo1 = pod("default", "foo-1").with_owner("testkind", "parent-2");
        let bar = pod("default", "bar").with_owner("TestKind", "other-parent");
        let baz = pod("default", "baz");
        let baz1 = pod("default", "baz-1");

        let cases: Vec<(&str, Vec<Instance>, &[&str])> = vec![
            ("testkind", vec![foo.clone(), baz.clone()], &["foo"]),
            (
                "!testkind",
                vec![foo.clone(), foo1.clone(), baz.clone(), bar.clone(), baz1.clone()],
                &["baz", "baz-1"],
            ),
            ("!testkind", vec![foo.clone(), foo1.clone(), bar.clone()], &[]),
            ("!testkind,!job", vec![foo.clone(), baz.clone()], &["baz"]),
            ("testkind,job", vec![foo.clone(), foo1.clone(), bar.clone(), baz.clone()], &["foo", "foo-1", "bar"]),
            ("!testkind,job", vec![foo.clone(), foo1.clone(), bar.clone(), baz.clone()], &[]),
            ("testkind,!job", vec![foo.clone(), foo1.clone(), bar.clone(), baz.clone()], &["foo", "foo-1", "bar"]),
            ("job", vec![foo.clone(), foo1.clone(), bar.clone(), baz.clone()], &[]),
            ("TestKind", vec![foo.clone(), baz.clone()], &["foo"]),
        ];
        for (expr, instances, expected) in cases {
            let kept = filter_by_kinds(instances, &sel(expr));
            let kept: Vec<&str> = kept.iter().map(|i| i.name.as_str()).collect();
            assert_eq!(kept, expected.to_vec(), "kinds {expr:?}");
        }
    }

    #[test]
    fn terminating_and_static_instances_are_dropped() {
        let instances = vec![
            pod("default", "running"),
            pod("default", "deleted").with_deletion_timestamp(now()),
            pod("kube-system", "etcd").with_annotation(MIRROR_ANNOTATION, "hash"),
        ];
        let set = eligible(instances, &FilterCriteria::default(), &namespaces(), now());
        assert_eq!(names(&set), vec!["running"]);
    }

    #[test]
    fn static_instances_ignore_permissive_selectors() {
        let instances = vec![pod("kube-system", "etcd").with_annotation(MIRROR_ANNOTATION, "hash")];
        let criteria = FilterCriteria {
            annotations: sel(MIRROR_ANNOTATION),
            ..Default::default()
        };
        assert!(eligible(instances, &criteria, &namespaces(), now()).is_empty());
    }

    #[test]
    fn minimum_age_is_strict() {
        let hour = Duration::from_secs(3600);
        let at = |h: u32, m: u32| Utc.with_ymd_and_hms(2024, 10, 24, h, m, 0).unwrap();
        let now = at(10, 0);

        let young = Instance::new("test", "young", at(9, 30));
        let old = Instance::new("test", "old", Utc.with_ymd_and_hms(2024, 10, 23, 8, 0, 0).unwrap());
        let boundary = Instance::new("test", "boundary", at(9, 0));
        let just_over = Instance::new("test", "just-over", at(9, 0) - TimeDelta::milliseconds(1));

        let kept = filter_by_minimum_age(
            vec![young.clone(), old, boundary, just_over],
            hour,
            now,
        );
        let kept: Vec<&str> = kept.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(kept, vec!["old", "just-over"]);

        // No minimum age keeps everything.
        assert_eq!(filter_by_minimum_age(vec![young], Duration::ZERO, now).len(), 1);
    }

    #[test]
    fn blackout_gate_empties_result() {
        let policy = ExclusionPolicy {
            weekdays: vec![Weekday::Fri],
            ..Default::default()
        };
        let criteria = FilterCriteria::default();
        assert!(filter(snapshot(), &criteria, &policy, &namespaces(), now()).is_empty());

        let saturday = now() + TimeDelta::days(1);
        assert_eq!(filter(snapshot(), &criteria, &policy, &namespaces(), saturday).len(), 2);
    }

    #[test]
    fn filtering_is_idempotent() {
        let criteria = FilterCriteria {
            labels: sel("app!=baz"),
            namespaces: sel("!kube-system"),
            namespace_labels: sel("env"),
            minimum_age: Duration::from_secs(60),
            ..Default::default()
        };
        let once = eligible(snapshot(), &criteria, &namespaces(), now());
        let twice = eligible(once.clone().into_vec(), &criteria, &namespaces(), now());
        assert_eq!(once, twice);
    }
}
