//! Label-style selectors.
//!
//! One selector type backs every key/value filter: instance labels,
//! annotations, owner kinds, namespace names, and namespace labels.
//!
//! # Syntax
//!
//! ```text
//! selector    = "" | requirement ("," requirement)*
//! requirement = key | "!" key
//!             | key ("=" | "==" | "!=") value
//!             | key ("in" | "notin") "(" value ("," value)* ")"
//! ```
//!
//! Requirements are AND-combined by [`Selector::matches`]. The empty
//! selector matches everything.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::types::Labels;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty requirement in selector {0:?}")]
    EmptyRequirement(String),

    #[error("invalid key {key:?} in selector {selector:?}")]
    InvalidKey { selector: String, key: String },

    #[error("invalid value {value:?} in selector {selector:?}")]
    InvalidValue { selector: String, value: String },

    #[error("unknown operator {op:?} in selector {selector:?}")]
    UnknownOperator { selector: String, op: String },

    #[error("unbalanced parentheses in selector {0:?}")]
    Unbalanced(String),
}

/// Comparison applied by a single requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

/// One `key <op> values` term of a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    key: String,
    op: Operator,
    values: Vec<String>,
}

impl Requirement {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn operator(&self) -> Operator {
        self.op
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        let current = labels.get(&self.key);
        match self.op {
            Operator::Exists => current.is_some(),
            Operator::DoesNotExist => current.is_none(),
            Operator::Equals | Operator::In => {
                current.is_some_and(|v| self.values.iter().any(|want| want == v))
            }
            Operator::NotEquals | Operator::NotIn => {
                current.is_none_or(|v| self.values.iter().all(|want| want != v))
            }
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
            Operator::Equals => write!(f, "{}={}", self.key, self.values[0]),
            Operator::NotEquals => write!(f, "{}!={}", self.key, self.values[0]),
            Operator::In => write!(f, "{} in ({})", self.key, self.values.join(",")),
            Operator::NotIn => write!(f, "{} notin ({})", self.key, self.values.join(",")),
        }
    }
}

/// A compiled selector expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    /// The selector that matches everything.
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn parse(expr: &str) -> Result<Self, SelectorError> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Ok(Self::everything());
        }

        let requirements = split_terms(trimmed)?
            .into_iter()
            .map(|term| parse_requirement(expr, term))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { requirements })
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// True when every requirement holds for `labels`.
    pub fn matches(&self, labels: &Labels) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }

    /// True when the selector only uses existence and negated existence.
    ///
    /// Only such selectors can be used with [`Selector::admits`].
    pub fn is_membership(&self) -> bool {
        self.requirements
            .iter()
            .all(|r| matches!(r.op, Operator::Exists | Operator::DoesNotExist))
    }

    /// Membership test for a single name (a namespace or an owner kind).
    ///
    /// The name is matched as the synthetic mapping `{name: ""}`. Positive
    /// terms form a union: the name is admitted if any of them names it, or
    /// if there are none. Each negated term vetoes the name it names.
    pub fn admits(&self, name: &str) -> bool {
        let synthetic = Labels::from([(name.to_string(), String::new())]);

        let mut includes = self
            .requirements
            .iter()
            .filter(|r| r.op == Operator::Exists)
            .peekable();
        let included = includes.peek().is_none() || includes.any(|r| r.matches(&synthetic));

        included
            && self
                .requirements
                .iter()
                .filter(|r| r.op == Operator::DoesNotExist)
                .all(|r| r.matches(&synthetic))
    }

    /// Copy of this selector with every key lowercased.
    pub fn with_lowercase_keys(&self) -> Self {
        Self {
            requirements: self
                .requirements
                .iter()
                .map(|r| Requirement {
                    key: r.key.to_lowercase(),
                    ..r.clone()
                })
                .collect(),
        }
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = self.requirements.iter().map(|r| r.to_string()).collect();
        f.write_str(&terms.join(","))
    }
}

/// Split on top-level commas, leaving `in (a,b)` value lists intact.
fn split_terms(expr: &str) -> Result<Vec<&str>, SelectorError> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in expr.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| SelectorError::Unbalanced(expr.to_string()))?;
            }
            ',' if depth == 0 => {
                terms.push(expr[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(SelectorError::Unbalanced(expr.to_string()));
    }
    terms.push(expr[start..].trim());

    if terms.iter().any(|t| t.is_empty()) {
        return Err(SelectorError::EmptyRequirement(expr.to_string()));
    }
    Ok(terms)
}

fn parse_requirement(expr: &str, term: &str) -> Result<Requirement, SelectorError> {
    if let Some(key) = term.strip_prefix('!') {
        return requirement(expr, key.trim(), Operator::DoesNotExist, Vec::new());
    }

    if let Some(open) = term.find('(') {
        let Some(inner) = term[open + 1..].strip_suffix(')') else {
            return Err(SelectorError::Unbalanced(expr.to_string()));
        };
        let mut head = term[..open].split_whitespace();
        let (Some(key), Some(op), None) = (head.next(), head.next(), head.next()) else {
            return Err(SelectorError::UnknownOperator {
                selector: expr.to_string(),
                op: term[..open].trim().to_string(),
            });
        };
        let op = match op {
            "in" => Operator::In,
            "notin" => Operator::NotIn,
            other => {
                return Err(SelectorError::UnknownOperator {
                    selector: expr.to_string(),
                    op: other.to_string(),
                });
            }
        };
        let values: Vec<String> = inner.split(',').map(|v| v.trim().to_string()).collect();
        return requirement(expr, key, op, values);
    }

    let (key, op, value) = if let Some((k, v)) = term.split_once("!=") {
        (k, Operator::NotEquals, v)
    } else if let Some((k, v)) = term.split_once("==") {
        (k, Operator::Equals, v)
    } else if let Some((k, v)) = term.split_once('=') {
        (k, Operator::Equals, v)
    } else {
        return requirement(expr, term, Operator::Exists, Vec::new());
    };
    requirement(expr, key.trim(), op, vec![value.trim().to_string()])
}

fn requirement(
    expr: &str,
    key: &str,
    op: Operator,
    values: Vec<String>,
) -> Result<Requirement, SelectorError> {
    if !is_valid_key(key) {
        return Err(SelectorError::InvalidKey {
            selector: expr.to_string(),
            key: key.to_string(),
        });
    }
    if let Some(bad) = values.iter().find(|v| !is_valid_value(v)) {
        return Err(SelectorError::InvalidValue {
            selector: expr.to_string(),
            value: bad.clone(),
        });
    }
    if matches!(op, Operator::In | Operator::NotIn) && values.iter().any(|v| v.is_empty()) {
        return Err(SelectorError::InvalidValue {
            selector: expr.to_string(),
            value: String::new(),
        });
    }
    Ok(Requirement {
        key: key.to_string(),
        op,
        values,
    })
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 317
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
}

fn is_valid_value(value: &str) -> bool {
    value.len() <= 63
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
