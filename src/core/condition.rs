//! Condition normalisation and diffing
//!
//! A condition is the predicate attached to a sink. Before it touches the
//! index table it is canonicalised into a sorted, de-duplicated set of
//! [`MatchKey`]s; re-registration then only has to apply the key [`diff`].

use super::error::{Result, RouterError};
use super::severity::Severity;
use serde::{Deserialize, Serialize};

/// A single normalised match-key.
///
/// Severity is always present; application and module are optional and a
/// missing field matches any value in that position. Derived ordering is
/// lexicographic with missing fields sorting before present ones, which is
/// exactly the canonical order the index table merges on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MatchKey {
    pub severity: Severity,
    pub application: Option<String>,
    pub module: Option<String>,
}

impl MatchKey {
    pub fn severity(severity: Severity) -> Self {
        Self {
            severity,
            application: None,
            module: None,
        }
    }

    pub fn application(severity: Severity, application: impl Into<String>) -> Self {
        Self {
            severity,
            application: Some(application.into()),
            module: None,
        }
    }

    pub fn full(
        severity: Severity,
        application: impl Into<String>,
        module: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            application: Some(application.into()),
            module: Some(module.into()),
        }
    }

    pub fn module(severity: Severity, module: impl Into<String>) -> Self {
        Self {
            severity,
            application: None,
            module: Some(module.into()),
        }
    }

    /// Number of present fields (1, 2, or 3).
    pub fn arity(&self) -> usize {
        1 + usize::from(self.application.is_some()) + usize::from(self.module.is_some())
    }

    /// Proper prefixes of this key, most specific first.
    ///
    /// These are the entries whose descendant counts this key contributes to.
    pub fn prefixes(&self) -> Vec<MatchKey> {
        match (&self.application, &self.module) {
            (Some(app), Some(_)) => vec![
                MatchKey::application(self.severity, app.clone()),
                MatchKey::severity(self.severity),
            ],
            (Some(_), None) | (None, Some(_)) => vec![MatchKey::severity(self.severity)],
            (None, None) => Vec::new(),
        }
    }
}

/// Severity part of a structured condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityFilter {
    /// The given severity and everything more severe.
    AtLeast(Severity),
    /// Inclusive range.
    Range(Severity, Severity),
    /// Exactly the listed severities.
    In(Vec<Severity>),
}

impl SeverityFilter {
    fn expand(&self) -> Result<Vec<Severity>> {
        match self {
            SeverityFilter::AtLeast(s) => Ok(Severity::span(*s, Severity::Emergency).collect()),
            SeverityFilter::Range(low, high) => {
                if low > high {
                    return Err(RouterError::invalid(
                        "condition",
                        format!("empty severity range {}..={}", low, high),
                    ));
                }
                Ok(Severity::span(*low, *high).collect())
            }
            SeverityFilter::In(list) => {
                if list.is_empty() {
                    return Err(RouterError::invalid("condition", "empty severity list"));
                }
                Ok(list.clone())
            }
        }
    }
}

/// User-supplied condition, in any of the accepted input forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// The given severity and everything more severe.
    Severity(Severity),
    /// Inclusive severity range.
    Range(Severity, Severity),
    /// Exactly the listed severities.
    Severities(Vec<Severity>),
    /// Severity filter narrowed to an application and/or module.
    Scoped {
        severity: SeverityFilter,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        application: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        module: Option<String>,
    },
    /// Union of sub-conditions.
    Any(Vec<Condition>),
}

impl Condition {
    /// Canonicalise into a sorted, de-duplicated key set.
    ///
    /// Idempotent and order-independent: the result depends only on the set
    /// of `(severity, application, module)` combinations the condition
    /// denotes.
    pub fn normalise(&self) -> Result<Vec<MatchKey>> {
        let mut keys = Vec::new();
        self.collect(&mut keys)?;
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    fn collect(&self, out: &mut Vec<MatchKey>) -> Result<()> {
        match self {
            Condition::Severity(s) => {
                out.extend(Severity::span(*s, Severity::Emergency).map(MatchKey::severity));
            }
            Condition::Range(low, high) => {
                for s in SeverityFilter::Range(*low, *high).expand()? {
                    out.push(MatchKey::severity(s));
                }
            }
            Condition::Severities(list) => {
                for s in SeverityFilter::In(list.clone()).expand()? {
                    out.push(MatchKey::severity(s));
                }
            }
            Condition::Scoped {
                severity,
                application,
                module,
            } => {
                if let Some(app) = application {
                    if app.is_empty() {
                        return Err(RouterError::invalid("condition", "empty application name"));
                    }
                }
                if let Some(m) = module {
                    if m.is_empty() {
                        return Err(RouterError::invalid("condition", "empty module name"));
                    }
                }
                for s in severity.expand()? {
                    out.push(MatchKey {
                        severity: s,
                        application: application.clone(),
                        module: module.clone(),
                    });
                }
            }
            Condition::Any(conditions) => {
                if conditions.is_empty() {
                    return Err(RouterError::invalid("condition", "empty union"));
                }
                for c in conditions {
                    c.collect(out)?;
                }
            }
        }
        Ok(())
    }
}

/// Result of [`diff`]: three disjoint key sets whose union is `new ∪ old`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionDiff {
    pub added: Vec<MatchKey>,
    pub common: Vec<MatchKey>,
    pub removed: Vec<MatchKey>,
}

/// Diff two normalised key sets in linear time.
///
/// Both inputs must be sorted and de-duplicated, which [`Condition::normalise`]
/// guarantees.
pub fn diff(new: &[MatchKey], old: &[MatchKey]) -> ConditionDiff {
    let mut out = ConditionDiff::default();
    let (mut i, mut j) = (0, 0);

    while i < new.len() && j < old.len() {
        match new[i].cmp(&old[j]) {
            std::cmp::Ordering::Less => {
                out.added.push(new[i].clone());
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.removed.push(old[j].clone());
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.common.push(new[i].clone());
                i += 1;
                j += 1;
            }
        }
    }
    out.added.extend(new[i..].iter().cloned());
    out.removed.extend(old[j..].iter().cloned());
    out
}
