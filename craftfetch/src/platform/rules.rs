//! Conditional inclusion rules attached to manifest entries.

use serde::{Deserialize, Serialize};

use super::{normalize, Platform};

/// Whether a matching rule includes or excludes an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

/// Operating system condition of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Os {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One entry of a rule list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub action: RuleAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<Os>,
}

impl Rule {
    /// Unconditional rule.
    pub fn new(action: RuleAction) -> Self {
        Self { action, os: None }
    }

    /// Rule conditioned on an OS name.
    pub fn for_os(action: RuleAction, name: impl Into<String>) -> Self {
        Self {
            action,
            os: Some(Os {
                name: Some(name.into()),
            }),
        }
    }

    fn os_name(&self) -> Option<&str> {
        self.os.as_ref().and_then(|os| os.name.as_deref())
    }

    fn decide(&self, is_match: &impl Fn(&str) -> bool) -> bool {
        let allow = self.action == RuleAction::Allow;
        match self.os_name() {
            None => allow,
            Some(name) => allow == is_match(name),
        }
    }
}

/// Decide whether an entry guarded by `rules` is included.
///
/// An absent or empty list includes the entry. Otherwise every rule is
/// evaluated in order and the decision of the last one is returned: later
/// rules override earlier ones, they are not combined.
pub fn should_include(rules: Option<&[Rule]>, is_match: impl Fn(&str) -> bool) -> bool {
    let Some(rules) = rules else {
        return true;
    };

    let mut decision = true;
    for rule in rules {
        decision = rule.decide(&is_match);
    }
    decision
}

/// Predicate matching rule OS names against `current`.
///
/// Names that do not normalise to a supported platform never match.
pub fn platform_matcher(current: Platform) -> impl Fn(&str) -> bool {
    move |name| normalize(name).map(|p| p == current).unwrap_or(false)
}
