use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// Depth limit for nested compound rules. Catalog rules are shallow; anything
/// deeper than this is a malformed definition, not a real rule.
pub const MAX_RULE_DEPTH: usize = 32;

// ---------------------------------------------------------------------------
// Signal context
// ---------------------------------------------------------------------------

/// Per-evaluation bag of observed signals. Built on the fly either from live
/// probe results or retrospectively from a stored provider name/domain pair.
/// Every field is optional; a leaf over an absent signal evaluates to false.
#[derive(Debug, Clone, Default)]
pub struct SignalContext {
    pub nameservers: Vec<String>,
    pub mail_exchangers: Vec<String>,
    /// Header names lowercased by the caller.
    pub headers: BTreeMap<String, String>,
    pub issuer: Option<String>,
    pub registrar: Option<String>,
}

// ---------------------------------------------------------------------------
// Rule model
// ---------------------------------------------------------------------------

/// Signal field a leaf predicate reads. Headers have their own variant
/// because they carry a name in addition to an optional value pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalField {
    Nameserver,
    MailExchanger,
    Issuer,
    Registrar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    Exact,
    Suffix,
    Substring,
}

/// Declarative boolean expression over a [`SignalContext`].
///
/// Rules are immutable and attached 1:1 to catalog provider definitions.
/// They serialize as tagged TOML/JSON tables, e.g.
/// `{ op = "signal", field = "mail_exchanger", mode = "suffix", value = "tutanota.de" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DetectionRule {
    Signal {
        field: SignalField,
        mode: MatchMode,
        value: String,
    },
    Header {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    All {
        rules: Vec<DetectionRule>,
    },
    Any {
        rules: Vec<DetectionRule>,
    },
    Not {
        rule: Box<DetectionRule>,
    },
}

impl DetectionRule {
    pub fn ns_suffix(value: impl Into<String>) -> Self {
        Self::Signal {
            field: SignalField::Nameserver,
            mode: MatchMode::Suffix,
            value: value.into(),
        }
    }

    pub fn mx_suffix(value: impl Into<String>) -> Self {
        Self::Signal {
            field: SignalField::MailExchanger,
            mode: MatchMode::Suffix,
            value: value.into(),
        }
    }

    pub fn issuer_contains(value: impl Into<String>) -> Self {
        Self::Signal {
            field: SignalField::Issuer,
            mode: MatchMode::Substring,
            value: value.into(),
        }
    }

    pub fn registrar_contains(value: impl Into<String>) -> Self {
        Self::Signal {
            field: SignalField::Registrar,
            mode: MatchMode::Substring,
            value: value.into(),
        }
    }

    /// Header presence check.
    pub fn header(name: impl Into<String>) -> Self {
        Self::Header { name: name.into(), value: None }
    }

    /// Header value substring check.
    pub fn header_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Header { name: name.into(), value: Some(value.into()) }
    }

    pub fn all(rules: Vec<DetectionRule>) -> Self {
        Self::All { rules }
    }

    pub fn any(rules: Vec<DetectionRule>) -> Self {
        Self::Any { rules }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(rule: DetectionRule) -> Self {
        Self::Not { rule: Box::new(rule) }
    }

    /// Structural validation. Unlike evaluation this never short-circuits,
    /// so malformed branches behind a satisfied one are still caught.
    /// Used by catalog validation.
    pub fn check(&self) -> Result<(), RuleError> {
        check_at(self, 0)
    }
}

fn check_at(rule: &DetectionRule, depth: usize) -> Result<(), RuleError> {
    if depth > MAX_RULE_DEPTH {
        return Err(RuleError::TooDeep(MAX_RULE_DEPTH));
    }
    match rule {
        DetectionRule::Signal { value, .. } => {
            if value.is_empty() {
                Err(RuleError::EmptyPattern)
            } else {
                Ok(())
            }
        }
        DetectionRule::Header { name, value } => {
            if name.is_empty() || value.as_deref() == Some("") {
                Err(RuleError::EmptyPattern)
            } else {
                Ok(())
            }
        }
        DetectionRule::All { rules } => {
            if rules.is_empty() {
                return Err(RuleError::EmptyCompound("all"));
            }
            rules.iter().try_for_each(|r| check_at(r, depth + 1))
        }
        DetectionRule::Any { rules } => {
            if rules.is_empty() {
                return Err(RuleError::EmptyCompound("any"));
            }
            rules.iter().try_for_each(|r| check_at(r, depth + 1))
        }
        DetectionRule::Not { rule } => check_at(rule, depth + 1),
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluate a rule against a signal context. Pure; no side effects.
///
/// Absent or empty signals make leaves false rather than erroring. Compound
/// nodes short-circuit. Errors cover malformed rule structure only; callers
/// in the reconciler treat them as non-matches.
pub fn evaluate(rule: &DetectionRule, ctx: &SignalContext) -> Result<bool, RuleError> {
    evaluate_at(rule, ctx, 0)
}

fn evaluate_at(rule: &DetectionRule, ctx: &SignalContext, depth: usize) -> Result<bool, RuleError> {
    if depth > MAX_RULE_DEPTH {
        return Err(RuleError::TooDeep(MAX_RULE_DEPTH));
    }

    match rule {
        DetectionRule::Signal { field, mode, value } => {
            if value.is_empty() {
                return Err(RuleError::EmptyPattern);
            }
            let pattern = value.to_lowercase();
            Ok(match field {
                SignalField::Nameserver => match_host_list(&ctx.nameservers, *mode, &pattern),
                SignalField::MailExchanger => {
                    match_host_list(&ctx.mail_exchangers, *mode, &pattern)
                }
                SignalField::Issuer => match_opt(ctx.issuer.as_deref(), *mode, &pattern),
                SignalField::Registrar => match_opt(ctx.registrar.as_deref(), *mode, &pattern),
            })
        }
        DetectionRule::Header { name, value } => {
            if name.is_empty() {
                return Err(RuleError::EmptyPattern);
            }
            let observed = ctx.headers.get(&name.to_lowercase());
            Ok(match (observed, value) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(observed), Some(pattern)) => {
                    if pattern.is_empty() {
                        return Err(RuleError::EmptyPattern);
                    }
                    observed.to_lowercase().contains(&pattern.to_lowercase())
                }
            })
        }
        DetectionRule::All { rules } => {
            if rules.is_empty() {
                return Err(RuleError::EmptyCompound("all"));
            }
            for r in rules {
                if !evaluate_at(r, ctx, depth + 1)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        DetectionRule::Any { rules } => {
            if rules.is_empty() {
                return Err(RuleError::EmptyCompound("any"));
            }
            for r in rules {
                if evaluate_at(r, ctx, depth + 1)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        DetectionRule::Not { rule } => Ok(!evaluate_at(rule, ctx, depth + 1)?),
    }
}

/// Match one hostname-ish entry. Trailing dots are insignificant in DNS data,
/// and a suffix match must sit on a label boundary: `tutanota.de` matches
/// `mail.tutanota.de` and `tutanota.de` itself, but not `nottutanota.de`.
fn match_host(entry: &str, mode: MatchMode, pattern: &str) -> bool {
    let entry = entry.to_lowercase();
    let entry = entry.trim_end_matches('.');
    let pattern = pattern.trim_end_matches('.');
    match mode {
        MatchMode::Exact => entry == pattern,
        MatchMode::Suffix => {
            entry == pattern
                || entry
                    .strip_suffix(pattern)
                    .is_some_and(|head| head.ends_with('.'))
        }
        MatchMode::Substring => entry.contains(pattern),
    }
}

fn match_host_list(entries: &[String], mode: MatchMode, pattern: &str) -> bool {
    entries.iter().any(|e| match_host(e, mode, pattern))
}

fn match_opt(observed: Option<&str>, mode: MatchMode, pattern: &str) -> bool {
    let Some(observed) = observed else { return false };
    let observed = observed.to_lowercase();
    match mode {
        MatchMode::Exact => observed == pattern,
        MatchMode::Suffix => observed.ends_with(pattern),
        MatchMode::Substring => observed.contains(pattern),
    }
}
