use std::fmt;

/// Structural problem in a detection rule, surfaced during evaluation.
///
/// Missing or empty *signals* are never an error — a leaf over an absent
/// signal simply doesn't match. These variants only cover rules that are
/// malformed in themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// `all`/`any` node with no children.
    EmptyCompound(&'static str),
    /// Leaf with an empty match pattern.
    EmptyPattern,
    /// Nesting exceeds the evaluator's depth limit.
    TooDeep(usize),
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyCompound(op) => write!(f, "'{op}' rule has no children"),
            Self::EmptyPattern => write!(f, "rule leaf has an empty match pattern"),
            Self::TooDeep(limit) => write!(f, "rule nesting exceeds depth limit ({limit})"),
        }
    }
}

impl std::error::Error for RuleError {}
