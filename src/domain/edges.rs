//! Edge configuration for rate-limited execution.

use serde::{Deserialize, Serialize};

/// Which edges of a call burst trigger an execution.
///
/// The four variants cover every subset of `{leading, trailing}`.
///
/// # Example
/// ```
/// use quiesce::Edges;
///
/// assert_eq!(Edges::default(), Edges::Both);
/// assert!(Edges::Both.leading() && Edges::Both.trailing());
/// assert_eq!(Edges::from_flags(false, true), Edges::Trailing);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edges {
    /// Execute at the start of a burst only.
    Leading,
    /// Execute at the end of a burst only, with the latest arguments.
    Trailing,
    /// Execute at the start and, if more calls followed, at the end.
    #[default]
    Both,
    /// Never execute. Calls are accepted and dropped.
    Neither,
}

impl Edges {
    /// Build an edge set from individual flags.
    pub fn from_flags(leading: bool, trailing: bool) -> Self {
        match (leading, trailing) {
            (true, true) => Edges::Both,
            (true, false) => Edges::Leading,
            (false, true) => Edges::Trailing,
            (false, false) => Edges::Neither,
        }
    }

    /// Whether the leading edge is part of this set.
    pub fn leading(self) -> bool {
        matches!(self, Edges::Leading | Edges::Both)
    }

    /// Whether the trailing edge is part of this set.
    pub fn trailing(self) -> bool {
        matches!(self, Edges::Trailing | Edges::Both)
    }

    /// Whether any execution can happen at all.
    pub fn any(self) -> bool {
        !matches!(self, Edges::Neither)
    }
}
