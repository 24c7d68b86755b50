//! Syntax checks for the `regex` format. Two dialects are on offer: the
//! engine the compiled validator itself uses for the `pattern` keyword, and
//! ECMA-262 for schemas written against scripting-language tooling.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SchemaVetError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegexVariant {
    /// The dialect of the engine behind the `pattern` keyword, so a pattern
    /// that passes format checking is guaranteed to compile at match time.
    #[default]
    Default,
    /// ECMA-262 dialect compatibility.
    Ecma,
}

impl RegexVariant {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Ecma => "ecma",
        }
    }
}

impl FromStr for RegexVariant {
    type Err = SchemaVetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "ecma" => Ok(Self::Ecma),
            _ => Err(SchemaVetError::Internal(format!(
                "unknown regex variant: {s}"
            ))),
        }
    }
}

pub(crate) fn pattern_is_valid(pattern: &str, variant: RegexVariant) -> bool {
    match variant {
        RegexVariant::Default => engine_accepts(pattern),
        RegexVariant::Ecma => regress::Regex::new(pattern).is_ok(),
    }
}

/// Syntax check against the validator's own pattern engine.
///
/// The strict parser covers the common case cheaply. It has no lookaround
/// and no backreferences, while the engine tolerates both through its
/// backtracking fallback — only patterns using those constructs earn the
/// second, slower opinion.
fn engine_accepts(pattern: &str) -> bool {
    if regex::Regex::new(pattern).is_ok() {
        return true;
    }
    if uses_fallback_syntax(pattern) {
        return fancy_regex::Regex::new(pattern).is_ok();
    }
    false
}

fn uses_fallback_syntax(pattern: &str) -> bool {
    const MARKERS: [&str; 5] = ["(?=", "(?!", "(?<=", "(?<!", r"\k<"];
    if MARKERS.iter().any(|marker| pattern.contains(marker)) {
        return true;
    }
    // Numbered backreferences: a backslash followed by a nonzero digit.
    pattern
        .as_bytes()
        .windows(2)
        .any(|pair| pair[0] == b'\\' && pair[1].is_ascii_digit() && pair[1] != b'0')
}
