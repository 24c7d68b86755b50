//! The `format` keyword policy and its hand-built validators.
//!
//! Every check is a plain `&str -> bool` predicate. Non-string instance
//! values never reach a predicate — format assertions apply to strings
//! only, so everything else is vacuously valid.

mod email;
mod regexes;
mod rfc3339;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use regexes::RegexVariant;

pub type FormatCheck = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Formats the caller has switched off, either by name or wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisabledFormats {
    #[serde(default)]
    all: bool,
    #[serde(default)]
    names: BTreeSet<String>,
}

impl DisabledFormats {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn all() -> Self {
        Self {
            all: true,
            names: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            all: false,
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub const fn is_all(&self) -> bool {
        self.all
    }

    #[must_use]
    pub fn disables(&self, name: &str) -> bool {
        self.all || self.names.contains(name)
    }

    fn named_only(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// The format-checking policy consumed from outside the core: master
/// switch, regex dialect, and per-name disables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatPolicy {
    pub enabled: bool,
    pub regex_variant: RegexVariant,
    pub disabled: DisabledFormats,
}

impl Default for FormatPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            regex_variant: RegexVariant::Default,
            disabled: DisabledFormats::none(),
        }
    }
}

impl FormatPolicy {
    /// Whether format assertions run at all. Disabling every name is the
    /// same as turning the feature off.
    #[must_use]
    pub fn assertions_enabled(&self) -> bool {
        self.enabled && !self.disabled.is_all()
    }

    /// Build the named checks to install on a validator.
    ///
    /// Hand-built checks replace the engine's own implementations of the
    /// same names. A name the caller disabled maps to an always-true check,
    /// so the engine's built-in cannot resurrect it; that also covers
    /// disabled names we have no implementation for. Each name appears at
    /// most once.
    #[must_use]
    pub fn checks(&self) -> BTreeMap<String, FormatCheck> {
        let mut out: BTreeMap<String, FormatCheck> = BTreeMap::new();
        if !self.assertions_enabled() {
            return out;
        }

        let variant = self.regex_variant;
        let built: [(&str, FormatCheck); 4] = [
            ("date-time", Arc::new(|v: &str| rfc3339::is_rfc3339_datetime(v))),
            ("email", Arc::new(|v: &str| email::is_rfc5321_email(v))),
            ("idn-email", Arc::new(|v: &str| email::is_rfc6531_email(v))),
            (
                "regex",
                Arc::new(move |v: &str| regexes::pattern_is_valid(v, variant)),
            ),
        ];
        for (name, check) in built {
            if self.disabled.disables(name) {
                out.insert(name.to_string(), always_valid());
            } else {
                out.insert(name.to_string(), check);
            }
        }
        for name in self.disabled.named_only() {
            out.entry(name.to_string()).or_insert_with(always_valid);
        }
        out
    }
}

fn always_valid() -> FormatCheck {
    Arc::new(|_: &str| true)
}
