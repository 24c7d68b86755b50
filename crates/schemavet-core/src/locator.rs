use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

use reqwest::Url;

use crate::error::{Result, SchemaVetError};

/// Where a schema comes from. Parsed once from user input and dispatched
/// exhaustively; the variant set is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaLocator {
    /// A schema file on the local filesystem.
    LocalPath(PathBuf),
    /// A schema fetched over HTTP(S), subject to the download cache.
    HttpUrl(Url),
    /// An entry in the embedded schema table; no network, no cache.
    BuiltinName(String),
    /// No schema document at all: each instance is checked against the
    /// metaschema of the dialect it declares.
    Metaschema,
}

impl SchemaLocator {
    /// Classify a user-supplied schema location.
    ///
    /// `http`/`https` URLs become [`SchemaLocator::HttpUrl`], `file:` URLs
    /// are converted to local paths, and anything without a scheme is a
    /// local path. A single-letter "scheme" is a Windows drive prefix, not
    /// a scheme. Any other explicit scheme is fatal here, before any fetch.
    pub fn parse(input: &str) -> Result<Self> {
        let Some((scheme, _)) = split_scheme(input) else {
            return Ok(Self::LocalPath(PathBuf::from(input)));
        };

        match scheme.to_ascii_lowercase().as_str() {
            "http" | "https" => {
                let url = Url::parse(input).map_err(|err| {
                    SchemaVetError::SchemaParse(format!("invalid schema URL '{input}': {err}"))
                })?;
                Ok(Self::HttpUrl(url))
            }
            "file" => {
                let url = Url::parse(input).map_err(|err| {
                    SchemaVetError::SchemaParse(format!("invalid file URL '{input}': {err}"))
                })?;
                let path = url.to_file_path().map_err(|()| {
                    SchemaVetError::SchemaParse(format!("file URL has no usable path: {input}"))
                })?;
                Ok(Self::LocalPath(path))
            }
            other => Err(SchemaVetError::UnsupportedUrlScheme(other.to_string())),
        }
    }

    pub fn builtin(name: impl Into<String>) -> Self {
        Self::BuiltinName(name.into())
    }

    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::HttpUrl(_))
    }
}

impl Display for SchemaLocator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocalPath(path) => write!(f, "{}", path.display()),
            Self::HttpUrl(url) => f.write_str(url.as_str()),
            Self::BuiltinName(name) => write!(f, "builtin:{name}"),
            Self::Metaschema => f.write_str("metaschema"),
        }
    }
}

impl FromStr for SchemaLocator {
    type Err = SchemaVetError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Split a leading URI scheme off `input`, if one is present.
///
/// A scheme is an RFC 3986 scheme of at least two characters ending at the
/// first `:`; one-character prefixes are Windows drive letters and do not
/// count. Returns `(scheme, rest_after_colon)`.
pub(crate) fn split_scheme(input: &str) -> Option<(&str, &str)> {
    let colon = input.find(':')?;
    if colon < 2 {
        return None;
    }
    let (scheme, rest) = input.split_at(colon);
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        return None;
    }
    Some((scheme, &rest[1..]))
}
