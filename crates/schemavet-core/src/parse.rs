use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SchemaVetError};

/// Document formats the parser set knows about. TOML and JSON5 decoding is
/// optional at build time; the names are always recognized so that a build
/// without them can report what is missing instead of shrugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Json,
    Yaml,
    Toml,
    Json5,
}

impl DocumentFormat {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Toml => "toml",
            Self::Json5 => "json5",
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            "json5" => Some(Self::Json5),
            _ => None,
        }
    }

    /// Whether the decoder for this format is compiled into the build.
    #[must_use]
    pub const fn available(&self) -> bool {
        match self {
            Self::Json | Self::Yaml => true,
            Self::Toml => cfg!(feature = "toml"),
            Self::Json5 => cfg!(feature = "json5"),
        }
    }

    const fn missing_support_hint(&self) -> &'static str {
        match self {
            Self::Json | Self::Yaml => "always available",
            Self::Toml => "rebuild with the `toml` cargo feature",
            Self::Json5 => "rebuild with the `json5` cargo feature",
        }
    }

    fn missing_support_error(&self) -> SchemaVetError {
        SchemaVetError::MissingFormatSupport {
            format: self.as_str(),
            hint: self.missing_support_hint(),
        }
    }
}

impl Display for DocumentFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentFormat {
    type Err = SchemaVetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            "json5" => Ok(Self::Json5),
            _ => Err(SchemaVetError::BadFileType(s.to_string())),
        }
    }
}

/// Caller-owned parser context. Holds the fallback format applied when a
/// filename gives no hint; there is no module-level decoder state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserRegistry {
    default_format: Option<DocumentFormat>,
}

impl ParserRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            default_format: None,
        }
    }

    #[must_use]
    pub const fn with_default_format(format: DocumentFormat) -> Self {
        Self {
            default_format: Some(format),
        }
    }

    /// Pick the decoder for `filename`.
    ///
    /// Order: explicit `forced` override, then the filename extension, then
    /// the registry default. A format nobody can name is `BadFileType`; a
    /// format whose decoder is compiled out is `MissingFormatSupport`.
    pub fn resolve_format(
        &self,
        filename: &str,
        forced: Option<DocumentFormat>,
    ) -> Result<DocumentFormat> {
        let detected = forced
            .or_else(|| {
                Path::new(filename)
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.to_ascii_lowercase())
                    .and_then(|ext| DocumentFormat::from_extension(&ext))
            })
            .or(self.default_format)
            .ok_or_else(|| SchemaVetError::BadFileType(filename.to_string()))?;

        if !detected.available() {
            return Err(detected.missing_support_error());
        }
        Ok(detected)
    }

    /// Decode `raw` as `format` into a JSON-compatible tree.
    ///
    /// `name` only labels errors. Malformed content of a recognized format
    /// is `FailedFileLoad`, never `BadFileType`.
    pub fn decode(&self, name: &str, raw: &[u8], format: DocumentFormat) -> Result<Value> {
        let text = std::str::from_utf8(raw).map_err(|err| SchemaVetError::FailedFileLoad {
            name: name.to_string(),
            reason: format!("not valid UTF-8: {err}"),
        })?;

        match format {
            DocumentFormat::Json => decode_json(name, text),
            DocumentFormat::Yaml => decode_yaml(name, text),
            DocumentFormat::Toml => {
                #[cfg(feature = "toml")]
                {
                    decode_toml(name, text)
                }
                #[cfg(not(feature = "toml"))]
                {
                    Err(format.missing_support_error())
                }
            }
            DocumentFormat::Json5 => {
                #[cfg(feature = "json5")]
                {
                    decode_json5(name, text)
                }
                #[cfg(not(feature = "json5"))]
                {
                    Err(format.missing_support_error())
                }
            }
        }
    }

    /// Resolve and decode in one step, reading format hints from `name`.
    pub fn load(
        &self,
        name: &str,
        raw: &[u8],
        forced: Option<DocumentFormat>,
    ) -> Result<Value> {
        let format = self.resolve_format(name, forced)?;
        self.decode(name, raw, format)
    }
}

fn decode_json(name: &str, text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|err| SchemaVetError::FailedFileLoad {
        name: name.to_string(),
        reason: format!("invalid JSON: {err}"),
    })
}

fn decode_yaml(name: &str, text: &str) -> Result<Value> {
    let doc: serde_norway::Value =
        serde_norway::from_str(text).map_err(|err| SchemaVetError::FailedFileLoad {
            name: name.to_string(),
            reason: format!("invalid YAML: {err}"),
        })?;
    yaml_to_json(&doc).map_err(|reason| SchemaVetError::FailedFileLoad {
        name: name.to_string(),
        reason,
    })
}

/// Convert a YAML tree to JSON. Mapping keys are coerced to strings so the
/// schema engine sees one uniform object model; YAML tags are unwrapped.
/// Timestamp-looking scalars stay plain strings — date semantics belong to
/// format validation, not the decoder.
fn yaml_to_json(doc: &serde_norway::Value) -> std::result::Result<Value, String> {
    match doc {
        serde_norway::Value::Null => Ok(Value::Null),
        serde_norway::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_norway::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Number(serde_json::Number::from(i)))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::Number(serde_json::Number::from(u)))
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| format!("cannot represent {f} in JSON"))
            } else {
                Err(format!("unsupported YAML number: {n:?}"))
            }
        }
        serde_norway::Value::String(s) => Ok(Value::String(s.clone())),
        serde_norway::Value::Sequence(items) => {
            let converted: std::result::Result<Vec<Value>, String> =
                items.iter().map(yaml_to_json).collect();
            Ok(Value::Array(converted?))
        }
        serde_norway::Value::Mapping(mapping) => {
            let mut object = serde_json::Map::new();
            for (key, value) in mapping {
                let key = match key {
                    serde_norway::Value::String(s) => s.clone(),
                    serde_norway::Value::Number(n) => n.to_string(),
                    serde_norway::Value::Bool(b) => b.to_string(),
                    serde_norway::Value::Null => "null".to_string(),
                    other => return Err(format!("unsupported YAML map key: {other:?}")),
                };
                object.insert(key, yaml_to_json(value)?);
            }
            Ok(Value::Object(object))
        }
        serde_norway::Value::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

#[cfg(feature = "toml")]
fn decode_toml(name: &str, text: &str) -> Result<Value> {
    let doc: toml::Value = toml::from_str(text).map_err(|err| SchemaVetError::FailedFileLoad {
        name: name.to_string(),
        reason: format!("invalid TOML: {err}"),
    })?;
    toml_to_json(doc).map_err(|reason| SchemaVetError::FailedFileLoad {
        name: name.to_string(),
        reason,
    })
}

/// Convert a TOML tree to JSON. Native temporal values become RFC3339-style
/// strings: offset-aware date-times keep their offset, offset-less
/// date-times get a `Z` appended, bare dates and times render as-is.
#[cfg(feature = "toml")]
fn toml_to_json(doc: toml::Value) -> std::result::Result<Value, String> {
    match doc {
        toml::Value::String(s) => Ok(Value::String(s)),
        toml::Value::Integer(i) => Ok(Value::Number(serde_json::Number::from(i))),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| format!("cannot represent {f} in JSON")),
        toml::Value::Boolean(b) => Ok(Value::Bool(b)),
        toml::Value::Datetime(dt) => Ok(Value::String(render_toml_datetime(&dt))),
        toml::Value::Array(items) => {
            let converted: std::result::Result<Vec<Value>, String> =
                items.into_iter().map(toml_to_json).collect();
            Ok(Value::Array(converted?))
        }
        toml::Value::Table(table) => {
            let mut object = serde_json::Map::new();
            for (key, value) in table {
                object.insert(key, toml_to_json(value)?);
            }
            Ok(Value::Object(object))
        }
    }
}

#[cfg(feature = "toml")]
fn render_toml_datetime(dt: &toml::value::Datetime) -> String {
    let mut out = dt.to_string();
    if dt.date.is_some() && dt.time.is_some() && dt.offset.is_none() {
        out.push('Z');
    }
    out
}

#[cfg(feature = "json5")]
fn decode_json5(name: &str, text: &str) -> Result<Value> {
    json5::from_str(text).map_err(|err| SchemaVetError::FailedFileLoad {
        name: name.to_string(),
        reason: format!("invalid JSON5: {err}"),
    })
}
