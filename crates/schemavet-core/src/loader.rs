use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex, MutexGuard};

use jsonschema::Validator;
use jsonschema::error::ValidationErrorKind;
use reqwest::Url;
use serde_json::Value;
use tracing::debug;

use crate::builtin::{self, DEFAULT_DIALECT};
use crate::cache::{CacheDownloader, CacheSettings};
use crate::error::{Result, SchemaVetError};
use crate::formats::FormatPolicy;
use crate::locator::SchemaLocator;
use crate::parse::{DocumentFormat, ParserRegistry};
use crate::registry::ResourceRegistry;

/// Turns a [`SchemaLocator`] into ready-to-use validators.
///
/// Fixed locators compile exactly one validator, lazily, and reuse it for
/// every instance. The [`SchemaLocator::Metaschema`] variant compiles one
/// validator per dialect the checked instances declare.
pub struct SchemaLoader {
    locator: SchemaLocator,
    policy: FormatPolicy,
    cache: CacheSettings,
    parsers: ParserRegistry,
    compiled: Mutex<HashMap<String, Arc<Validator>>>,
}

impl std::fmt::Debug for SchemaLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaLoader")
            .field("locator", &self.locator)
            .finish_non_exhaustive()
    }
}

impl SchemaLoader {
    #[must_use]
    pub fn new(locator: SchemaLocator, policy: FormatPolicy, cache: CacheSettings) -> Self {
        Self::with_parsers(locator, policy, cache, ParserRegistry::new())
    }

    /// Like [`SchemaLoader::new`] with an explicit parser context, for
    /// callers that carry a default document format.
    #[must_use]
    pub fn with_parsers(
        locator: SchemaLocator,
        policy: FormatPolicy,
        cache: CacheSettings,
        parsers: ParserRegistry,
    ) -> Self {
        Self {
            locator,
            policy,
            cache,
            parsers,
            compiled: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn locator(&self) -> &SchemaLocator {
        &self.locator
    }

    #[must_use]
    pub fn policy(&self) -> &FormatPolicy {
        &self.policy
    }

    /// The validator to check `instance` with.
    ///
    /// For every locator except `Metaschema` the instance is irrelevant and
    /// the one compiled validator is returned. Failures here are schema-side
    /// and fatal: nothing should be checked against a broken schema.
    pub fn validator_for(&self, instance: &Value) -> Result<Arc<Validator>> {
        let key = match &self.locator {
            SchemaLocator::Metaschema => dialect_of(instance).to_string(),
            _ => String::new(),
        };

        if let Some(found) = self.compiled()?.get(&key) {
            return Ok(Arc::clone(found));
        }

        let validator = Arc::new(self.compile(&key)?);
        self.compiled()?.insert(key, Arc::clone(&validator));
        Ok(validator)
    }

    fn compiled(&self) -> Result<MutexGuard<'_, HashMap<String, Arc<Validator>>>> {
        self.compiled
            .lock()
            .map_err(|_| SchemaVetError::Internal("validator cache lock poisoned".to_string()))
    }

    fn compile(&self, dialect: &str) -> Result<Validator> {
        let (retrieval_uri, document) = self.acquire(dialect)?;

        let mut schema = document;
        let Some(object) = schema.as_object_mut() else {
            return Err(SchemaVetError::SchemaParse(format!(
                "schema document must be a JSON object: {}",
                self.locator
            )));
        };
        // A schema without $id gets its retrieval URI as base, so relative
        // $refs resolve to absolute URIs before they reach the registry.
        if let Some(url) = &retrieval_uri {
            if !object.contains_key("$id") {
                object.insert("$id".to_string(), Value::String(url.to_string()));
            }
        }

        if let Err(err) = jsonschema::meta::validate(&schema) {
            return Err(SchemaVetError::InvalidSchema(err.to_string()));
        }

        let registry = ResourceRegistry::new(
            retrieval_uri,
            schema.clone(),
            self.parsers,
            CacheDownloader::new(self.cache.clone())?,
        );

        let mut options = jsonschema::options();
        options.with_retriever(registry);
        if self.policy.assertions_enabled() {
            options.should_validate_formats(true);
            for (name, check) in self.policy.checks() {
                options.with_format(name, move |value: &str| check(value));
            }
        } else {
            options.should_validate_formats(false);
        }

        debug!(locator = %self.locator, "compiling schema");
        options.build(&schema).map_err(|err| match err.kind {
            ValidationErrorKind::Referencing(_) => SchemaVetError::RefResolution {
                uri: self.locator.to_string(),
                reason: err.to_string(),
            },
            _ => SchemaVetError::SchemaParse(err.to_string()),
        })
    }

    /// Obtain the raw schema document plus its retrieval URI, per locator
    /// variant.
    fn acquire(&self, dialect: &str) -> Result<(Option<Url>, Value)> {
        match &self.locator {
            SchemaLocator::LocalPath(path) => {
                let raw = fs::read(path)?;
                let filename = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or("schema");
                let format = match self.parsers.resolve_format(filename, None) {
                    Ok(format) => format,
                    Err(SchemaVetError::BadFileType(_)) => DocumentFormat::Json,
                    Err(other) => return Err(other),
                };
                let document =
                    self.parsers
                        .decode(filename, &raw, format)
                        .map_err(|err| match err {
                            SchemaVetError::FailedFileLoad { reason, .. } => {
                                SchemaVetError::SchemaParse(reason)
                            }
                            other => other,
                        })?;
                let retrieval = fs::canonicalize(path)
                    .ok()
                    .and_then(|absolute| Url::from_file_path(absolute).ok());
                Ok((retrieval, document))
            }
            SchemaLocator::HttpUrl(url) => {
                let downloader = CacheDownloader::new(self.cache.clone())?;
                let bytes = downloader.fetch(url.as_str(), None, &|payload| {
                    serde_json::from_slice::<Value>(payload).is_ok()
                })?;
                let document = serde_json::from_slice(&bytes).map_err(|err| {
                    SchemaVetError::SchemaParse(format!("invalid JSON from {url}: {err}"))
                })?;
                Ok((Some(url.clone()), document))
            }
            SchemaLocator::BuiltinName(name) => {
                let entry = builtin::by_name(name).ok_or_else(|| {
                    SchemaVetError::SchemaParse(format!("unknown builtin schema '{name}'"))
                })?;
                Ok((None, entry.document()?))
            }
            SchemaLocator::Metaschema => {
                let entry = builtin::by_dialect(dialect).ok_or_else(|| {
                    SchemaVetError::SchemaParse(format!("unknown metaschema dialect '{dialect}'"))
                })?;
                Ok((None, entry.document()?))
            }
        }
    }
}

fn dialect_of(instance: &Value) -> &str {
    instance
        .get("$schema")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_DIALECT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dialect_detection_defaults_to_latest() {
        assert_eq!(dialect_of(&json!({"type": "object"})), DEFAULT_DIALECT);
        assert_eq!(
            dialect_of(&json!({"$schema": "http://json-schema.org/draft-07/schema#"})),
            "http://json-schema.org/draft-07/schema#"
        );
        assert_eq!(dialect_of(&json!(42)), DEFAULT_DIALECT);
    }

    #[test]
    fn unknown_builtin_is_schema_side() {
        let loader = SchemaLoader::new(
            SchemaLocator::builtin("draft-99"),
            FormatPolicy::default(),
            CacheSettings::disabled(),
        );
        let err = loader.validator_for(&json!({})).expect_err("must fail");
        assert!(matches!(err, SchemaVetError::SchemaParse(_)));
        assert!(err.is_schema_side());
    }

    #[test]
    fn builtin_draft07_compiles_and_checks_schemas() {
        let loader = SchemaLoader::new(
            SchemaLocator::builtin("draft-07"),
            FormatPolicy::default(),
            CacheSettings::disabled(),
        );
        let validator = loader.validator_for(&json!({})).expect("compile");
        assert!(validator.is_valid(&json!({"type": "object"})));
        assert!(!validator.is_valid(&json!({"type": 12})));
    }

    #[test]
    fn metaschema_mode_rejects_unknown_dialects() {
        let loader = SchemaLoader::new(
            SchemaLocator::Metaschema,
            FormatPolicy::default(),
            CacheSettings::disabled(),
        );
        let instance = json!({"$schema": "https://example.com/private-dialect"});
        let err = loader.validator_for(&instance).expect_err("must fail");
        assert!(matches!(err, SchemaVetError::SchemaParse(_)));
    }

    #[test]
    fn metaschema_mode_checks_against_declared_dialect() {
        let loader = SchemaLoader::new(
            SchemaLocator::Metaschema,
            FormatPolicy::default(),
            CacheSettings::disabled(),
        );
        let good = json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object"
        });
        let validator = loader.validator_for(&good).expect("compile");
        assert!(validator.is_valid(&good));

        let bad = json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": 12
        });
        let validator = loader.validator_for(&bad).expect("same dialect, memoized");
        assert!(!validator.is_valid(&bad));
    }
}
