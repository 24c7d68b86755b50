use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use jsonschema::{Retrieve, Uri};
use reqwest::Url;
use serde_json::Value;
use tracing::debug;

use crate::cache::{CacheDownloader, url_tail};
use crate::error::{Result, SchemaVetError};
use crate::locator::split_scheme;
use crate::parse::{DocumentFormat, ParserRegistry};

/// The URI-addressable resource graph behind `$ref` resolution.
///
/// Seeded with the root schema under its retrieval URI and its `$id` (the
/// `$id` is the canonical self-reference). Everything else is fetched on
/// first dereference and memoized for the registry's lifetime: a URI is
/// fetched and decoded at most once, and only if something actually points
/// at it.
pub struct ResourceRegistry {
    retrieval_uri: Option<Url>,
    parsers: ParserRegistry,
    downloader: CacheDownloader,
    resources: Mutex<HashMap<String, Arc<Value>>>,
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("retrieval_uri", &self.retrieval_uri.as_ref().map(Url::as_str))
            .finish_non_exhaustive()
    }
}

impl ResourceRegistry {
    pub fn new(
        retrieval_uri: Option<Url>,
        root: Value,
        parsers: ParserRegistry,
        downloader: CacheDownloader,
    ) -> Self {
        let mut resources = HashMap::new();
        let self_id = root.get("$id").and_then(Value::as_str).map(ToString::to_string);
        let root = Arc::new(root);
        if let Some(uri) = &retrieval_uri {
            resources.insert(uri.to_string(), Arc::clone(&root));
        }
        if let Some(id) = self_id {
            resources.insert(id, Arc::clone(&root));
        }

        Self {
            retrieval_uri,
            parsers,
            downloader,
            resources: Mutex::new(resources),
        }
    }

    #[must_use]
    pub fn retrieval_uri(&self) -> Option<&Url> {
        self.retrieval_uri.as_ref()
    }

    /// Resolve `reference` to an absolute URI and return its decoded
    /// resource, fetching it on first use.
    ///
    /// Scheme-less references are joined against the retrieval URI first.
    /// Any failure along the way is a schema defect (`RefResolution`),
    /// never an instance validation result.
    pub fn retrieve(&self, reference: &str) -> Result<Arc<Value>> {
        let resolved = self.resolve_reference(reference)?;

        if let Some(found) = self.resources()?.get(&resolved) {
            debug!(uri = %resolved, "reference served from registry");
            return Ok(Arc::clone(found));
        }

        let fetched = self.fetch_resource(&resolved).map_err(|err| match err {
            already @ SchemaVetError::RefResolution { .. } => already,
            other => SchemaVetError::RefResolution {
                uri: resolved.clone(),
                reason: other.to_string(),
            },
        })?;
        debug!(uri = %resolved, "reference fetched and decoded");

        let fetched = Arc::new(fetched);
        self.resources()?
            .insert(resolved, Arc::clone(&fetched));
        Ok(fetched)
    }

    fn resources(&self) -> Result<MutexGuard<'_, HashMap<String, Arc<Value>>>> {
        self.resources
            .lock()
            .map_err(|_| SchemaVetError::Internal("resource registry lock poisoned".to_string()))
    }

    fn resolve_reference(&self, reference: &str) -> Result<String> {
        if split_scheme(reference).is_some() {
            return Ok(reference.to_string());
        }
        match &self.retrieval_uri {
            Some(base) => base.join(reference).map(|joined| joined.to_string()).map_err(
                |err| SchemaVetError::RefResolution {
                    uri: reference.to_string(),
                    reason: format!("cannot resolve against {base}: {err}"),
                },
            ),
            None => Ok(reference.to_string()),
        }
    }

    /// Scheme dispatch: http(s) goes through the cache downloader, `file:`
    /// and bare paths are read locally; both decode through the parser set
    /// with the format taken from the trailing path segment, defaulting to
    /// JSON.
    fn fetch_resource(&self, uri: &str) -> Result<Value> {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            let name = url_tail(uri);
            let format = self.format_for(&name)?;
            let parsers = self.parsers;
            let bytes = self.downloader.fetch(uri, None, &|payload| {
                parsers.decode(&name, payload, format).is_ok()
            })?;
            return self.parsers.decode(&name, &bytes, format);
        }

        let path = self.local_path(uri)?;
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(uri)
            .to_string();
        let format = self.format_for(&name)?;
        let raw = fs::read(&path).map_err(|err| SchemaVetError::RefResolution {
            uri: uri.to_string(),
            reason: format!("cannot read {}: {err}", path.display()),
        })?;
        self.parsers.decode(&name, &raw, format)
    }

    fn local_path(&self, uri: &str) -> Result<PathBuf> {
        match split_scheme(uri) {
            Some((scheme, _)) if scheme.eq_ignore_ascii_case("file") => Url::parse(uri)
                .ok()
                .and_then(|url| url.to_file_path().ok())
                .ok_or_else(|| SchemaVetError::RefResolution {
                    uri: uri.to_string(),
                    reason: "file URL has no usable path".to_string(),
                }),
            _ => Ok(PathBuf::from(uri)),
        }
    }

    fn format_for(&self, name: &str) -> Result<DocumentFormat> {
        match self.parsers.resolve_format(name, None) {
            Ok(format) => Ok(format),
            Err(SchemaVetError::BadFileType(_)) => Ok(DocumentFormat::Json),
            Err(other) => Err(other),
        }
    }
}

impl Retrieve for ResourceRegistry {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> std::result::Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let resource = ResourceRegistry::retrieve(self, uri.as_str())?;
        Ok((*resource).clone())
    }
}
