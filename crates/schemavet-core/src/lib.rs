// Public fallible APIs in this crate share one concrete error contract
// (`SchemaVetError`). Repeating per-function `# Errors` boilerplate obscures
// behavior more than it clarifies.
#![allow(
    clippy::missing_errors_doc,
    reason = "crate-wide fallible API uses one explicit error type; per-item boilerplate would duplicate contract"
)]

pub mod builtin;
pub mod cache;
pub mod error;
pub mod formats;
pub mod loader;
pub mod locator;
pub mod parse;
pub mod registry;

pub use cache::{CacheDownloader, CacheSettings, DOWNLOAD_ATTEMPTS, default_cache_dir};
pub use error::{Result, SchemaVetError};
pub use formats::{DisabledFormats, FormatPolicy, RegexVariant};
pub use loader::SchemaLoader;
pub use locator::SchemaLocator;
pub use parse::{DocumentFormat, ParserRegistry};
pub use registry::ResourceRegistry;
