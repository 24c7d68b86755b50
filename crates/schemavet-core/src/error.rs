use thiserror::Error;

pub type Result<T> = std::result::Result<T, SchemaVetError>;

#[derive(Debug, Error)]
pub enum SchemaVetError {
    #[error("failed to parse schema: {0}")]
    SchemaParse(String),

    #[error("schema failed its own metaschema check: {0}")]
    InvalidSchema(String),

    #[error("unsupported URL scheme: {0}")]
    UnsupportedUrlScheme(String),

    #[error("failed to download {url} after {attempts} attempts: {reason}")]
    FailedDownload {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("cannot determine the file format of {0}")]
    BadFileType(String),

    #[error("{format} support is not compiled into this build ({hint})")]
    MissingFormatSupport {
        format: &'static str,
        hint: &'static str,
    },

    #[error("failed to load {name}: {reason}")]
    FailedFileLoad { name: String, reason: String },

    #[error("failed to resolve reference {uri}: {reason}")]
    RefResolution { uri: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SchemaVetError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::SchemaParse(_) => "SCHEMA_PARSE",
            Self::InvalidSchema(_) => "SCHEMA_INVALID",
            Self::UnsupportedUrlScheme(_) => "UNSUPPORTED_URL_SCHEME",
            Self::FailedDownload { .. } => "FAILED_DOWNLOAD",
            Self::BadFileType(_) => "BAD_FILE_TYPE",
            Self::MissingFormatSupport { .. } => "MISSING_FORMAT_SUPPORT",
            Self::FailedFileLoad { .. } => "FAILED_FILE_LOAD",
            Self::RefResolution { .. } => "REF_RESOLUTION",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Http(_) => "HTTP_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the failure concerns the schema itself rather than one
    /// instance document. Schema-side failures abort the whole run before
    /// any instance is checked.
    pub fn is_schema_side(&self) -> bool {
        matches!(
            self,
            Self::SchemaParse(_)
                | Self::InvalidSchema(_)
                | Self::UnsupportedUrlScheme(_)
                | Self::FailedDownload { .. }
                | Self::RefResolution { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let err = SchemaVetError::FailedDownload {
            url: "https://example.com/s.json".to_string(),
            attempts: 3,
            reason: "connection refused".to_string(),
        };
        assert_eq!(err.code(), "FAILED_DOWNLOAD");
        assert!(err.is_schema_side());

        let err = SchemaVetError::FailedFileLoad {
            name: "doc.yaml".to_string(),
            reason: "bad indent".to_string(),
        };
        assert_eq!(err.code(), "FAILED_FILE_LOAD");
        assert!(!err.is_schema_side());
    }

    #[test]
    fn bad_file_type_and_failed_load_are_distinct() {
        let undetectable = SchemaVetError::BadFileType("notes.xyz".to_string());
        let malformed = SchemaVetError::FailedFileLoad {
            name: "notes.json".to_string(),
            reason: "trailing comma".to_string(),
        };
        assert_ne!(undetectable.code(), malformed.code());
    }

    #[test]
    fn missing_support_mentions_remediation() {
        let err = SchemaVetError::MissingFormatSupport {
            format: "json5",
            hint: "rebuild with the `json5` cargo feature",
        };
        assert!(err.to_string().contains("json5 cargo feature"));
    }
}
