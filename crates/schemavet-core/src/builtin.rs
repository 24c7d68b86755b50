//! The embedded schema table. Builtin locators read from here instead of
//! touching the network or the cache; the metaschema locator uses the same
//! table to map a declared dialect onto its metaschema document.

use serde_json::Value;

use crate::error::{Result, SchemaVetError};

/// Dialect assumed for instances that declare no `$schema`.
pub const DEFAULT_DIALECT: &str = "https://json-schema.org/draft/2020-12/schema";

pub(crate) struct Builtin {
    pub name: &'static str,
    pub dialect: &'static str,
    raw: &'static str,
}

const TABLE: &[Builtin] = &[
    Builtin {
        name: "draft-04",
        dialect: "http://json-schema.org/draft-04/schema#",
        raw: include_str!("../resources/metaschemas/draft-04.json"),
    },
    Builtin {
        name: "draft-06",
        dialect: "http://json-schema.org/draft-06/schema#",
        raw: include_str!("../resources/metaschemas/draft-06.json"),
    },
    Builtin {
        name: "draft-07",
        dialect: "http://json-schema.org/draft-07/schema#",
        raw: include_str!("../resources/metaschemas/draft-07.json"),
    },
    Builtin {
        name: "draft-2019-09",
        dialect: "https://json-schema.org/draft/2019-09/schema",
        raw: include_str!("../resources/metaschemas/draft-2019-09.json"),
    },
    Builtin {
        name: "draft-2020-12",
        dialect: "https://json-schema.org/draft/2020-12/schema",
        raw: include_str!("../resources/metaschemas/draft-2020-12.json"),
    },
];

#[must_use]
pub fn builtin_names() -> Vec<&'static str> {
    TABLE.iter().map(|entry| entry.name).collect()
}

pub(crate) fn by_name(name: &str) -> Option<&'static Builtin> {
    TABLE.iter().find(|entry| entry.name == name)
}

/// Look up a metaschema by the `$schema` URI an instance declares. Matching
/// ignores the scheme and a trailing `#`, which vary across tooling.
pub(crate) fn by_dialect(uri: &str) -> Option<&'static Builtin> {
    let wanted = normalize_dialect(uri);
    TABLE
        .iter()
        .find(|entry| normalize_dialect(entry.dialect) == wanted)
}

impl Builtin {
    pub(crate) fn document(&self) -> Result<Value> {
        serde_json::from_str(self.raw).map_err(|err| {
            SchemaVetError::Internal(format!("embedded schema {} is corrupt: {err}", self.name))
        })
    }
}

fn normalize_dialect(uri: &str) -> &str {
    let uri = uri.trim_end_matches('#').trim_end_matches('/');
    uri.strip_prefix("https://")
        .or_else(|| uri.strip_prefix("http://"))
        .unwrap_or(uri)
}
