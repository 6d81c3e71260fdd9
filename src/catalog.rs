//! Pack catalog construction.
//!
//! The catalog comes from one of three places: the built-in size list, an
//! inline comma separated list, or a JSON file holding an array of integers.
//! Every source goes through `PackCatalog::from_raw`, so the result is always
//! deduplicated, sorted and free of non-positive sizes.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use crate::model::{CatalogError, PackCatalog};

/// Where the pack sizes come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogSource {
    BuiltIn,
    /// Comma separated list such as `"250, 500, 1000"`.
    Inline(String),
    /// JSON file containing an array such as `[250, 500, 1000]`.
    File(PathBuf),
}

impl fmt::Display for CatalogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogSource::BuiltIn => write!(f, "built-in list"),
            CatalogSource::Inline(raw) => write!(f, "inline list '{raw}'"),
            CatalogSource::File(path) => write!(f, "file {}", path.display()),
        }
    }
}

/// Loads and validates the catalog once, before the service starts.
pub fn load(source: &CatalogSource) -> Result<PackCatalog, CatalogError> {
    let catalog = match source {
        CatalogSource::BuiltIn => PackCatalog::default(),
        CatalogSource::Inline(raw) => PackCatalog::from_raw(parse_inline(raw)?)?,
        CatalogSource::File(path) => {
            let content = fs::read_to_string(path).map_err(|err| CatalogError::Source {
                path: path.clone(),
                reason: err.to_string(),
            })?;
            let sizes: Vec<i64> =
                serde_json::from_str(&content).map_err(|err| CatalogError::Source {
                    path: path.clone(),
                    reason: err.to_string(),
                })?;
            PackCatalog::from_raw(sizes)?
        }
    };

    tracing::info!(
        sizes = ?catalog.sizes(),
        "pack catalog loaded from {source}"
    );
    Ok(catalog)
}

fn parse_inline(raw: &str) -> Result<Vec<i64>, CatalogError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>().map_err(|err| CatalogError::Unparsable {
                input: raw.to_string(),
                reason: format!("'{part}': {err}"),
            })
        })
        .collect()
}
