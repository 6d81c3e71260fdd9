//! Data models for pack decomposition.
//!
//! This module defines the fundamental data structures of the service:
//! - `PackCatalog`: the immutable, validated set of shippable pack sizes
//! - `PackPlan`: how many packs of each size to ship for one order
//! - `CatalogError` / `QuantityError`: the two ways input can be rejected

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Rejection of a pack-size catalog.
///
/// Raised while the catalog is prepared at startup; a running service never
/// produces it per request.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("pack catalog must contain at least one pack size")]
    Empty,
    #[error("pack sizes must be positive, got: {0}")]
    NonPositive(i64),
    #[error("pack size {0} is listed more than once")]
    Duplicate(u64),
    #[error("could not read pack sizes from {path}: {reason}")]
    Source { path: PathBuf, reason: String },
    #[error("could not parse pack size list '{input}': {reason}")]
    Unparsable { input: String, reason: String },
    #[error(
        "pack catalog needs {required} states for the exact solver, limit is {limit}; use the greedy solver or raise the limit"
    )]
    ExactSolverTooWide { required: u64, limit: u64 },
}

/// Rejection of a requested quantity before any decomposition happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("quantity is missing")]
    Missing,
    #[error("quantity must not be negative, got: {0}")]
    Negative(String),
    #[error("quantity is not a valid whole number: {0}")]
    NotANumber(String),
}

/// Parses a textual order quantity into a non-negative integer.
///
/// Leading and trailing whitespace is ignored, a single leading `+` is accepted.
///
/// # Examples
/// ```ignore
/// assert_eq!(parse_quantity(" 251 "), Ok(251));
/// assert!(parse_quantity("-1").is_err());
/// ```
pub fn parse_quantity(raw: &str) -> Result<u64, QuantityError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(QuantityError::Missing);
    }
    if trimmed.starts_with('-') {
        return Err(QuantityError::Negative(trimmed.to_string()));
    }

    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(QuantityError::NotANumber(trimmed.to_string()));
    }

    digits
        .parse::<u64>()
        .map_err(|_| QuantityError::NotANumber(trimmed.to_string()))
}

/// The set of pack sizes an order can be shipped in.
///
/// Sizes are distinct, strictly positive and kept in ascending order.
/// Built once at startup and shared read-only afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackCatalog {
    sizes: Vec<u64>,
}

impl PackCatalog {
    /// Pack sizes used when no catalog is configured.
    pub const DEFAULT_SIZES: [u64; 5] = [250, 500, 1000, 2000, 5000];

    /// Creates a catalog from an already prepared list.
    ///
    /// The list may be unordered but must not contain zero or duplicates.
    ///
    /// # Returns
    /// `Ok(PackCatalog)` for valid lists, otherwise `Err(CatalogError)`
    pub fn new(mut sizes: Vec<u64>) -> Result<Self, CatalogError> {
        if sizes.is_empty() {
            return Err(CatalogError::Empty);
        }
        sizes.sort_unstable();
        if sizes[0] == 0 {
            return Err(CatalogError::NonPositive(0));
        }
        if let Some(pair) = sizes.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(CatalogError::Duplicate(pair[0]));
        }
        Ok(Self { sizes })
    }

    /// Prepares a catalog from raw configured values.
    ///
    /// Rejects non-positive values, then deduplicates and sorts before
    /// handing over to [`PackCatalog::new`].
    pub fn from_raw(raw: impl IntoIterator<Item = i64>) -> Result<Self, CatalogError> {
        let mut sizes = raw
            .into_iter()
            .map(|value| {
                u64::try_from(value)
                    .ok()
                    .filter(|size| *size > 0)
                    .ok_or(CatalogError::NonPositive(value))
            })
            .collect::<Result<Vec<_>, _>>()?;
        sizes.sort_unstable();
        sizes.dedup();
        Self::new(sizes)
    }

    /// All pack sizes, ascending.
    pub fn sizes(&self) -> &[u64] {
        &self.sizes
    }

    /// The smallest pack size.
    pub fn smallest(&self) -> u64 {
        self.sizes[0]
    }

    /// The largest pack size.
    pub fn largest(&self) -> u64 {
        self.sizes[self.sizes.len() - 1]
    }

}

impl Default for PackCatalog {
    fn default() -> Self {
        Self {
            sizes: Self::DEFAULT_SIZES.to_vec(),
        }
    }
}

/// Number of packs of each size to ship for a single order.
///
/// Serialized as a JSON object keyed by pack size, e.g. `{"250": 1, "5000": 2}`.
/// Sizes with zero usage are never present.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct PackPlan(BTreeMap<u64, u64>);

impl PackPlan {
    /// Creates an empty plan (nothing shipped).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `count` packs of `size`. A zero count leaves the plan untouched.
    pub fn add(&mut self, size: u64, count: u64) {
        if count == 0 {
            return;
        }
        *self.0.entry(size).or_insert(0) += count;
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of units shipped.
    pub fn total_units(&self) -> u128 {
        self.0
            .iter()
            .map(|(size, count)| u128::from(*size) * u128::from(*count))
            .sum()
    }

    /// Total number of packs shipped.
    pub fn pack_count(&self) -> u128 {
        self.0.values().map(|count| u128::from(*count)).sum()
    }

    /// Entries from the largest pack size to the smallest.
    pub fn largest_first(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.0.iter().rev().map(|(size, count)| (*size, *count))
    }
}

impl<const N: usize> From<[(u64, u64); N]> for PackPlan {
    fn from(entries: [(u64, u64); N]) -> Self {
        let mut plan = Self::new();
        for (size, count) in entries {
            plan.add(size, count);
        }
        plan
    }
}

#[cfg(test)]
impl PackCatalog {
    pub fn contains(&self, size: u64) -> bool {
        self.sizes.binary_search(&size).is_ok()
    }
}

#[cfg(test)]
impl PackPlan {
    pub fn count_of(&self, size: u64) -> u64 {
        self.0.get(&size).copied().unwrap_or(0)
    }
}
