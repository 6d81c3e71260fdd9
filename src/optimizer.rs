//! Decomposition logic: which packs to ship for an order.
//!
//! Two solvers share the same contract `(catalog, requested) -> PackPlan`:
//! - `decompose` (default): round up to the smallest pack size, then take as
//!   many of each pack as fit, largest first
//! - `ExactSolver`: minimum shipped units first, then minimum pack count,
//!   computed with a bounded dynamic program over reachable totals
//!
//! Both are pure and re-entrant; the only shared state is the read-only catalog.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::{CatalogError, PackCatalog, PackPlan};

/// Which solver turns a requested quantity into a plan.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SolverMode {
    /// Largest-first greedy fill after rounding up to the smallest pack.
    #[default]
    Greedy,
    /// Globally minimal plan (units, then pack count).
    Exact,
}

impl SolverMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolverMode::Greedy => "greedy",
            SolverMode::Exact => "exact",
        }
    }
}

impl fmt::Display for SolverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for solver names other than `greedy` or `exact`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown solver mode '{0}', expected 'greedy' or 'exact'")]
pub struct UnknownSolverMode(pub String);

impl FromStr for SolverMode {
    type Err = UnknownSolverMode;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "greedy" => Ok(SolverMode::Greedy),
            "exact" => Ok(SolverMode::Exact),
            other => Err(UnknownSolverMode(other.to_string())),
        }
    }
}

/// Configuration for the decomposition service.
#[derive(Copy, Clone, Debug)]
pub struct SolverConfig {
    /// Solver used when a request does not ask for one
    pub mode: SolverMode,
    /// Upper bound for the exact solver's table size
    pub exact_max_states: u64,
    /// Whether a single request may pick a different solver
    pub allow_mode_override: bool,
}

impl SolverConfig {
    pub const DEFAULT_MODE: SolverMode = SolverMode::Greedy;
    pub const DEFAULT_EXACT_MAX_STATES: u64 = 5_000_000;
    pub const DEFAULT_ALLOW_MODE_OVERRIDE: bool = true;

    /// Creates a builder for custom configuration.
    pub fn builder() -> SolverConfigBuilder {
        SolverConfigBuilder::default()
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            mode: Self::DEFAULT_MODE,
            exact_max_states: Self::DEFAULT_EXACT_MAX_STATES,
            allow_mode_override: Self::DEFAULT_ALLOW_MODE_OVERRIDE,
        }
    }
}

/// Builder for `SolverConfig`.
#[derive(Clone, Debug, Default)]
pub struct SolverConfigBuilder {
    config: SolverConfig,
}

impl SolverConfigBuilder {
    /// Sets the default solver.
    pub fn mode(mut self, mode: SolverMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Sets the exact solver's state limit.
    pub fn exact_max_states(mut self, limit: u64) -> Self {
        self.config.exact_max_states = limit;
        self
    }

    /// Allows or forbids per-request solver selection.
    pub fn allow_mode_override(mut self, allow: bool) -> Self {
        self.config.allow_mode_override = allow;
        self
    }

    pub fn build(self) -> SolverConfig {
        self.config
    }
}

/// Greedy decomposition of `requested` units into packs.
///
/// 1. Round `requested` up to the next multiple of the smallest pack size.
/// 2. From the largest pack size to the smallest, take as many packs as fit
///    into what is left.
///
/// When every size is a multiple of the smallest one nothing is left after
/// step 2. For other catalogs a remainder below the smallest size can stay
/// behind; one more smallest pack covers it so the plan never ships less
/// than requested.
///
/// Not globally optimal for arbitrary catalogs: `{1, 3, 4}` and 6 gives
/// `4 + 1 + 1` where `3 + 3` would need one pack less.
pub fn decompose(catalog: &PackCatalog, requested: u64) -> PackPlan {
    let smallest = u128::from(catalog.smallest());
    // 128-bit so rounding up near u64::MAX cannot overflow.
    let mut remaining = u128::from(requested).div_ceil(smallest) * smallest;

    let mut plan = PackPlan::new();
    for &size in catalog.sizes().iter().rev() {
        let wide = u128::from(size);
        // quotient fits u64: remaining < requested + smallest and size >= smallest
        plan.add(size, (remaining / wide) as u64);
        remaining %= wide;
    }

    if remaining > 0 {
        plan.add(catalog.smallest(), 1);
    }
    plan
}

/// Minimal decomposition: fewest shipped units, then fewest packs.
///
/// All totals are multiples of `g = gcd(sizes)`, so the table works in units
/// of `g`. An optimal plan contains fewer than `L/g` packs smaller than the
/// largest size `L` (any `L/g` of them contain a subset summing to a multiple
/// of `L`, which fewer largest packs replace). Requests above `(L/g) * L`
/// units are therefore reduced by whole largest packs first and the table
/// only spans that window.
#[derive(Clone, Debug)]
pub struct ExactSolver {
    sizes: Vec<u64>,
    units: Vec<usize>,
    unit: u64,
    bulk_window: u128,
    /// Fewest packs reaching each total (in units), `u32::MAX` if unreachable.
    packs: Vec<u32>,
    /// Index of the last pack added on the best path to each total.
    last: Vec<u32>,
}

impl ExactSolver {
    /// Prepares the solver, rejecting catalogs whose table would exceed `max_states`.
    ///
    /// The table is built here once; `solve` only reads it.
    pub fn new(catalog: &PackCatalog, max_states: u64) -> Result<Self, CatalogError> {
        let required = Self::required_states(catalog);
        let limit = max_states.min(u64::from(u32::MAX)).min(usize::MAX as u64);
        if required > limit {
            return Err(CatalogError::ExactSolverTooWide { required, limit });
        }

        let unit = catalog.sizes().iter().copied().fold(0, gcd);
        let largest = u128::from(catalog.largest());
        // bounded by required <= u32::MAX
        let units: Vec<usize> = catalog
            .sizes()
            .iter()
            .map(|size| (size / unit) as usize)
            .collect();
        let (packs, last) = build_table(&units, required as usize);

        Ok(Self {
            sizes: catalog.sizes().to_vec(),
            units,
            unit,
            bulk_window: largest / u128::from(unit) * largest,
            packs,
            last,
        })
    }

    /// Table size needed for `catalog`, in entries.
    pub fn required_states(catalog: &PackCatalog) -> u64 {
        let unit = catalog.sizes().iter().copied().fold(0, gcd);
        let largest_units = u128::from(catalog.largest() / unit);
        let smallest_units = u128::from(catalog.smallest() / unit);
        let states = largest_units * largest_units + largest_units + smallest_units + 1;
        u64::try_from(states).unwrap_or(u64::MAX)
    }

    pub fn solve(&self, requested: u64) -> PackPlan {
        let mut plan = PackPlan::new();
        if requested == 0 {
            return plan;
        }

        let largest = u128::from(self.sizes[self.sizes.len() - 1]);
        let requested = u128::from(requested);
        let bulk = if requested > self.bulk_window {
            (requested - self.bulk_window) / largest
        } else {
            0
        };
        let rest = requested - bulk * largest;

        let unit = u128::from(self.unit);
        let smallest = u128::from(self.sizes[0]);
        let target = rest.div_ceil(unit) as usize;
        // Rounding up to the smallest pack is always reachable, so the
        // optimum lies within [target, limit]; limit < required_states.
        let limit = (rest.div_ceil(smallest) * smallest / unit) as usize;

        let mut total = (target..=limit)
            .find(|&total| self.packs[total] != u32::MAX)
            .unwrap_or(limit);
        while total > 0 {
            let idx = self.last[total] as usize;
            plan.add(self.sizes[idx], 1);
            total -= self.units[idx];
        }

        plan.add(self.sizes[self.sizes.len() - 1], bulk as u64);
        plan
    }
}

/// Fewest-packs table over totals `0..len`, sizes given in units.
fn build_table(units: &[usize], len: usize) -> (Vec<u32>, Vec<u32>) {
    let mut packs = vec![u32::MAX; len];
    let mut last = vec![0u32; len];
    packs[0] = 0;
    for total in 1..len {
        for (idx, &size) in units.iter().enumerate().rev() {
            if size > total || packs[total - size] == u32::MAX {
                continue;
            }
            let candidate = packs[total - size] + 1;
            // strict: on ties the larger pack, visited first, wins
            if candidate < packs[total] {
                packs[total] = candidate;
                last[total] = idx as u32;
            }
        }
    }
    (packs, last)
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}

/// Read-only decomposition service shared by all requests.
#[derive(Clone, Debug)]
pub struct PackOptimizer {
    catalog: PackCatalog,
    config: SolverConfig,
    exact: Option<ExactSolver>,
}

impl PackOptimizer {
    /// Builds the service for `catalog`.
    ///
    /// The exact solver is prepared when it is the default or may be chosen
    /// per request. If it is the default and the catalog is too wide, this
    /// fails; if it is only optional, exact requests are refused later.
    pub fn new(catalog: PackCatalog, config: SolverConfig) -> Result<Self, CatalogError> {
        let exact = match (config.mode, config.allow_mode_override) {
            (SolverMode::Exact, _) => Some(ExactSolver::new(&catalog, config.exact_max_states)?),
            (SolverMode::Greedy, true) => {
                match ExactSolver::new(&catalog, config.exact_max_states) {
                    Ok(solver) => Some(solver),
                    Err(err) => {
                        tracing::warn!("exact solver disabled: {err}");
                        None
                    }
                }
            }
            (SolverMode::Greedy, false) => None,
        };

        Ok(Self {
            catalog,
            config,
            exact,
        })
    }

    pub fn catalog(&self) -> &PackCatalog {
        &self.catalog
    }

    pub fn default_mode(&self) -> SolverMode {
        self.config.mode
    }

    pub fn allows_mode_override(&self) -> bool {
        self.config.allow_mode_override
    }

    /// Whether requests can be served with `mode`.
    pub fn supports(&self, mode: SolverMode) -> bool {
        match mode {
            SolverMode::Greedy => true,
            SolverMode::Exact => self.exact.is_some(),
        }
    }

    /// Plan with the configured default solver.
    pub fn plan(&self, requested: u64) -> PackPlan {
        self.plan_with_mode(requested, self.config.mode)
    }

    /// Plan with an explicit solver. Exact falls back to greedy if unsupported.
    pub fn plan_with_mode(&self, requested: u64, mode: SolverMode) -> PackPlan {
        match (mode, &self.exact) {
            (SolverMode::Exact, Some(solver)) => solver.solve(requested),
            (SolverMode::Exact, None) => {
                tracing::warn!(requested, "exact solver unavailable, using greedy");
                decompose(&self.catalog, requested)
            }
            (SolverMode::Greedy, _) => decompose(&self.catalog, requested),
        }
    }
}
