use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;

use crate::catalog::CatalogSource;
use crate::optimizer::{SolverConfig, SolverMode};

/// Looks up a configuration value by variable name.
type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub catalog: CatalogConfig,
    pub optimizer: OptimizerConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(&env_string)
    }

    fn from_lookup(lookup: Lookup<'_>) -> Self {
        Self {
            api: ApiConfig::from_lookup(lookup),
            catalog: CatalogConfig::from_lookup(lookup),
            optimizer: OptimizerConfig::from_lookup(lookup),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "PACK_SHARK_API_HOST";
    const PORT_VAR: &'static str = "PACK_SHARK_API_PORT";

    fn from_lookup(lookup: Lookup<'_>) -> Self {
        let host_value = lookup(Self::HOST_VAR).unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, display_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                tracing::warn!(
                    "could not parse {} ('{}'): {}; using {}",
                    Self::HOST_VAR,
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (
                    IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = match lookup(Self::PORT_VAR) {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    tracing::warn!(
                        "{} must not be 0; using {}",
                        Self::PORT_VAR,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    tracing::warn!(
                        "could not parse {} ('{}'): {}; using {}",
                        Self::PORT_VAR,
                        raw,
                        err,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }
}

/// Where the pack catalog is loaded from.
#[derive(Clone, Debug)]
pub struct CatalogConfig {
    source: CatalogSource,
}

impl CatalogConfig {
    const SIZES_VAR: &'static str = "PACK_SHARK_PACK_SIZES";
    const SIZES_FILE_VAR: &'static str = "PACK_SHARK_PACK_SIZES_FILE";

    fn from_lookup(lookup: Lookup<'_>) -> Self {
        let file = lookup(Self::SIZES_FILE_VAR);
        let inline = lookup(Self::SIZES_VAR);

        let source = match (file, inline) {
            (Some(path), inline) => {
                if inline.is_some() {
                    tracing::warn!(
                        "both {} and {} are set; using the file",
                        Self::SIZES_FILE_VAR,
                        Self::SIZES_VAR
                    );
                }
                CatalogSource::File(PathBuf::from(path))
            }
            (None, Some(raw)) => CatalogSource::Inline(raw),
            (None, None) => CatalogSource::BuiltIn,
        };

        Self { source }
    }

    pub fn source(&self) -> &CatalogSource {
        &self.source
    }
}

/// Configuration for the solver.
#[derive(Clone, Debug)]
pub struct OptimizerConfig {
    solver: SolverConfig,
}

impl OptimizerConfig {
    const MODE_VAR: &'static str = "PACK_SHARK_SOLVER";
    const EXACT_MAX_STATES_VAR: &'static str = "PACK_SHARK_EXACT_MAX_STATES";
    const ALLOW_MODE_OVERRIDE_VAR: &'static str = "PACK_SHARK_ALLOW_MODE_OVERRIDE";

    fn from_lookup(lookup: Lookup<'_>) -> Self {
        let mode = match lookup(Self::MODE_VAR) {
            Some(raw) => match raw.parse::<SolverMode>() {
                Ok(mode) => {
                    if mode != SolverConfig::DEFAULT_MODE {
                        tracing::info!("default solver set to {mode} ({} = {raw})", Self::MODE_VAR);
                    }
                    mode
                }
                Err(err) => {
                    tracing::warn!(
                        "{}: {}; using {}",
                        Self::MODE_VAR,
                        err,
                        SolverConfig::DEFAULT_MODE
                    );
                    SolverConfig::DEFAULT_MODE
                }
            },
            None => SolverConfig::DEFAULT_MODE,
        };

        let exact_max_states = load_u64_with_warning(
            lookup,
            Self::EXACT_MAX_STATES_VAR,
            SolverConfig::DEFAULT_EXACT_MAX_STATES,
            |value| value > 0,
            "must be greater than 0",
        );

        let allow_mode_override = lookup(Self::ALLOW_MODE_OVERRIDE_VAR)
            .and_then(|raw| parse_bool(&raw, Self::ALLOW_MODE_OVERRIDE_VAR))
            .unwrap_or(SolverConfig::DEFAULT_ALLOW_MODE_OVERRIDE);

        let solver = SolverConfig::builder()
            .mode(mode)
            .exact_max_states(exact_max_states)
            .allow_mode_override(allow_mode_override)
            .build();

        Self { solver }
    }

    /// Returns the configured SolverConfig.
    pub fn solver_config(&self) -> SolverConfig {
        self.solver
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            tracing::warn!("access to {} failed: {}; using default value", name, err);
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            tracing::warn!(
                "could not interpret {} ('{}') as boolean value; using default value",
                var_name,
                other
            );
            None
        }
    }
}

fn load_u64_with_warning(
    lookup: Lookup<'_>,
    var_name: &str,
    default: u64,
    validator: impl Fn(u64) -> bool,
    invalid_hint: &str,
) -> u64 {
    match lookup(var_name) {
        Some(raw) => match raw.parse::<u64>() {
            Ok(value) if validator(value) => value,
            Ok(_) => {
                tracing::warn!(
                    "{} contains invalid value '{}': {}; using {}",
                    var_name,
                    raw,
                    invalid_hint,
                    default
                );
                default
            }
            Err(err) => {
                tracing::warn!(
                    "could not parse {} ('{}') as number: {}; using {}",
                    var_name,
                    raw,
                    err,
                    default
                );
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(&move |name: &str| vars.get(name).cloned())
    }

    #[test]
    fn test_parse_bool_true_values() {
        assert_eq!(parse_bool("1", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("true", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("yes", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("y", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("on", "TEST_VAR"), Some(true));

        // Test case insensitivity
        assert_eq!(parse_bool("TRUE", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("ON", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("  1  ", "TEST_VAR"), Some(true));
    }

    #[test]
    fn test_parse_bool_false_values() {
        assert_eq!(parse_bool("0", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("false", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("no", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("n", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("OFF", "TEST_VAR"), Some(false));
    }

    #[test]
    fn test_parse_bool_invalid_values() {
        assert_eq!(parse_bool("invalid", "TEST_VAR"), None);
        assert_eq!(parse_bool("2", "TEST_VAR"), None);
        assert_eq!(parse_bool("", "TEST_VAR"), None);
    }

    #[test]
    fn defaults_without_environment() {
        let config = config_from(&[]);
        assert_eq!(config.api.port(), 8080);
        assert_eq!(config.api.display_host(), "0.0.0.0");
        assert!(config.api.binds_to_all_interfaces());
        assert_eq!(config.catalog.source(), &CatalogSource::BuiltIn);

        let solver = config.optimizer.solver_config();
        assert_eq!(solver.mode, SolverMode::Greedy);
        assert_eq!(solver.exact_max_states, SolverConfig::DEFAULT_EXACT_MAX_STATES);
        assert!(solver.allow_mode_override);
    }

    #[test]
    fn invalid_api_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("PACK_SHARK_API_HOST", "not-an-ip"),
            ("PACK_SHARK_API_PORT", "0"),
        ]);
        assert_eq!(config.api.display_host(), "0.0.0.0");
        assert_eq!(config.api.port(), 8080);

        let config = config_from(&[
            ("PACK_SHARK_API_HOST", "127.0.0.1"),
            ("PACK_SHARK_API_PORT", "3000"),
        ]);
        assert_eq!(config.api.socket_addr().to_string(), "127.0.0.1:3000");
        assert!(!config.api.binds_to_all_interfaces());
    }

    #[test]
    fn catalog_file_wins_over_inline_list() {
        let config = config_from(&[
            ("PACK_SHARK_PACK_SIZES", "1,2,3"),
            ("PACK_SHARK_PACK_SIZES_FILE", "/etc/packs.json"),
        ]);
        assert_eq!(
            config.catalog.source(),
            &CatalogSource::File(PathBuf::from("/etc/packs.json"))
        );

        let config = config_from(&[("PACK_SHARK_PACK_SIZES", "1,2,3")]);
        assert_eq!(
            config.catalog.source(),
            &CatalogSource::Inline("1,2,3".to_string())
        );
    }

    #[test]
    fn solver_settings_are_read_and_validated() {
        let config = config_from(&[
            ("PACK_SHARK_SOLVER", "Exact"),
            ("PACK_SHARK_EXACT_MAX_STATES", "1000"),
            ("PACK_SHARK_ALLOW_MODE_OVERRIDE", "off"),
        ]);
        let solver = config.optimizer.solver_config();
        assert_eq!(solver.mode, SolverMode::Exact);
        assert_eq!(solver.exact_max_states, 1000);
        assert!(!solver.allow_mode_override);

        let config = config_from(&[
            ("PACK_SHARK_SOLVER", "fastest"),
            ("PACK_SHARK_EXACT_MAX_STATES", "0"),
        ]);
        let solver = config.optimizer.solver_config();
        assert_eq!(solver.mode, SolverMode::Greedy);
        assert_eq!(solver.exact_max_states, SolverConfig::DEFAULT_EXACT_MAX_STATES);
    }
}
