//! Configuration loading: defaults, then an optional file, then `FEEDBENCH__*`

use anyhow::{Context, Result};
use config::{Config, Environment as EnvSource, File};
use std::env;

use feedbench_core::{Environment, MonitorConfig};

pub const ENVIRONMENT_VAR: &str = "FEEDBENCH_ENVIRONMENT";
pub const CONFIG_PATH_VAR: &str = "FEEDBENCH_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "feedbench.toml";

/// Load the configuration from the process environment
pub fn load() -> Result<MonitorConfig> {
    let environment = match env::var(ENVIRONMENT_VAR) {
        Ok(name) => name
            .parse::<Environment>()
            .with_context(|| format!("invalid {}", ENVIRONMENT_VAR))?,
        Err(_) => Environment::Local,
    };
    let path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    build(environment, &path, env_source())
}

fn env_source() -> EnvSource {
    EnvSource::with_prefix("FEEDBENCH")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("pairs")
}

/// Layer `path` (if it exists) and `overrides` on top of the defaults for
/// `environment`, then validate.
pub fn build(environment: Environment, path: &str, overrides: EnvSource) -> Result<MonitorConfig> {
    let defaults = MonitorConfig::for_environment(environment);

    let config: MonitorConfig = Config::builder()
        .add_source(Config::try_from(&defaults)?)
        .add_source(File::with_name(path).required(false))
        .add_source(overrides)
        .build()
        .context("failed to build configuration")?
        .try_deserialize()
        .context("failed to deserialize configuration")?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn overrides(vars: &[(&str, &str)]) -> EnvSource {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        env_source().source(Some(map))
    }

    #[test]
    fn test_defaults_for_environment() {
        let config = build(Environment::Prod, "does-not-exist.toml", overrides(&[])).unwrap();

        assert_eq!(config.environment, Environment::Prod);
        assert_eq!(config.primary.ws_url, Environment::Prod.primary_ws_url());
        assert_eq!(config.pairs.len(), 4);
        assert_eq!(config.primary.reconnect_delay_ms, 5_000);
        assert_eq!(config.secondary_a.poll_interval_ms, 1_000);
        assert!(config.store.history_capacity.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = build(
            Environment::Local,
            "does-not-exist.toml",
            overrides(&[
                ("FEEDBENCH__PAIRS", "BTC/USD,ETH/USD"),
                ("FEEDBENCH__PRIMARY__RECONNECT_DELAY_MS", "250"),
                ("FEEDBENCH__SECONDARY_B__ENABLED", "false"),
            ]),
        )
        .unwrap();

        assert_eq!(config.pairs, vec!["BTC/USD".to_string(), "ETH/USD".to_string()]);
        assert_eq!(config.primary.reconnect_delay_ms, 250);
        assert!(!config.secondary_b.enabled);
    }

    #[test]
    fn test_file_layer() {
        let path = env::temp_dir().join(format!("feedbench-settings-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "pairs = [\"SOL/USD\"]\n\n[store]\nhistory_capacity = 500\n\n[secondary_a]\npoll_interval_ms = 2500"
        )
        .unwrap();

        let config = build(Environment::Dev, path.to_str().unwrap(), overrides(&[])).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.pairs, vec!["SOL/USD".to_string()]);
        assert_eq!(config.store.history_capacity, std::num::NonZeroUsize::new(500));
        assert_eq!(config.secondary_a.poll_interval_ms, 2_500);
        assert_eq!(config.secondary_a.base_url, "https://hermes.pyth.network");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = build(
            Environment::Local,
            "does-not-exist.toml",
            overrides(&[("FEEDBENCH__PAIRS", "BTCUSD")]),
        );
        assert!(result.is_err());

        let result = build(
            Environment::Local,
            "does-not-exist.toml",
            overrides(&[("FEEDBENCH__STORE__HISTORY_CAPACITY", "0")]),
        );
        assert!(result.is_err());
    }
}
