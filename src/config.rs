//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::vault::registry::VaultRegistry;
use crate::vault::types::{Protocol, VaultServiceConfig};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Active network; one service per protocol is built for it
    #[serde(default = "default_network")]
    pub network: String,

    #[serde(default)]
    pub manager: ManagerConfig,

    #[serde(default)]
    pub services: Vec<VaultServiceConfig>,

    #[serde(default)]
    pub vaults: Vec<VaultEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManagerConfig {
    /// Budget for each protocol call of a balance/history fan-out
    #[serde(default = "default_fan_out_timeout_ms")]
    pub fan_out_timeout_ms: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            fan_out_timeout_ms: default_fan_out_timeout_ms(),
        }
    }
}

impl ManagerConfig {
    pub fn fan_out_timeout(&self) -> Duration {
        Duration::from_millis(self.fan_out_timeout_ms)
    }
}

/// One `[[vaults]]` table as written in the config file
///
/// Protocol sub-tables are all optional here; the registry keeps the one
/// matching `protocol` and ignores the rest.
#[derive(Debug, Clone, Deserialize)]
pub struct VaultEntry {
    pub id: String,
    pub protocol: Protocol,
    pub asset_address: String,
    pub market_address: String,
    pub chain_id: u64,
    pub network: String,
    pub decimals: u8,
    pub symbol: String,
    #[serde(default)]
    pub aave: Option<AaveEntry>,
    #[serde(default)]
    pub compound: Option<CompoundEntry>,
    #[serde(default)]
    pub morpho: Option<MorphoEntry>,
    #[serde(default)]
    pub pendle: Option<PendleEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AaveEntry {
    pub a_token: String,
    #[serde(default)]
    pub data_provider: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompoundEntry {
    #[serde(default)]
    pub base_token: Option<String>,
    #[serde(default)]
    pub rewards: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MorphoEntry {
    #[serde(default)]
    pub market_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PendleEntry {
    pub router: String,
    pub pt: String,
    pub yt: String,
    #[serde(default)]
    pub sy: Option<String>,
}

fn default_network() -> String {
    "base".to_string()
}

fn default_fan_out_timeout_ms() -> u64 {
    5_000
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = Self::builder()?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix VAULTS__)
            .add_source(
                config::Environment::with_prefix("VAULTS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        Self::finish(settings)
    }

    /// Parse configuration from TOML text, without environment overrides
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings = Self::builder()?
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .context("Failed to build configuration")?;

        Self::finish(settings)
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(config::Config::builder()
            .set_default("network", default_network())?
            .set_default("manager.fan_out_timeout_ms", default_fan_out_timeout_ms() as i64)?)
    }

    fn finish(settings: config::Config) -> Result<Self> {
        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.network.trim().is_empty() {
            anyhow::bail!("network must not be empty");
        }

        if self.manager.fan_out_timeout_ms == 0 {
            anyhow::bail!("manager.fan_out_timeout_ms must be positive");
        }

        for service in &self.services {
            if service.slippage_bps > 10_000 {
                anyhow::bail!(
                    "{} slippage_bps cannot exceed 10000 (100%), got {}",
                    service.protocol,
                    service.slippage_bps
                );
            }
        }

        // Structural checks (ids, addresses, decimals, uniqueness)
        VaultRegistry::from_config(self).context("Invalid vault definitions")?;

        if !self.services.iter().any(|s| s.network == self.network) {
            tracing::warn!(
                network = %self.network,
                "No protocol services configured for the active network"
            );
        }

        Ok(())
    }

    /// Summary for display
    pub fn display(&self) -> String {
        let mut out = format!(
            r#"Configuration:
  Network: {}
  Manager:
    fan_out_timeout: {}ms
  Services:"#,
            self.network, self.manager.fan_out_timeout_ms
        );

        for service in &self.services {
            out.push_str(&format!(
                "\n    {} on {} (chain {}, slippage {}bps)",
                service.protocol, service.network, service.chain_id, service.slippage_bps
            ));
        }

        out.push_str("\n  Vaults:");
        for vault in &self.vaults {
            out.push_str(&format!(
                "\n    {} [{}] {} on {}",
                vault.id, vault.protocol, vault.symbol, vault.network
            ));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
network = "base"

[manager]
fan_out_timeout_ms = 2500

[[services]]
protocol = "aave"
network = "base"
chain_id = 8453

[[services]]
protocol = "pendle"
network = "base"
chain_id = 8453
slippage_bps = 30

[[vaults]]
id = "aave-usdc"
protocol = "aave"
asset_address = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"
market_address = "0xA238Dd80C259a72e81d7e4664a9801593F98d1c5"
chain_id = 8453
network = "base"
decimals = 6
symbol = "USDC"

[vaults.aave]
a_token = "0x4e65fE4DbA92790696d040ac24Aa414708F5c0AB"

[[vaults]]
id = "pendle-usde"
protocol = "pendle"
asset_address = "0x5d3a1Ff2b6BAb83b63cd9AD0787074081a52ef34"
market_address = "0x0000000000000000000000000000000000000043"
chain_id = 8453
network = "base"
decimals = 18
symbol = "USDe"

[vaults.pendle]
router = "0x888888888889758F76e7103c6CbF23ABbF58F946"
pt = "0x0000000000000000000000000000000000000041"
yt = "0x0000000000000000000000000000000000000042"
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.network, "base");
        assert_eq!(config.manager.fan_out_timeout(), Duration::from_millis(2500));
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services[0].slippage_bps, 50);
        assert_eq!(config.services[1].slippage_bps, 30);
        assert_eq!(config.vaults[1].pendle.as_ref().unwrap().pt, "0x0000000000000000000000000000000000000041");
    }

    #[test]
    fn test_defaults_apply() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.network, "base");
        assert_eq!(config.manager.fan_out_timeout_ms, 5_000);
        assert!(config.vaults.is_empty());
    }

    #[test]
    fn test_rejects_excess_slippage() {
        let toml = r#"
[[services]]
protocol = "pendle"
network = "base"
chain_id = 8453
slippage_bps = 20000
"#;
        assert!(Config::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_rejects_bad_vault_id() {
        let toml = SAMPLE.replace(r#"id = "aave-usdc""#, r#"id = "Aave USDC""#);
        let err = Config::from_toml_str(&toml).unwrap_err();
        assert!(format!("{:#}", err).contains("Aave USDC"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.vaults.len(), 2);
        assert!(config.display().contains("aave-usdc [aave] USDC on base"));
    }
}
