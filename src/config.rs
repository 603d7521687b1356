// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::fs::File;
use std::io::prelude::*;
use std::path::Path;
use std::time::Duration;

use bitcoin::Network;

use crate::Error;

/// Default trade protocol timeout, in seconds
pub const DEFAULT_PROTOCOL_TIMEOUT_SECS: u64 = 120;

pub const DEFAULT_STORE_PATH: &str = "{data_dir}/trades";

/// Donation address receiving delayed payouts, used when no DAO parameter is configured
pub const DEFAULT_MAINNET_DONATION_ADDRESS: &str = "3EtUWqsGThPtjwUczw27YCo6EWvQdaPUyp";
pub const DEFAULT_TESTNET_DONATION_ADDRESS: &str = "2N4mVTpUZAnhm9phnxB7VrHB4aBhnWrcUrV";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Trade protocol configuration
    pub protocol: Option<ProtocolConfig>,
    /// DAO parameters used by the protocol
    pub dao: Option<DaoConfig>,
    /// Trade store configuration
    pub store: Option<StoreConfig>,
}

impl Config {
    pub fn protocol(&self) -> ProtocolConfig {
        self.protocol.clone().unwrap_or_default()
    }

    /// Returns the DAO configuration, falling back on the default donation address of the
    /// configured network
    pub fn dao(&self) -> DaoConfig {
        match &self.dao {
            Some(dao) => dao.clone(),
            None => DaoConfig::for_network(self.protocol().network),
        }
    }

    pub fn store_path(&self) -> String {
        self.store
            .as_ref()
            .map(|store| store.path.clone())
            .unwrap_or_else(|| DEFAULT_STORE_PATH.to_string())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            protocol: Some(ProtocolConfig::default()),
            dao: Some(DaoConfig::for_network(Network::Testnet)),
            store: Some(StoreConfig::default()),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Seconds a task pipeline may wait on a single step before it is failed
    pub timeout_secs: u64,
    /// Bitcoin network the trades are settled on
    pub network: Network,
}

impl ProtocolConfig {
    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_secs))
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig {
            timeout_secs: DEFAULT_PROTOCOL_TIMEOUT_SECS,
            network: Network::Testnet,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DaoConfig {
    /// Current value of the `RECIPIENT_BTC_ADDRESS` parameter
    pub donation_address: String,
    /// Donation addresses voted in the past, still valid for delayed payouts signed earlier
    #[serde(default)]
    pub historical_donation_addresses: Vec<String>,
}

impl DaoConfig {
    pub fn for_network(network: Network) -> Self {
        let donation_address = match network {
            Network::Bitcoin => DEFAULT_MAINNET_DONATION_ADDRESS,
            _ => DEFAULT_TESTNET_DONATION_ADDRESS,
        };
        DaoConfig {
            donation_address: donation_address.to_string(),
            historical_donation_addresses: vec![],
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory of the LMDB trade store
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            path: DEFAULT_STORE_PATH.to_string(),
        }
    }
}

pub fn parse_config(path: &str) -> Result<Config, Error> {
    if Path::new(path).exists() {
        let config_file = path;
        info!("Loading config file at: {}", &config_file);
        let mut settings = config::Config::default();
        settings.merge(config::File::with_name(config_file).required(true))?;
        settings.try_into::<Config>().map_err(Into::into)
    } else {
        info!("No configuration file found, generating default config");
        let config = Config::default();
        let mut file = File::create(path)?;
        file.write_all(toml::to_vec(&config)?.as_ref())?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrips_through_toml() {
        let config = Config::default();
        let encoded = toml::to_string(&config).unwrap();
        assert!(encoded.contains("timeout_secs = 120"));
        let decoded: Config = toml::from_str(&encoded).unwrap();
        assert_eq!(config, decoded);
    }

    #[test]
    fn missing_sections_fall_back_on_defaults() {
        let config: Config =
            toml::from_str("[protocol]\ntimeout_secs = 0\nnetwork = \"bitcoin\"\n").unwrap();
        assert_eq!(config.protocol().timeout(), None);
        assert_eq!(config.dao().donation_address, DEFAULT_MAINNET_DONATION_ADDRESS);
        assert_eq!(config.store_path(), DEFAULT_STORE_PATH);
    }

    #[test]
    fn parse_config_writes_default_file() {
        let dir = std::env::temp_dir().join(format!("bisq-trade-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bisq-trade.toml");
        let path = path.to_string_lossy().to_string();
        let generated = parse_config(&path).unwrap();
        assert!(Path::new(&path).exists());
        let reloaded = parse_config(&path).unwrap();
        assert_eq!(generated, reloaded);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
