// 7.0 config.rs: construction-time settings. fixed once the registry is built.
// 7.1 Network presets carry the deployment addresses for each chain.

use serde::{Deserialize, Serialize};

use crate::logging::LoggingConfig;
use crate::token::TransferPolicy;
use crate::types::{Address, Bps};

pub const MAX_MARGIN_BPS: u32 = 10_000;

// Limit order protocol on kovan, the one the provider was deployed against
pub const KOVAN_LIMIT_ORDER_PROTOCOL: &str = "0x94Bc2a1C732BcAd7343B25af48385Fe76E08734f";
pub const KOVAN_DAI: &str = "0x4F96Fe3b7A6Cf9725f59d353F723c1bDb64CA6Aa";
pub const KOVAN_WETH: &str = "0xd0A1E359811322d97991E03f863a0C30C2cF029C";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub network: Network,
    pub chain_id: u64,
    // only this address may register fills
    pub protocol: Address,
    // reference asset. zero address = none
    pub base_asset: Address,
    // may withdraw free vault liquidity
    pub admin: Address,
    // assets positions may be opened in (base asset is implicitly included)
    pub supported_assets: Vec<Address>,
    // margin code n means n * step bps
    pub margin_tier_step_bps: u32,
    pub max_margin_bps: u32,
    pub transfer_policy: TransferPolicy,
    // events retained in memory
    pub max_events: usize,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::local()
    }
}

impl ProviderConfig {
    // Local dev chain: deterministic low addresses, two mock stablecoins
    pub fn local() -> Self {
        Self {
            network: Network::Local,
            chain_id: 31337,
            protocol: Address::from_low_u64(0x1001),
            base_asset: Address::ZERO,
            admin: Address::from_low_u64(0xad),
            supported_assets: vec![local_dai(), local_usdc()],
            margin_tier_step_bps: 500, // code 2 = 10%
            max_margin_bps: MAX_MARGIN_BPS,
            transfer_policy: TransferPolicy::Unrestricted,
            max_events: 100_000,
            logging: LoggingConfig::default(),
        }
    }

    pub fn kovan(admin: Address) -> Result<Self, ConfigError> {
        Ok(Self {
            network: Network::Kovan,
            chain_id: 42,
            protocol: parse_address("protocol", KOVAN_LIMIT_ORDER_PROTOCOL)?,
            base_asset: Address::ZERO,
            admin,
            supported_assets: vec![
                parse_address("supported_assets", KOVAN_DAI)?,
                parse_address("supported_assets", KOVAN_WETH)?,
            ],
            ..Self::local()
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    pub fn max_margin(&self) -> Bps {
        Bps::new(self.max_margin_bps)
    }

    pub fn margin_tier_step(&self) -> Bps {
        Bps::new(self.margin_tier_step_bps)
    }

    pub fn supports(&self, asset: Address) -> bool {
        if asset.is_zero() {
            return false;
        }
        asset == self.base_asset || self.supported_assets.contains(&asset)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol.is_zero() {
            return Err(ConfigError::InvalidAddress {
                field: "protocol",
                reason: "must not be the zero address".to_string(),
            });
        }
        if self.admin.is_zero() {
            return Err(ConfigError::InvalidAddress {
                field: "admin",
                reason: "must not be the zero address".to_string(),
            });
        }
        if self.supported_assets.iter().any(Address::is_zero) {
            return Err(ConfigError::InvalidAddress {
                field: "supported_assets",
                reason: "zero address cannot be an asset".to_string(),
            });
        }
        if self.supported_assets.is_empty() && self.base_asset.is_zero() {
            return Err(ConfigError::NoSupportedAssets);
        }

        if self.max_margin_bps > MAX_MARGIN_BPS {
            return Err(ConfigError::InvalidMargin {
                reason: format!("max margin {} above {}", self.max_margin_bps, MAX_MARGIN_BPS),
            });
        }
        if self.margin_tier_step_bps == 0 || self.margin_tier_step_bps > self.max_margin_bps {
            return Err(ConfigError::InvalidMargin {
                reason: "tier step must be in (0, max margin]".to_string(),
            });
        }

        if self.max_events == 0 {
            return Err(ConfigError::InvalidRetention);
        }

        Ok(())
    }
}

fn parse_address(field: &'static str, raw: &str) -> Result<Address, ConfigError> {
    raw.parse().map_err(|e: crate::types::AddressParseError| ConfigError::InvalidAddress {
        field,
        reason: e.to_string(),
    })
}

pub fn local_dai() -> Address {
    Address::from_low_u64(0xda1)
}

pub fn local_usdc() -> Address {
    Address::from_low_u64(0x05dc)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid address for {field}: {reason}")]
    InvalidAddress { field: &'static str, reason: String },

    #[error("no supported assets configured")]
    NoSupportedAssets,

    #[error("invalid margin settings: {reason}")]
    InvalidMargin { reason: String },

    #[error("event retention must be positive")]
    InvalidRetention,

    #[error("config parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Local,
    Kovan,
}

impl Network {
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Local => 31337,
            Network::Kovan => 42,
        }
    }

    pub fn config(&self, admin: Address) -> Result<ProviderConfig, ConfigError> {
        match self {
            Network::Local => Ok(ProviderConfig {
                admin,
                ..ProviderConfig::local()
            }),
            Network::Kovan => ProviderConfig::kovan(admin),
        }
    }
}
