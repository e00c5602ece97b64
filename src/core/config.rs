use anyhow::{Context, Result};
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::protocol::lending::accounts::derive_lending_market_authority;
use crate::protocol::lending::flows::MarketAccounts;

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_http_url: String,
    pub market_config_path: String,
    pub poll_interval_ms: u64,
    pub rpc_timeout_secs: u64,
    pub max_consecutive_errors: u32,
    pub owner_pubkey: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Config {
            rpc_http_url: env::var("RPC_HTTP_URL")
                .unwrap_or_else(|_| "https://api.devnet.solana.com".to_string()),
            market_config_path: env::var("MARKET_CONFIG_PATH")
                .unwrap_or_else(|_| "./market.json".to_string()),
            poll_interval_ms: env::var("POLL_INTERVAL_MS")
                .unwrap_or_else(|_| "650000".to_string())
                .parse()
                .context("Invalid POLL_INTERVAL_MS value")?,
            rpc_timeout_secs: env::var("RPC_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid RPC_TIMEOUT_SECS value")?,
            max_consecutive_errors: env::var("MAX_CONSECUTIVE_ERRORS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid MAX_CONSECUTIVE_ERRORS value")?,
            owner_pubkey: env::var("OWNER_PUBKEY").ok(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.rpc_http_url.starts_with("http://") && !self.rpc_http_url.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "RPC_HTTP_URL must start with http:// or https://"
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("POLL_INTERVAL_MS must be greater than 0"));
        }

        if self.rpc_timeout_secs == 0 {
            return Err(anyhow::anyhow!("RPC_TIMEOUT_SECS must be greater than 0"));
        }

        if let Some(owner) = &self.owner_pubkey {
            Pubkey::from_str(owner)
                .map_err(|e| anyhow::anyhow!("Invalid OWNER_PUBKEY {}: {}", owner, e))?;
        }

        Ok(())
    }

    pub fn owner(&self) -> Result<Option<Pubkey>> {
        self.owner_pubkey
            .as_deref()
            .map(|s| Pubkey::from_str(s).with_context(|| format!("Invalid OWNER_PUBKEY {}", s)))
            .transpose()
    }

    /// An explicitly given owner wins over `OWNER_PUBKEY`; either must parse.
    pub fn resolve_owner(&self, explicit: Option<&str>) -> Result<Option<Pubkey>> {
        match explicit {
            Some(s) => Pubkey::from_str(s)
                .map(Some)
                .with_context(|| format!("Invalid owner pubkey {}", s)),
            None => self.owner(),
        }
    }

    pub fn load_market(&self) -> Result<MarketConfig> {
        MarketConfig::load(&self.market_config_path)
    }
}

/// Deployment file naming the lending program, one market and its reserves.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MarketConfig {
    #[serde(rename = "programID")]
    pub program_id: String,
    pub markets: MarketEntry,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MarketEntry {
    pub address: String,
    #[serde(rename = "authorityAddress")]
    pub authority_address: Option<String>,
    #[serde(default)]
    pub reserves: Vec<ReserveEntry>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReserveEntry {
    pub asset: String,
    pub address: String,
}

impl MarketConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read market config {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("Invalid market config {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: MarketConfig = serde_json::from_str(raw).context("Failed to parse market config JSON")?;
        config.accounts()?;
        config.reserve_addresses()?;
        Ok(config)
    }

    /// Resolves the market's addresses. A configured authority must match the
    /// one derived from the market address.
    pub fn accounts(&self) -> Result<MarketAccounts> {
        let program_id = Pubkey::from_str(&self.program_id)
            .with_context(|| format!("Invalid programID {}", self.program_id))?;
        let lending_market = Pubkey::from_str(&self.markets.address)
            .with_context(|| format!("Invalid market address {}", self.markets.address))?;
        let derived = derive_lending_market_authority(&lending_market, &program_id)?;

        if let Some(configured) = &self.markets.authority_address {
            let configured = Pubkey::from_str(configured)
                .with_context(|| format!("Invalid authorityAddress {}", configured))?;
            if configured != derived {
                return Err(anyhow::anyhow!(
                    "authorityAddress {} does not match derived authority {}",
                    configured,
                    derived
                ));
            }
        }

        Ok(MarketAccounts {
            program_id,
            lending_market,
            lending_market_authority: derived,
        })
    }

    /// `(asset, reserve address)` in file order.
    pub fn reserve_addresses(&self) -> Result<Vec<(String, Pubkey)>> {
        self.markets
            .reserves
            .iter()
            .map(|r| {
                Pubkey::from_str(&r.address)
                    .map(|pk| (r.asset.clone(), pk))
                    .with_context(|| format!("Invalid reserve address for {}: {}", r.asset, r.address))
            })
            .collect()
    }
}
