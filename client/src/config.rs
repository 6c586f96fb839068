//! Network and client configuration.
//!
//! This module provides configuration for connecting to the governance contract on
//! testnet, mainnet or a custom JSON-RPC endpoint, plus the retry and correlation
//! tuning used by the rest of the crate.

use crate::error::{DaoClientError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Gas attached to `add_proposal` calls (100 Tgas)
pub const DEFAULT_PROPOSAL_GAS: u64 = 100_000_000_000_000;

/// Gas attached to `act_proposal` calls (250 Tgas)
pub const DEFAULT_VOTE_GAS: u64 = 250_000_000_000_000;

/// Gas attached to `buy_nft` calls (300 Tgas). The contract forwards 100 Tgas
/// to the minting contract and reserves 50 Tgas for its callback.
pub const DEFAULT_BUY_GAS: u64 = 300_000_000_000_000;

/// Network type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    /// Public test network
    Testnet,
    /// Main network
    Mainnet,
    /// Custom network with a user-defined endpoint
    Custom,
}

impl Network {
    /// Network identifier used by wallets and explorers
    pub fn network_id(&self) -> &'static str {
        match self {
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
            Network::Custom => "custom",
        }
    }

    /// Get the default JSON-RPC URL for this network
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Testnet => "https://rpc.testnet.near.org",
            Network::Mainnet => "https://rpc.mainnet.near.org",
            Network::Custom => "",
        }
    }
}

/// The deployment descriptor served next to the admin front end.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectConfig {
    contract_name: String,
}

/// Configuration for the governance client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaoConfig {
    /// Network to connect to
    pub network: Network,

    /// JSON-RPC endpoint URL
    pub rpc_url: String,

    /// Account ID of the governance (DAO) contract
    pub dao_contract_id: String,

    /// HTTP request timeout
    pub request_timeout: Duration,

    /// Maximum number of retries for failed requests
    pub max_retries: usize,

    /// Initial retry delay (in milliseconds)
    pub retry_initial_delay_ms: u64,

    /// Maximum retry delay (in milliseconds)
    pub retry_max_delay_ms: u64,

    /// Retry backoff multiplier
    pub retry_multiplier: f64,

    /// Initial delay between correlation attempts (in milliseconds)
    pub correlation_poll_interval_ms: u64,

    /// Give up correlating after this many seconds
    pub correlation_timeout_secs: u64,

    /// How far below the baseline proposal ID the scan starts
    pub scan_window: u64,

    /// Proposals fetched per page
    pub page_size: u64,

    /// Upper bound on pages fetched by the adaptive scan
    pub max_scan_pages: usize,

    /// Gas attached to proposal submissions
    pub proposal_gas: u64,

    /// Gas attached to votes
    pub vote_gas: u64,

    /// Gas attached to NFT purchases
    pub buy_gas: u64,
}

impl DaoConfig {
    /// Create a new configuration for the specified network and contract
    pub fn new(network: Network, dao_contract_id: impl Into<String>) -> Self {
        Self {
            network,
            rpc_url: network.default_rpc_url().to_string(),
            dao_contract_id: dao_contract_id.into(),
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_initial_delay_ms: 100,
            retry_max_delay_ms: 5000,
            retry_multiplier: 2.0,
            correlation_poll_interval_ms: 1000,
            correlation_timeout_secs: 60,
            scan_window: 2,
            page_size: 10,
            max_scan_pages: 5,
            proposal_gas: DEFAULT_PROPOSAL_GAS,
            vote_gas: DEFAULT_VOTE_GAS,
            buy_gas: DEFAULT_BUY_GAS,
        }
    }

    /// Create configuration for testnet
    pub fn testnet(dao_contract_id: impl Into<String>) -> Self {
        Self::new(Network::Testnet, dao_contract_id)
    }

    /// Create configuration for mainnet
    pub fn mainnet(dao_contract_id: impl Into<String>) -> Self {
        Self::new(Network::Mainnet, dao_contract_id)
    }

    /// Create a custom configuration
    pub fn custom(rpc_url: String, dao_contract_id: String) -> Result<Self> {
        if rpc_url.is_empty() {
            return Err(DaoClientError::Config(
                "RPC URL cannot be empty".to_string(),
            ));
        }
        if dao_contract_id.is_empty() {
            return Err(DaoClientError::Config(
                "DAO contract ID cannot be empty".to_string(),
            ));
        }

        let mut config = Self::new(Network::Custom, dao_contract_id);
        config.rpc_url = rpc_url;
        Ok(config)
    }

    /// Load the contract name from a `projectConfig.json` deployment descriptor
    pub fn from_project_config(network: Network, path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DaoClientError::Config(format!(
                "Cannot read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let project: ProjectConfig = serde_json::from_str(&raw)?;

        let config = Self::new(network, project.contract_name);
        config.validate()?;
        Ok(config)
    }

    /// Set the RPC endpoint
    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = rpc_url.into();
        self
    }

    /// Set request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set maximum retries
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set retry delays
    pub fn with_retry_config(
        mut self,
        initial_delay_ms: u64,
        max_delay_ms: u64,
        multiplier: f64,
    ) -> Self {
        self.retry_initial_delay_ms = initial_delay_ms;
        self.retry_max_delay_ms = max_delay_ms;
        self.retry_multiplier = multiplier;
        self
    }

    /// Set correlation polling configuration
    pub fn with_correlation_config(mut self, poll_interval_ms: u64, timeout_secs: u64) -> Self {
        self.correlation_poll_interval_ms = poll_interval_ms;
        self.correlation_timeout_secs = timeout_secs;
        self
    }

    /// Set the scan geometry used by the correlator
    pub fn with_scan_config(mut self, scan_window: u64, page_size: u64, max_scan_pages: usize) -> Self {
        self.scan_window = scan_window;
        self.page_size = page_size;
        self.max_scan_pages = max_scan_pages;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() {
            return Err(DaoClientError::Config(
                "RPC URL cannot be empty".to_string(),
            ));
        }
        Url::parse(&self.rpc_url)?;
        if self.dao_contract_id.is_empty() {
            return Err(DaoClientError::Config(
                "DAO contract ID cannot be empty".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(DaoClientError::Config(
                "Max retries must be greater than 0".to_string(),
            ));
        }
        if self.retry_initial_delay_ms == 0 {
            return Err(DaoClientError::Config(
                "Retry initial delay must be greater than 0".to_string(),
            ));
        }
        if self.retry_multiplier <= 1.0 {
            return Err(DaoClientError::Config(
                "Retry multiplier must be greater than 1.0".to_string(),
            ));
        }
        if self.correlation_poll_interval_ms == 0 {
            return Err(DaoClientError::Config(
                "Correlation poll interval must be greater than 0".to_string(),
            ));
        }
        if self.correlation_timeout_secs == 0 {
            return Err(DaoClientError::Config(
                "Correlation timeout must be greater than 0".to_string(),
            ));
        }
        if self.page_size == 0 || self.max_scan_pages == 0 {
            return Err(DaoClientError::Config(
                "Page size and max scan pages must be greater than 0".to_string(),
            ));
        }
        if self.proposal_gas == 0 || self.vote_gas == 0 || self.buy_gas == 0 {
            return Err(DaoClientError::Config(
                "Attached gas must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
