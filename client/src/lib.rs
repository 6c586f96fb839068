//! NFT DAO Governance Client
//!
//! This library drives the governance contract of an NFT music DAO: it builds and
//! submits proposals (member registration, group creation, NFT preparation and
//! minting, revenue tables, payouts), finds the proposal ID the contract assigned
//! to each submission, and votes on it.
//!
//! # Features
//!
//! - **Action Builders**: Validated constructors for every proposal kind
//! - **Proposal Correlation**: Locate a submitted proposal by kind and payload, with
//!   an adaptive scan window, backoff polling and explicit ambiguity handling
//! - **Persisted Sessions**: Correlation keys survive restarts and are consumed once
//! - **JSON-RPC Transport**: View calls and signed transaction broadcast with retry
//! - **Contract Views**: Policy roles, in-progress NFTs, income tables, catalogues
//! - **NFT Sales**: Look up the sale price of an NFT and buy it with the exact deposit
//! - **Error Handling**: One typed error enum, no sentinel values
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use nft_dao_client::{actions, DaoClient, DaoConfig, PersistedSession, ReadOnlySigner};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     nft_dao_client::init_tracing();
//!
//!     let config = Arc::new(DaoConfig::testnet("dao.example.testnet"));
//!     let client = DaoClient::new(config, Arc::new(ReadOnlySigner), PersistedSession::in_memory())?;
//!
//!     client.health_check().await?;
//!     for group in client.contract().master_groups().await? {
//!         println!("{}: {:?}", group.name, group.members());
//!     }
//!
//!     let input = actions::mint_root(3);
//!     println!("Would submit: {}", input.description);
//!     Ok(())
//! }
//! ```
//!
//! ## Submit and resolve a proposal
//!
//! ```rust,no_run
//! use nft_dao_client::{actions, DaoClient};
//!
//! # async fn run(client: DaoClient) -> nft_dao_client::Result<()> {
//! let input = actions::register_user("alice.testnet", "master_nft.example.testnet")?;
//! let proposal_id = client.submit_and_resolve(&input).await?;
//! client.approve(proposal_id).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod actions;
pub mod amount;
pub mod config;
pub mod contract;
pub mod correlator;
pub mod error;
pub mod manager;
pub mod minting;
pub mod retry;
pub mod rpc;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use config::{DaoConfig, Network};
pub use contract::{DaoContract, FunctionCall, GovernanceContract, ReadOnlySigner, TransactionSigner};
pub use correlator::{
    AmbiguityPolicy, CorrelationKey, CorrelatorOptions, DistinguishingFields, ProposalCorrelator,
};
pub use error::{DaoClientError, Result};
pub use manager::{PendingProposal, ProposalManager};
pub use minting::{MintingContract, MintingContractClient};
pub use retry::RetryStrategy;
pub use rpc::{RpcClient, TransactionOutcome};
pub use session::{FileSessionStore, MemorySessionStore, PersistedSession, SessionStore};
pub use types::{
    KindTag, NftData, Proposal, ProposalAction, ProposalId, ProposalInput, ProposalKind,
    ProposalStatus, VoteOutcome,
};

use std::sync::Arc;
use tracing::info;

/// Install a `tracing` subscriber filtered by `RUST_LOG` (default `info`).
/// Does nothing if a subscriber is already installed.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Main client combining the governance contract, the minting contract reader
/// and the proposal workflow.
///
/// This is the primary entry point for applications.
#[derive(Clone)]
pub struct DaoClient {
    /// Governance contract
    contract: Arc<DaoContract>,
    /// Minting contract reader
    minting: MintingContractClient,
    /// Proposal workflow
    manager: ProposalManager,
    /// Configuration
    config: Arc<DaoConfig>,
}

impl DaoClient {
    /// Create a new client
    ///
    /// # Arguments
    ///
    /// * `config` - Client configuration
    /// * `signer` - Signs proposal and vote transactions
    /// * `session` - Where pending correlation keys are kept
    pub fn new(
        config: Arc<DaoConfig>,
        signer: Arc<dyn TransactionSigner>,
        session: PersistedSession,
    ) -> Result<Self> {
        config.validate()?;

        info!(
            "Initializing DAO client for {} on {:?}",
            config.dao_contract_id, config.network
        );

        let contract = Arc::new(DaoContract::new(config.clone(), signer)?);
        let minting = MintingContractClient::new(&config)?;
        let manager = ProposalManager::new(
            contract.clone(),
            CorrelatorOptions::from_config(&config),
            session,
        );

        Ok(Self {
            contract,
            minting,
            manager,
            config,
        })
    }

    /// Get the governance contract
    pub fn contract(&self) -> &DaoContract {
        &self.contract
    }

    /// Get the minting contract reader
    pub fn minting(&self) -> &MintingContractClient {
        &self.minting
    }

    /// Get the proposal manager
    pub fn manager(&self) -> &ProposalManager {
        &self.manager
    }

    /// Submit a proposal and persist its correlation key
    pub async fn submit(&self, input: &ProposalInput) -> Result<PendingProposal> {
        self.manager.submit(input).await
    }

    /// Resolve the proposal ID of the pending submission
    pub async fn resolve_pending(&self) -> Result<ProposalId> {
        self.manager.resolve_pending().await
    }

    /// Submit a proposal and wait for its ID
    pub async fn submit_and_resolve(&self, input: &ProposalInput) -> Result<ProposalId> {
        self.manager.submit_and_resolve(input).await
    }

    /// Vote to approve a proposal
    pub async fn approve(&self, proposal_id: ProposalId) -> Result<VoteOutcome> {
        self.manager.approve(proposal_id).await
    }

    /// Buy an NFT at the price listed in its revenue table
    pub async fn buy_nft(
        &self,
        minting_contract: &str,
        root_id: &str,
    ) -> Result<TransactionOutcome> {
        self.contract
            .buy_nft_at_listed_price(minting_contract, root_id)
            .await
    }

    /// Health check - verify connectivity to the RPC endpoint
    pub async fn health_check(&self) -> Result<bool> {
        self.contract.rpc().health_check().await
    }

    /// Get configuration
    pub fn config(&self) -> &DaoConfig {
        &self.config
    }
}
