//! Governance contract client.
//!
//! [`GovernanceContract`] is the seam the correlator and the proposal manager
//! depend on. [`DaoContract`] implements it over JSON-RPC; writes go through an
//! injected [`TransactionSigner`] because key management lives with the wallet.

use crate::actions::validate_account_id;
use crate::amount::format_near_amount;
use crate::config::DaoConfig;
use crate::error::{DaoClientError, Result};
use crate::rpc::{RpcClient, TransactionOutcome};
use crate::types::{
    AccountId, CatalogueEntry, FailedTransaction, InProgressMetadata, IncomeTable, Policy,
    Proposal, ProposalAction, ProposalId, ProposalInput, RolePermission, TreeIndex, VoteOutcome,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A function call to be signed and broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Contract receiving the call
    pub receiver_id: AccountId,
    /// Method name
    pub method_name: String,
    /// JSON arguments
    pub args: Value,
    /// Attached gas
    pub gas: u64,
    /// Attached deposit in yoctoNEAR
    pub deposit: u128,
}

/// Produces signed transactions for function calls.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Account the transactions are signed for
    fn signer_id(&self) -> &str;

    /// Sign `call` and return the base64-encoded signed transaction
    async fn sign(&self, call: &FunctionCall) -> Result<String>;
}

/// Operations the client needs from the governance contract.
#[async_trait]
pub trait GovernanceContract: Send + Sync {
    /// Submit a proposal. Returns the ID the call reported, if it reported one.
    async fn submit_proposal(&self, proposal: &ProposalInput) -> Result<Option<ProposalId>>;

    /// ID the next proposal will receive
    async fn last_proposal_id(&self) -> Result<ProposalId>;

    /// Up to `limit` proposals starting at `from_index`, in contract order
    async fn list_proposals(&self, from_index: u64, limit: u64) -> Result<Vec<Proposal>>;

    /// Cast a vote on a proposal
    async fn vote_on_proposal(
        &self,
        proposal_id: ProposalId,
        action: ProposalAction,
    ) -> Result<VoteOutcome>;
}

/// Governance contract reached over JSON-RPC
#[derive(Clone)]
pub struct DaoContract {
    /// JSON-RPC client
    rpc: RpcClient,
    /// Signs write calls
    signer: Arc<dyn TransactionSigner>,
    /// Configuration
    config: Arc<DaoConfig>,
}

impl DaoContract {
    /// Create a new governance contract client
    pub fn new(config: Arc<DaoConfig>, signer: Arc<dyn TransactionSigner>) -> Result<Self> {
        let rpc = RpcClient::new(&config)?;
        Ok(Self {
            rpc,
            signer,
            config,
        })
    }

    /// Get the underlying RPC client
    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// Contract account ID
    pub fn contract_id(&self) -> &str {
        &self.config.dao_contract_id
    }

    async fn view<T: DeserializeOwned>(&self, method: &str, args: Value) -> Result<T> {
        self.rpc
            .view_function(&self.config.dao_contract_id, method, &args)
            .await
    }

    async fn call(&self, method: &str, args: Value, gas: u64) -> Result<TransactionOutcome> {
        self.call_with_deposit(method, args, gas, 0).await
    }

    async fn call_with_deposit(
        &self,
        method: &str,
        args: Value,
        gas: u64,
        deposit: u128,
    ) -> Result<TransactionOutcome> {
        let call = FunctionCall {
            receiver_id: self.config.dao_contract_id.clone(),
            method_name: method.to_string(),
            args,
            gas,
            deposit,
        };

        debug!(
            "Signing {} for {} as {}",
            method,
            call.receiver_id,
            self.signer.signer_id()
        );
        let signed = self.signer.sign(&call).await?;
        self.rpc.broadcast_tx_commit(method, &signed).await
    }

    /// Current DAO policy
    pub async fn policy(&self) -> Result<Policy> {
        self.view("get_policy", json!({})).await
    }

    /// Roles named `master_<minting contract>`
    pub async fn master_groups(&self) -> Result<Vec<RolePermission>> {
        let policy = self.policy().await?;
        Ok(policy
            .roles
            .into_iter()
            .filter(RolePermission::is_master_group)
            .collect())
    }

    /// All NFTs still being prepared
    pub async fn in_progress_nfts(&self) -> Result<Vec<InProgressMetadata>> {
        self.view("get_in_progress_nfts", json!({})).await
    }

    /// Income tables in `[from_index, from_index + limit)`
    pub async fn income_tables(
        &self,
        from_index: u64,
        limit: u64,
    ) -> Result<Vec<(TreeIndex, IncomeTable)>> {
        self.view(
            "get_income_tables",
            json!({ "from_index": from_index, "limit": limit }),
        )
        .await
    }

    /// A single income table
    pub async fn single_income_table(&self, tree_index: TreeIndex) -> Result<IncomeTable> {
        self.view("get_single_income_table", json!({ "id": tree_index }))
            .await
    }

    /// Payouts the contract failed to deliver
    pub async fn failed_transactions(
        &self,
        from_index: u64,
        limit: u64,
    ) -> Result<Vec<(u64, FailedTransaction)>> {
        self.view(
            "get_failed_transactions",
            json!({ "from_index": from_index, "limit": limit }),
        )
        .await
    }

    /// Catalogue of an artist
    pub async fn catalogue(
        &self,
        artist: &str,
    ) -> Result<Vec<(TreeIndex, Option<CatalogueEntry>)>> {
        self.view("get_catalogue", json!({ "artist": artist })).await
    }

    /// Sale price of an NFT in yoctoNEAR, `None` if its revenue table has no price
    pub async fn price(&self, minting_contract: &str, root_id: &str) -> Result<Option<u128>> {
        let price: Option<String> = self
            .view(
                "get_price",
                json!({ "minting_contract": minting_contract, "root_id": root_id }),
            )
            .await?;

        price
            .map(|price| {
                price.parse::<u128>().map_err(|_| {
                    DaoClientError::InvalidResponse(format!("Invalid price: {:?}", price))
                })
            })
            .transpose()
    }

    /// Buy an NFT from the vault of `minting_contract`.
    ///
    /// The contract only accepts a deposit equal to the sale price, so `price`
    /// must be the value returned by [`DaoContract::price`].
    pub async fn buy_nft(
        &self,
        minting_contract: &str,
        root_id: &str,
        price: u128,
    ) -> Result<TransactionOutcome> {
        validate_account_id("minting contract", minting_contract)?;
        if root_id.trim().is_empty() {
            return Err(DaoClientError::InvalidInput(
                "root ID must not be empty".to_string(),
            ));
        }
        if price == 0 {
            return Err(DaoClientError::InvalidInput(
                "NFT price must be greater than 0".to_string(),
            ));
        }

        info!(
            "Buying {}-{} for {} NEAR",
            minting_contract,
            root_id,
            format_near_amount(price, 4)
        );
        self.call_with_deposit(
            "buy_nft",
            json!({ "root_id": root_id, "minting_contract": minting_contract }),
            self.config.buy_gas,
            price,
        )
        .await
    }

    /// Look up the sale price and buy the NFT with exactly that deposit
    pub async fn buy_nft_at_listed_price(
        &self,
        minting_contract: &str,
        root_id: &str,
    ) -> Result<TransactionOutcome> {
        let price = self.price(minting_contract, root_id).await?.ok_or_else(|| {
            DaoClientError::InvalidInput(format!(
                "{}-{} has no sale price",
                minting_contract, root_id
            ))
        })?;
        self.buy_nft(minting_contract, root_id, price).await
    }
}

#[async_trait]
impl GovernanceContract for DaoContract {
    async fn submit_proposal(&self, proposal: &ProposalInput) -> Result<Option<ProposalId>> {
        info!(
            "Submitting {} proposal: {}",
            proposal.kind.tag(),
            proposal.description
        );

        let outcome = self
            .call(
                "add_proposal",
                json!({ "proposal": proposal }),
                self.config.proposal_gas,
            )
            .await?;

        let reported = outcome.return_value.as_u64();
        if reported.is_none() {
            warn!(
                "add_proposal returned no proposal ID (tx {})",
                outcome.transaction_hash
            );
        }
        Ok(reported)
    }

    async fn last_proposal_id(&self) -> Result<ProposalId> {
        let id: ProposalId = self.view("get_last_proposal_id", json!({})).await?;
        debug!("Last proposal ID: {}", id);
        Ok(id)
    }

    async fn list_proposals(&self, from_index: u64, limit: u64) -> Result<Vec<Proposal>> {
        debug!("Listing {} proposals from index {}", limit, from_index);
        self.view(
            "get_proposals",
            json!({ "from_index": from_index, "limit": limit }),
        )
        .await
    }

    async fn vote_on_proposal(
        &self,
        proposal_id: ProposalId,
        action: ProposalAction,
    ) -> Result<VoteOutcome> {
        info!("Voting {:?} on proposal {}", action, proposal_id);

        let outcome = self
            .call(
                "act_proposal",
                json!({ "id": proposal_id, "action": action }),
                self.config.vote_gas,
            )
            .await?;

        Ok(VoteOutcome {
            proposal_id,
            transaction_hash: outcome.transaction_hash,
            return_value: outcome.return_value,
        })
    }
}

/// Signer that refuses every call, for read-only use.
#[derive(Debug, Clone, Default)]
pub struct ReadOnlySigner;

#[async_trait]
impl TransactionSigner for ReadOnlySigner {
    fn signer_id(&self) -> &str {
        ""
    }

    async fn sign(&self, call: &FunctionCall) -> Result<String> {
        Err(DaoClientError::InvalidInput(format!(
            "{} requires a signing account",
            call.method_name
        )))
    }
}
