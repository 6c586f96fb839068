//! Read access to minting contracts.

use crate::config::DaoConfig;
use crate::error::Result;
use crate::rpc::RpcClient;
use crate::types::TokenMetadata;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Reads NFT metadata from a minting contract.
#[async_trait]
pub trait MintingContract: Send + Sync {
    /// Metadata of `token_id` on `contract`, `None` if the token does not exist
    async fn nft_metadata(&self, contract: &str, token_id: &str) -> Result<Option<TokenMetadata>>;
}

#[derive(Debug, Deserialize)]
struct TokenDetails {
    #[serde(default)]
    metadata: Option<TokenMetadata>,
}

/// Minting contract reader over JSON-RPC
#[derive(Clone)]
pub struct MintingContractClient {
    rpc: RpcClient,
}

impl MintingContractClient {
    /// Create a new minting contract reader
    pub fn new(config: &DaoConfig) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::new(config)?,
        })
    }
}

#[async_trait]
impl MintingContract for MintingContractClient {
    async fn nft_metadata(&self, contract: &str, token_id: &str) -> Result<Option<TokenMetadata>> {
        debug!("Fetching metadata for {} on {}", token_id, contract);

        let details: Vec<Option<TokenDetails>> = self
            .rpc
            .view_function(
                contract,
                "nft_token_details_for_list",
                &json!({ "token_list": [token_id] }),
            )
            .await?;

        Ok(details
            .into_iter()
            .next()
            .flatten()
            .and_then(|token| token.metadata))
    }
}
