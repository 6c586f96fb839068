//! Example: Register an artist in the master group of a minting contract
//!
//! Signing happens in an external wallet. Set `DAO_SIGNED_TX` to the base64
//! signed `add_proposal` transaction to broadcast it; without it the example
//! only prints the call that would have to be signed.
//!
//! ```text
//! DAO_CONTRACT=dao.example.testnet MEMBER=alice.testnet MINTING_CONTRACT=nft.example.testnet \
//!     cargo run --example register_user
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use nft_dao_client::actions::{self, GroupTier};
use nft_dao_client::{
    DaoClient, DaoConfig, FileSessionStore, FunctionCall, PersistedSession, TransactionSigner,
};
use std::sync::Arc;

/// Hands out a transaction signed ahead of time by a wallet
struct PresignedSigner {
    account_id: String,
    signed: Option<String>,
}

#[async_trait]
impl TransactionSigner for PresignedSigner {
    fn signer_id(&self) -> &str {
        &self.account_id
    }

    async fn sign(&self, call: &FunctionCall) -> nft_dao_client::Result<String> {
        match &self.signed {
            Some(signed) => Ok(signed.clone()),
            None => {
                println!("Sign this call with your wallet and set DAO_SIGNED_TX:");
                println!("{}", serde_json::to_string_pretty(call)?);
                Err(nft_dao_client::DaoClientError::InvalidInput(
                    "DAO_SIGNED_TX is not set".to_string(),
                ))
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("nft_dao_client=info")
        .init();

    let dao_contract = std::env::var("DAO_CONTRACT").context("DAO_CONTRACT must be set")?;
    let member = std::env::var("MEMBER").context("MEMBER must be set")?;
    let minting_contract =
        std::env::var("MINTING_CONTRACT").context("MINTING_CONTRACT must be set")?;

    let config = Arc::new(DaoConfig::testnet(dao_contract));
    println!("Network: {:?}", config.network);
    println!("RPC URL: {}\n", config.rpc_url);

    let signer = Arc::new(PresignedSigner {
        account_id: member.clone(),
        signed: std::env::var("DAO_SIGNED_TX").ok(),
    });
    let session = PersistedSession::new(Arc::new(FileSessionStore::new("dao-session.json")));
    let client = DaoClient::new(config, signer, session)?;

    let role = actions::group_name(GroupTier::Master, &minting_contract)?;
    let input = actions::register_user(&member, &role)?;
    println!("Proposal: {}", input.description);

    let pending = client.submit(&input).await?;
    println!(
        "✓ Submitted (baseline {}, key {})",
        pending.key.baseline_proposal_id, pending.key.token
    );

    let proposal_id = client.resolve_pending().await?;
    println!("✓ Proposal ID: {}", proposal_id);

    Ok(())
}
