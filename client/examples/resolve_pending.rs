//! Example: Resolve a submission left pending by an earlier run
//!
//! Reads the correlation key from `dao-session.json`, finds the proposal it
//! belongs to and prints it.

use anyhow::{Context, Result};
use nft_dao_client::{
    DaoClient, DaoClientError, DaoConfig, FileSessionStore, GovernanceContract, PersistedSession,
    ReadOnlySigner,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("nft_dao_client=debug")
        .init();

    let dao_contract = std::env::var("DAO_CONTRACT").context("DAO_CONTRACT must be set")?;
    let config = Arc::new(DaoConfig::testnet(dao_contract).with_correlation_config(2000, 120));

    let session = PersistedSession::new(Arc::new(FileSessionStore::new("dao-session.json")));
    let client = DaoClient::new(config, Arc::new(ReadOnlySigner), session.clone())?;

    let key = match session.load_correlation_key() {
        Ok(key) => key,
        Err(DaoClientError::NoPendingCorrelation) => {
            println!("Nothing to resolve");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    println!(
        "Pending {} proposal since {} (baseline {})",
        key.expected_kind, key.created_at, key.baseline_proposal_id
    );

    match client.resolve_pending().await {
        Ok(proposal_id) => {
            let proposals = client.contract().list_proposals(proposal_id, 1).await?;
            if let Some(proposal) = proposals.first() {
                println!("✓ Proposal {}: {}", proposal.id, proposal.description);
                println!("  - Status: {}", proposal.status);
                println!("  - Proposer: {}", proposal.proposer);
            }
        }
        Err(DaoClientError::CorrelationTimeout(secs)) => {
            eprintln!("✗ Proposal not visible after {}s, the key is kept for a later run", secs);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
