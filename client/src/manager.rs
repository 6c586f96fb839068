//! Submit, correlate and vote on proposals.
//!
//! This module ties the contract, the correlator and the session together into
//! the workflow every governance action follows: remember the baseline, submit,
//! find the proposal the contract created, then approve it.

use crate::contract::GovernanceContract;
use crate::correlator::{CorrelationKey, CorrelatorOptions, ProposalCorrelator};
use crate::error::Result;
use crate::session::PersistedSession;
use crate::types::{ProposalAction, ProposalId, ProposalInput, VoteOutcome};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A submitted proposal whose ID has not been resolved yet
#[derive(Debug, Clone)]
pub struct PendingProposal {
    /// Key persisted in the session
    pub key: CorrelationKey,
    /// ID reported by `add_proposal`, if it reported one
    pub reported_id: Option<ProposalId>,
}

/// Proposal workflow
#[derive(Clone)]
pub struct ProposalManager {
    /// Governance contract
    contract: Arc<dyn GovernanceContract>,
    /// Correlator over the same contract
    correlator: ProposalCorrelator,
    /// Where pending keys are kept
    session: PersistedSession,
}

impl ProposalManager {
    /// Create a new proposal manager
    pub fn new(
        contract: Arc<dyn GovernanceContract>,
        options: CorrelatorOptions,
        session: PersistedSession,
    ) -> Self {
        let correlator = ProposalCorrelator::new(contract.clone(), options);
        Self {
            contract,
            correlator,
            session,
        }
    }

    /// Get the correlator
    pub fn correlator(&self) -> &ProposalCorrelator {
        &self.correlator
    }

    /// Get the session
    pub fn session(&self) -> &PersistedSession {
        &self.session
    }

    /// Record the baseline and correlation key, then submit `input`.
    ///
    /// The key is persisted before the write so a restart between submitting
    /// and resolving can still find the proposal. It is invalidated again if
    /// the write fails.
    pub async fn submit(&self, input: &ProposalInput) -> Result<PendingProposal> {
        let baseline = self.contract.last_proposal_id().await?;
        let key = CorrelationKey::for_kind(baseline, &input.kind);
        self.session.save_correlation_key(&key)?;

        info!(
            "Submitting {} proposal (baseline {})",
            key.expected_kind, baseline
        );
        let reported_id = match self.contract.submit_proposal(input).await {
            Ok(reported_id) => reported_id,
            Err(error) => {
                // Nothing was created, so the key must not be resolved later
                self.session.invalidate(&key.token)?;
                return Err(error);
            }
        };

        Ok(PendingProposal { key, reported_id })
    }

    /// Resolve the key stored in the session and consume it.
    pub async fn resolve_pending(&self) -> Result<ProposalId> {
        let key = self.session.load_correlation_key()?;
        let proposal_id = self.correlator.resolve(&key).await?;

        if !self.session.invalidate(&key.token)? {
            debug!("Correlation key {} was replaced while resolving", key.token);
        }
        self.session.record_resolved(proposal_id)?;

        Ok(proposal_id)
    }

    /// Vote to approve a proposal
    pub async fn approve(&self, proposal_id: ProposalId) -> Result<VoteOutcome> {
        self.vote(proposal_id, ProposalAction::VoteApprove).await
    }

    /// Cast any vote on a proposal
    pub async fn vote(&self, proposal_id: ProposalId, action: ProposalAction) -> Result<VoteOutcome> {
        let outcome = self.contract.vote_on_proposal(proposal_id, action).await?;
        info!("{}", outcome);
        Ok(outcome)
    }

    /// Submit `input` and wait for the proposal ID
    pub async fn submit_and_resolve(&self, input: &ProposalInput) -> Result<ProposalId> {
        let pending = self.submit(input).await?;
        let proposal_id = self.resolve_pending().await?;

        if let Some(reported) = pending.reported_id {
            if reported != proposal_id {
                warn!(
                    "add_proposal reported {} but correlation found {}",
                    reported, proposal_id
                );
            }
        }
        Ok(proposal_id)
    }
}
