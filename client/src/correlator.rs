//! Correlation of submitted actions with the proposal IDs the contract assigned.
//!
//! `add_proposal` is not guaranteed to report the new ID back to the caller, so
//! the client records the last proposal ID before submitting and afterwards
//! scans the proposals around it for an in-progress proposal of the expected
//! kind whose payload carries the expected values.
//!
//! The scan starts slightly before the baseline because other users may have
//! submitted proposals between the baseline read and our own submission.

use crate::config::DaoConfig;
use crate::contract::GovernanceContract;
use crate::error::{DaoClientError, Result};
use crate::types::{KindTag, Proposal, ProposalId, ProposalKind};
use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Distance before the baseline where scanning starts
pub const WINDOW: u64 = 2;

/// Proposals fetched per page
pub const PAGE_SIZE: u64 = 10;

/// First proposal index to scan for a baseline, never below zero
pub fn scan_start(baseline_proposal_id: ProposalId, window: u64) -> u64 {
    baseline_proposal_id.saturating_sub(window)
}

/// Payload values a matching proposal must carry, keyed by dotted path
/// (`role`, `nft_data.title`, `role.name`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DistinguishingFields(BTreeMap<String, Value>);

impl DistinguishingFields {
    /// No fields; any proposal of the expected kind matches
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field
    pub fn with(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(path.into(), value.into());
        self
    }

    /// Expected value at `path`
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.0.get(path)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every field is present in `payload` with an equal JSON value
    pub fn matches(&self, payload: &Value) -> bool {
        self.0
            .iter()
            .all(|(path, expected)| lookup(payload, path) == Some(expected))
    }
}

fn lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(payload, |value, segment| value.get(segment))
}

/// What the client remembers about a submission so it can find the proposal later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationKey {
    /// `get_last_proposal_id` read before submitting
    pub baseline_proposal_id: ProposalId,
    /// Kind of the submitted proposal
    pub expected_kind: KindTag,
    /// Payload values identifying the submission
    pub fields: DistinguishingFields,
    /// Single-use token, checked when the key is invalidated
    pub token: Uuid,
    /// When the key was created
    pub created_at: DateTime<Utc>,
}

impl CorrelationKey {
    /// Create a key with a fresh token
    pub fn new(
        baseline_proposal_id: ProposalId,
        expected_kind: KindTag,
        fields: DistinguishingFields,
    ) -> Self {
        Self {
            baseline_proposal_id,
            expected_kind,
            fields,
            token: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    /// Create a key for `kind`, picking the fields that identify each family.
    pub fn for_kind(baseline_proposal_id: ProposalId, kind: &ProposalKind) -> Self {
        let fields = match kind {
            ProposalKind::AddMemberToRole { role, .. } => {
                DistinguishingFields::new().with("role", role.as_str())
            }
            ProposalKind::ChangePolicyAddOrUpdateRole { role } => {
                DistinguishingFields::new().with("role.name", role.name.as_str())
            }
            ProposalKind::PrepairNft { nft_data } => {
                DistinguishingFields::new().with("nft_data.title", json!(nft_data.title))
            }
            ProposalKind::UpdatePrepairedNft { id, .. } | ProposalKind::MintRoot { id } => {
                DistinguishingFields::new().with("id", *id)
            }
            ProposalKind::CreateRevenueTable {
                root_id, contract, ..
            } => DistinguishingFields::new()
                .with("contract", contract.as_str())
                .with("root_id", root_id.as_str()),
            ProposalKind::AlterRevenueTable { tree_index, .. } => {
                DistinguishingFields::new().with("tree_index", *tree_index)
            }
            ProposalKind::PayoutRevenue { tree_index_list } => {
                DistinguishingFields::new().with("tree_index_list", json!(tree_index_list))
            }
            ProposalKind::ResendFailedTransaction { failed_id, .. } => {
                DistinguishingFields::new().with("failed_id", *failed_id)
            }
        };

        Self::new(baseline_proposal_id, kind.tag(), fields)
    }

    /// Whether `proposal` is in progress, of the expected kind and carries the fields
    pub fn matches(&self, proposal: &Proposal) -> bool {
        if !proposal.is_in_progress() || proposal.kind.tag() != Some(self.expected_kind) {
            return false;
        }
        proposal
            .kind
            .known()
            .is_some_and(|kind| self.fields.matches(&kind.payload()))
    }
}

/// What to do when more than one proposal matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmbiguityPolicy {
    /// Take the first match in scan order and warn about the rest
    #[default]
    FirstInScanOrder,
    /// Fail with [`DaoClientError::AmbiguousMatch`]
    Reject,
}

/// IDs of all proposals in `page` matching `key`, in scan order
pub fn find_matches(page: &[Proposal], key: &CorrelationKey) -> Vec<ProposalId> {
    page.iter()
        .filter(|proposal| key.matches(proposal))
        .map(|proposal| proposal.id)
        .collect()
}

fn pick(ids: Vec<ProposalId>, policy: AmbiguityPolicy) -> Result<ProposalId> {
    if ids.len() > 1 {
        if policy == AmbiguityPolicy::Reject {
            return Err(DaoClientError::AmbiguousMatch { ids });
        }
        warn!(
            "{} proposals matched, using {} (also matched: {:?})",
            ids.len(),
            ids[0],
            &ids[1..]
        );
    }
    ids.first().copied().ok_or_else(|| {
        DaoClientError::InvalidResponse("No candidate proposal to pick".to_string())
    })
}

/// Match one page of proposals fetched from `from_index` against `key`.
pub fn match_page(
    page: &[Proposal],
    key: &CorrelationKey,
    from_index: u64,
    policy: AmbiguityPolicy,
) -> Result<ProposalId> {
    if page.is_empty() {
        return Err(DaoClientError::EmptyWindow { from_index });
    }

    let ids = find_matches(page, key);
    if ids.is_empty() {
        return Err(DaoClientError::NotFound {
            kind: key.expected_kind.to_string(),
            scanned: page.len(),
        });
    }
    pick(ids, policy)
}

/// Correlator options
#[derive(Debug, Clone)]
pub struct CorrelatorOptions {
    /// Proposals before the baseline to include
    pub window: u64,
    /// Proposals per page
    pub page_size: u64,
    /// Pages fetched by one adaptive scan
    pub max_scan_pages: usize,
    /// First delay between scans (in milliseconds)
    pub poll_interval_ms: u64,
    /// Give up after this long (in seconds)
    pub timeout_secs: u64,
    /// Handling of several matches
    pub ambiguity: AmbiguityPolicy,
}

impl Default for CorrelatorOptions {
    fn default() -> Self {
        Self {
            window: WINDOW,
            page_size: PAGE_SIZE,
            max_scan_pages: 5,
            poll_interval_ms: 1000,
            timeout_secs: 60,
            ambiguity: AmbiguityPolicy::default(),
        }
    }
}

impl CorrelatorOptions {
    /// Create from client config
    pub fn from_config(config: &DaoConfig) -> Self {
        Self {
            window: config.scan_window,
            page_size: config.page_size,
            max_scan_pages: config.max_scan_pages,
            poll_interval_ms: config.correlation_poll_interval_ms,
            timeout_secs: config.correlation_timeout_secs,
            ambiguity: AmbiguityPolicy::default(),
        }
    }

    /// Set the ambiguity policy
    pub fn with_ambiguity(mut self, ambiguity: AmbiguityPolicy) -> Self {
        self.ambiguity = ambiguity;
        self
    }

    /// Set custom poll interval
    pub fn with_poll_interval(mut self, interval_ms: u64) -> Self {
        self.poll_interval_ms = interval_ms;
        self
    }

    /// Set custom timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the number of pages one scan may fetch
    pub fn with_max_scan_pages(mut self, pages: usize) -> Self {
        self.max_scan_pages = pages;
        self
    }

    fn backoff(&self) -> ExponentialBackoff {
        let initial = Duration::from_millis(self.poll_interval_ms);
        ExponentialBackoffBuilder::new()
            .with_initial_interval(initial)
            .with_max_interval(initial * 8)
            .with_multiplier(2.0)
            .with_max_elapsed_time(Some(Duration::from_secs(self.timeout_secs)))
            .build()
    }
}

/// Finds the proposal a submission produced
#[derive(Clone)]
pub struct ProposalCorrelator {
    /// Governance contract
    contract: Arc<dyn GovernanceContract>,
    /// Options
    options: CorrelatorOptions,
}

impl ProposalCorrelator {
    /// Create a new correlator
    pub fn new(contract: Arc<dyn GovernanceContract>, options: CorrelatorOptions) -> Self {
        Self { contract, options }
    }

    /// Get the options
    pub fn options(&self) -> &CorrelatorOptions {
        &self.options
    }

    /// Read one page from the scan start and match it. Read-only, so calling
    /// it twice against an unchanged contract gives the same answer.
    pub async fn correlate_once(&self, key: &CorrelationKey) -> Result<ProposalId> {
        let from_index = scan_start(key.baseline_proposal_id, self.options.window);
        debug!(
            "Correlating {} from index {} (baseline {})",
            key.expected_kind, from_index, key.baseline_proposal_id
        );

        let page = self
            .contract
            .list_proposals(from_index, self.options.page_size)
            .await?;
        match_page(&page, key, from_index, self.options.ambiguity)
    }

    /// Scan consecutive pages from the scan start until a page matches, the
    /// list ends, or `max_scan_pages` pages have been read.
    pub async fn scan(&self, key: &CorrelationKey) -> Result<ProposalId> {
        let from_index = scan_start(key.baseline_proposal_id, self.options.window);
        let page_size = self.options.page_size;
        let mut index = from_index;
        let mut scanned = 0;

        for page_number in 1..=self.options.max_scan_pages {
            let page = self.contract.list_proposals(index, page_size).await?;
            debug!(
                "Page {} from index {}: {} proposals",
                page_number,
                index,
                page.len()
            );

            if page.is_empty() && page_number == 1 {
                return Err(DaoClientError::EmptyWindow { from_index });
            }
            scanned += page.len();

            let ids = find_matches(&page, key);
            if !ids.is_empty() {
                return pick(ids, self.options.ambiguity);
            }

            // A short page is the end of the list
            if (page.len() as u64) < page_size {
                return Err(DaoClientError::NotFound {
                    kind: key.expected_kind.to_string(),
                    scanned,
                });
            }
            index = index.saturating_add(page_size);
        }

        Err(DaoClientError::WindowExhausted {
            from_index,
            pages: self.options.max_scan_pages,
        })
    }

    /// Scan until the proposal shows up, backing off between attempts.
    ///
    /// `EmptyWindow`, `NotFound` and `WindowExhausted` are retried until the
    /// timeout, then reported as [`DaoClientError::CorrelationTimeout`]. Other
    /// errors end the loop immediately.
    pub async fn resolve(&self, key: &CorrelationKey) -> Result<ProposalId> {
        info!(
            "Resolving {} proposal (baseline {}, timeout: {}s)",
            key.expected_kind, key.baseline_proposal_id, self.options.timeout_secs
        );

        let start = Instant::now();
        let timeout = Duration::from_secs(self.options.timeout_secs);
        let mut backoff = self.options.backoff();
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.scan(key).await {
                Ok(id) => {
                    info!(
                        "Resolved {} proposal {} after {} attempts",
                        key.expected_kind, id, attempts
                    );
                    return Ok(id);
                }
                Err(error) if error.is_pending_correlation() => {
                    let delay = match backoff.next_backoff() {
                        Some(delay) if start.elapsed() + delay <= timeout => delay,
                        _ => {
                            warn!(
                                "Correlation timed out after {} attempts: {}",
                                attempts, error
                            );
                            return Err(DaoClientError::CorrelationTimeout(
                                self.options.timeout_secs,
                            ));
                        }
                    };
                    debug!("{}. Scanning again in {:?}", error, delay);
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
