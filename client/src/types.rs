//! Wire types shared with the governance and minting contracts.
//!
//! The JSON shapes here follow what the contracts emit: proposal kinds are
//! externally tagged (`{"MintRoot": {"id": 3}}`), balances are bare integers and
//! sale prices are yoctoNEAR strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Proposal identifier assigned by the governance contract
pub type ProposalId = u64;

/// Account identifier on the runtime (e.g. `alice.near`)
pub type AccountId = String;

/// Token identifier on a minting contract
pub type TokenId = String;

/// Index of a registered NFT in the DAO's income tables
pub type TreeIndex = u64;

/// Revenue shares in basis points, keyed by beneficiary
pub type RevenueShares = BTreeMap<AccountId, u64>;

/// Status of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    /// Voting has not concluded
    InProgress,
    /// Quorum voted yes
    Approved,
    /// Quorum voted no
    Rejected,
    /// Removed as spam
    Removed,
    /// Voting period elapsed
    Expired,
    /// Moved to another DAO
    Moved,
    /// Execution failed when finalizing
    Failed,
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Kind of membership a role grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleKind {
    /// Matches everyone
    Everyone,
    /// Members holding at least this many tokens (U128 string)
    Member(String),
    /// Explicit set of accounts
    Group(Vec<AccountId>),
}

/// A role in the DAO policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolePermission {
    /// Role name, e.g. `master_nft.example.near`
    pub name: String,
    /// Who belongs to the role
    pub kind: RoleKind,
    /// `<proposal label>:<action>` permissions
    pub permissions: Vec<String>,
    /// Per-proposal-kind vote policy overrides
    #[serde(default)]
    pub vote_policy: BTreeMap<String, Value>,
}

impl RolePermission {
    /// Whether this is a master group for a minting contract
    pub fn is_master_group(&self) -> bool {
        self.name.starts_with("master_")
    }

    /// Members of a group role, empty for other kinds
    pub fn members(&self) -> &[AccountId] {
        match &self.kind {
            RoleKind::Group(members) => members,
            _ => &[],
        }
    }
}

/// The subset of the DAO policy the client reads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// All roles in the policy
    pub roles: Vec<RolePermission>,
}

/// NFT data sent with prepare/update proposals. Any field except `contract`
/// may be missing while the artist is still uploading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftData {
    /// Minting contract the NFT will live on
    pub contract: AccountId,
    /// Title
    pub title: Option<String>,
    /// Description
    pub desc: Option<String>,
    /// Image IPFS CID
    pub image_cid: Option<String>,
    /// Music folder IPFS CID
    pub music_folder_cid: Option<String>,
    /// Animation URL (IPFS CID)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation_url: Option<String>,
    /// Metadata JSON IPFS CID
    pub meta_json_cid: Option<String>,
    /// Image content hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_hash: Option<String>,
    /// Music folder content hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_folder_hash: Option<String>,
    /// Metadata JSON content hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_json_hash: Option<String>,
    /// Animation content hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation_url_hash: Option<String>,
}

/// Proposal kinds this client builds and correlates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProposalKind {
    /// Add a member to a policy role
    AddMemberToRole {
        /// Account being added
        member_id: AccountId,
        /// Target role name
        role: String,
    },
    /// Add a role to the policy, or update it if it exists
    ChangePolicyAddOrUpdateRole {
        /// Role definition
        role: RolePermission,
    },
    /// Create an in-progress NFT entry
    PrepairNft {
        /// NFT data, may be incomplete
        nft_data: NftData,
    },
    /// Overwrite an in-progress NFT entry
    UpdatePrepairedNft {
        /// In-progress entry ID
        id: u64,
        /// Replacement data
        new_nft_data: NftData,
    },
    /// Mint a root NFT from a complete in-progress entry
    MintRoot {
        /// In-progress entry ID
        id: u64,
    },
    /// Create the revenue table of an already minted NFT
    CreateRevenueTable {
        /// Root token ID on the minting contract
        root_id: TokenId,
        /// Minting contract
        contract: AccountId,
        /// Shares in basis points
        unsafe_table: RevenueShares,
        /// Sale price in yoctoNEAR
        price: String,
    },
    /// Replace the revenue table of a registered NFT
    AlterRevenueTable {
        /// Income table index
        tree_index: TreeIndex,
        /// Shares in basis points
        unsafe_table: RevenueShares,
        /// Sale price in yoctoNEAR
        price: String,
    },
    /// Pay out accumulated revenue
    PayoutRevenue {
        /// Income tables to pay out
        tree_index_list: Vec<TreeIndex>,
    },
    /// Retry a failed payout to a different address
    ResendFailedTransaction {
        /// Failed transaction entry ID
        failed_id: u64,
        /// Replacement beneficiary
        new_address: AccountId,
    },
}

/// Tag of a [`ProposalKind`], used to filter proposal lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KindTag {
    /// `AddMemberToRole`
    AddMemberToRole,
    /// `ChangePolicyAddOrUpdateRole`
    ChangePolicyAddOrUpdateRole,
    /// `PrepairNft`
    PrepairNft,
    /// `UpdatePrepairedNft`
    UpdatePrepairedNft,
    /// `MintRoot`
    MintRoot,
    /// `CreateRevenueTable`
    CreateRevenueTable,
    /// `AlterRevenueTable`
    AlterRevenueTable,
    /// `PayoutRevenue`
    PayoutRevenue,
    /// `ResendFailedTransaction`
    ResendFailedTransaction,
}

impl KindTag {
    /// The tag as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            KindTag::AddMemberToRole => "AddMemberToRole",
            KindTag::ChangePolicyAddOrUpdateRole => "ChangePolicyAddOrUpdateRole",
            KindTag::PrepairNft => "PrepairNft",
            KindTag::UpdatePrepairedNft => "UpdatePrepairedNft",
            KindTag::MintRoot => "MintRoot",
            KindTag::CreateRevenueTable => "CreateRevenueTable",
            KindTag::AlterRevenueTable => "AlterRevenueTable",
            KindTag::PayoutRevenue => "PayoutRevenue",
            KindTag::ResendFailedTransaction => "ResendFailedTransaction",
        }
    }
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProposalKind {
    /// Returns the tag of this kind
    pub fn tag(&self) -> KindTag {
        match self {
            ProposalKind::AddMemberToRole { .. } => KindTag::AddMemberToRole,
            ProposalKind::ChangePolicyAddOrUpdateRole { .. } => {
                KindTag::ChangePolicyAddOrUpdateRole
            }
            ProposalKind::PrepairNft { .. } => KindTag::PrepairNft,
            ProposalKind::UpdatePrepairedNft { .. } => KindTag::UpdatePrepairedNft,
            ProposalKind::MintRoot { .. } => KindTag::MintRoot,
            ProposalKind::CreateRevenueTable { .. } => KindTag::CreateRevenueTable,
            ProposalKind::AlterRevenueTable { .. } => KindTag::AlterRevenueTable,
            ProposalKind::PayoutRevenue { .. } => KindTag::PayoutRevenue,
            ProposalKind::ResendFailedTransaction { .. } => KindTag::ResendFailedTransaction,
        }
    }

    /// The payload object under the tag, as JSON
    pub fn payload(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => map.remove(self.tag().as_str()).unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }
}

/// A proposal kind as listed by the contract. Kinds this client does not model
/// (transfers, upgrades, plain votes...) are kept as raw JSON and never match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListedKind {
    /// A kind this client understands
    Known(ProposalKind),
    /// Any other kind
    Unrecognized(Value),
}

impl ListedKind {
    /// Tag of a known kind
    pub fn tag(&self) -> Option<KindTag> {
        match self {
            ListedKind::Known(kind) => Some(kind.tag()),
            ListedKind::Unrecognized(_) => None,
        }
    }

    /// The known kind, if any
    pub fn known(&self) -> Option<&ProposalKind> {
        match self {
            ListedKind::Known(kind) => Some(kind),
            ListedKind::Unrecognized(_) => None,
        }
    }
}

/// Vote actions accepted by `act_proposal`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalAction {
    /// Vote to approve
    VoteApprove,
    /// Vote to reject
    VoteReject,
    /// Vote to remove as spam
    VoteRemove,
}

/// A proposal as returned by `get_proposals`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Proposal ID
    pub id: ProposalId,
    /// Original proposer
    pub proposer: AccountId,
    /// Free-form description
    pub description: String,
    /// Kind with its payload
    pub kind: ListedKind,
    /// Current status
    pub status: ProposalStatus,
    /// Who voted and how
    #[serde(default)]
    pub votes: BTreeMap<AccountId, Value>,
    /// Submission time in nanoseconds (U64 string)
    #[serde(default)]
    pub submission_time: String,
}

impl Proposal {
    /// Whether voting is still open
    pub fn is_in_progress(&self) -> bool {
        self.status == ProposalStatus::InProgress
    }
}

/// Argument of `add_proposal`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalInput {
    /// Description of this proposal
    pub description: String,
    /// Kind of proposal with relevant information
    pub kind: ProposalKind,
}

/// Result of a vote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteOutcome {
    /// Voted proposal
    pub proposal_id: ProposalId,
    /// Hash of the vote transaction
    pub transaction_hash: String,
    /// Value returned by the contract, usually null
    pub return_value: Value,
}

impl fmt::Display for VoteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Voted on proposal {} (tx {})",
            self.proposal_id, self.transaction_hash
        )
    }
}

/// An NFT being prepared for minting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InProgressMetadata {
    /// Entry ID
    pub id: u64,
    /// Creation timestamp (nanoseconds)
    pub initiated: u64,
    /// Usually the artist
    pub artist: AccountId,
    /// Minting contract
    pub contract: AccountId,
    /// Scheduled mint time
    pub scheduled: Option<u64>,
    /// Title
    pub title: Option<String>,
    /// Description
    pub desc: Option<String>,
    /// Metadata CID
    pub meta: Option<String>,
    /// Image CID
    pub image: Option<String>,
    /// Music folder CID
    pub music: Option<String>,
}

impl InProgressMetadata {
    /// Every field the mint needs is present and non-empty
    pub fn is_ready_for_mint(&self) -> bool {
        let filled = |field: &Option<String>| field.as_deref().is_some_and(|v| !v.is_empty());
        !self.contract.is_empty()
            && filled(&self.title)
            && filled(&self.desc)
            && filled(&self.image)
            && filled(&self.meta)
            && filled(&self.music)
    }
}

/// Income bookkeeping for one registered NFT
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeTable {
    /// Lifetime income in yoctoNEAR
    pub total_income: u128,
    /// Balance not yet paid out, in yoctoNEAR
    pub current_balance: u128,
    /// Root token ID
    pub root_id: TokenId,
    /// Minting contract
    pub contract: AccountId,
    /// Owner
    pub owner: AccountId,
    /// Sale price in yoctoNEAR
    #[serde(default)]
    pub price: Option<String>,
}

/// A payout the contract could not deliver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTransaction {
    /// Intended recipient
    pub beneficiary: AccountId,
    /// Amount in yoctoNEAR
    pub amount: u128,
}

/// Catalogue entry of an artist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogueEntry {
    /// Shares in basis points
    pub revenue_table: RevenueShares,
    /// Sale price in yoctoNEAR
    pub price: String,
}

/// Token metadata as stored by the minting contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    /// Title
    pub title: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Media CID
    pub media: Option<String>,
    /// Media hash
    #[serde(default)]
    pub media_hash: Option<String>,
    /// Number of copies
    #[serde(default)]
    pub copies: Option<u64>,
    /// Issue time
    #[serde(default)]
    pub issued_at: Option<u64>,
    /// JSON-encoded extra data (music CID, parent, generation)
    #[serde(default)]
    pub extra: Option<String>,
    /// Reference (metadata CID)
    #[serde(default)]
    pub reference: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_proposal_status_serde() {
        let status: ProposalStatus = serde_json::from_value(json!("InProgress")).unwrap();
        assert_eq!(status, ProposalStatus::InProgress);
        assert_eq!(ProposalStatus::Approved.to_string(), "Approved");
    }

    #[test]
    fn test_kind_wire_format() {
        let kind = ProposalKind::AddMemberToRole {
            member_id: "alice.near".to_string(),
            role: "master_nft.x.near".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&kind).unwrap(),
            json!({"AddMemberToRole": {"member_id": "alice.near", "role": "master_nft.x.near"}})
        );
        assert_eq!(kind.tag(), KindTag::AddMemberToRole);
        assert_eq!(kind.payload()["role"], "master_nft.x.near");
    }

    #[test]
    fn test_role_kind_wire_format() {
        let role = RolePermission {
            name: "master_nft.x.near".to_string(),
            kind: RoleKind::Group(vec![]),
            permissions: vec!["mint_root:*".to_string()],
            vote_policy: BTreeMap::new(),
        };
        let value = serde_json::to_value(&role).unwrap();
        assert_eq!(value["kind"], json!({"Group": []}));
        assert!(role.is_master_group());

        let everyone: RoleKind = serde_json::from_value(json!("Everyone")).unwrap();
        assert_eq!(everyone, RoleKind::Everyone);
    }

    #[test]
    fn test_proposal_with_unmodelled_kind() {
        let proposal: Proposal = serde_json::from_value(json!({
            "id": 7,
            "proposer": "council.near",
            "description": "pay the designer",
            "kind": {"Transfer": {"token_id": "", "receiver_id": "bob.near", "amount": "1", "msg": null}},
            "status": "InProgress",
            "vote_counts": {},
            "votes": {},
            "submission_time": "1650000000000000000"
        }))
        .unwrap();

        assert_eq!(proposal.id, 7);
        assert!(proposal.kind.tag().is_none());
        assert!(proposal.is_in_progress());

        let vote: Proposal = serde_json::from_value(json!({
            "id": 8,
            "proposer": "council.near",
            "description": "signal",
            "kind": "Vote",
            "status": "Approved"
        }))
        .unwrap();
        assert!(matches!(vote.kind, ListedKind::Unrecognized(_)));
    }

    #[test]
    fn test_prepair_nft_with_null_fields() {
        let proposal: Proposal = serde_json::from_value(json!({
            "id": 3,
            "proposer": "artist.near",
            "description": "Prepair NFT: Smiling Sun",
            "kind": {"PrepairNft": {"nft_data": {
                "contract": "nft.x.near",
                "title": "Smiling Sun",
                "desc": null,
                "image_cid": null,
                "music_folder_cid": null,
                "meta_json_cid": null
            }}},
            "status": "InProgress"
        }))
        .unwrap();

        assert_eq!(proposal.kind.tag(), Some(KindTag::PrepairNft));
        match proposal.kind.known() {
            Some(ProposalKind::PrepairNft { nft_data }) => {
                assert_eq!(nft_data.title.as_deref(), Some("Smiling Sun"));
                assert!(nft_data.desc.is_none());
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_in_progress_ready_for_mint() {
        let mut entry = InProgressMetadata {
            id: 1,
            initiated: 0,
            artist: "artist.near".to_string(),
            contract: "nft.x.near".to_string(),
            scheduled: None,
            title: Some("Smiling Sun".to_string()),
            desc: Some("A song".to_string()),
            meta: Some("QmMeta".to_string()),
            image: Some("QmImage".to_string()),
            music: Some("QmMusic".to_string()),
        };
        assert!(entry.is_ready_for_mint());

        entry.music = Some(String::new());
        assert!(!entry.is_ready_for_mint());
    }

    #[test]
    fn test_income_table_large_balances() {
        let table: IncomeTable = serde_json::from_str(
            r#"{"total_income": 5000000000000000000000000, "current_balance": 0,
                "root_id": "fono-root-0", "contract": "nft.x.near", "owner": "artist.near"}"#,
        )
        .unwrap();
        assert_eq!(table.total_income, 5 * 10u128.pow(24));
        assert!(table.price.is_none());
    }
}
