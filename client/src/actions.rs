//! Proposal builders for every governance action.
//!
//! Each builder validates its input before anything is sent, so malformed account
//! names, incomplete NFTs or unbalanced revenue tables are reported as
//! [`DaoClientError::InvalidInput`] instead of failing on-chain.

use crate::amount::parse_near_amount;
use crate::error::{DaoClientError, Result};
use crate::types::{
    InProgressMetadata, NftData, ProposalInput, ProposalKind, RevenueShares, RoleKind,
    RolePermission, TreeIndex,
};
use std::collections::BTreeMap;

/// Revenue shares must add up to this many basis points
pub const REVENUE_TABLE_TOTAL: u64 = 10_000;

/// Revenue tables must have fewer entries than this
pub const MAX_REVENUE_TABLE_ENTRIES: usize = 16;

/// Permissions granted to a newly created master group
pub const MASTER_GROUP_PERMISSIONS: [&str; 6] = [
    "mint_root:*",
    "prepair_nft:*",
    "update_prepaired_nft:*",
    "create_revenue_table:*",
    "alter_revenue_table:*",
    "payout_revenue:*",
];

/// Level of access a group grants on a minting contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupTier {
    /// Can mint on the contract
    Master,
    /// Collaborator with reduced rights
    Collab,
}

impl GroupTier {
    fn prefix(&self) -> &'static str {
        match self {
            GroupTier::Master => "master",
            GroupTier::Collab => "collab",
        }
    }
}

/// Check an account ID: 2 to 64 characters of `a-z`, `0-9`, `.`, `_` or `-`.
pub fn validate_account_id(field: &str, account_id: &str) -> Result<()> {
    let valid_chars = account_id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'));

    if account_id.len() < 2 || account_id.len() > 64 || !valid_chars {
        return Err(DaoClientError::InvalidInput(format!(
            "{} is not a valid account ID: {:?}",
            field, account_id
        )));
    }
    Ok(())
}

fn require_non_empty(field: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(DaoClientError::InvalidInput(format!(
            "{} cannot be empty",
            field
        ))),
    }
}

/// Group name for a minting contract, e.g. `master_nft.example.near`
pub fn group_name(tier: GroupTier, contract: &str) -> Result<String> {
    validate_account_id("contract", contract)?;
    Ok(format!("{}_{}", tier.prefix(), contract))
}

/// Check that shares sum to 100% and the table is within the size limit
pub fn validate_revenue_table(table: &RevenueShares) -> Result<()> {
    if table.len() >= MAX_REVENUE_TABLE_ENTRIES {
        return Err(DaoClientError::InvalidInput(format!(
            "Revenue table has {} entries, limit is {}",
            table.len(),
            MAX_REVENUE_TABLE_ENTRIES - 1
        )));
    }
    for account in table.keys() {
        validate_account_id("revenue table beneficiary", account)?;
    }

    let total = table
        .values()
        .try_fold(0u64, |acc, share| acc.checked_add(*share));
    if total != Some(REVENUE_TABLE_TOTAL) {
        return Err(DaoClientError::InvalidInput(format!(
            "Revenue table shares must add up to {} basis points",
            REVENUE_TABLE_TOTAL
        )));
    }
    Ok(())
}

/// Add `member_id` to `role`
pub fn register_user(member_id: &str, role: &str) -> Result<ProposalInput> {
    validate_account_id("member", member_id)?;
    require_non_empty("role", Some(role))?;

    Ok(ProposalInput {
        description: "Add Artist to master group (or collab to collab group)".to_string(),
        kind: ProposalKind::AddMemberToRole {
            member_id: member_id.to_string(),
            role: role.to_string(),
        },
    })
}

/// Create a master group with the minting permissions
pub fn create_group(group: &str) -> Result<ProposalInput> {
    require_non_empty("group name", Some(group))?;

    Ok(ProposalInput {
        description: format!("Create Master Group - {}", group),
        kind: ProposalKind::ChangePolicyAddOrUpdateRole {
            role: RolePermission {
                name: group.to_string(),
                kind: RoleKind::Group(Vec::new()),
                permissions: MASTER_GROUP_PERMISSIONS
                    .iter()
                    .map(|p| p.to_string())
                    .collect(),
                vote_policy: BTreeMap::new(),
            },
        },
    })
}

/// Create a new in-progress NFT entry. The title is required because it
/// identifies the proposal afterwards.
pub fn prepair_nft(nft_data: NftData) -> Result<ProposalInput> {
    validate_account_id("contract", &nft_data.contract)?;
    require_non_empty("title", nft_data.title.as_deref())?;

    Ok(ProposalInput {
        description: format!("Prepair NFT: {}", nft_data.title.as_deref().unwrap_or_default()),
        kind: ProposalKind::PrepairNft { nft_data },
    })
}

/// Overwrite the in-progress NFT entry `id`
pub fn update_nft(id: u64, new_nft_data: NftData) -> Result<ProposalInput> {
    validate_account_id("contract", &new_nft_data.contract)?;

    let label = new_nft_data
        .title
        .clone()
        .unwrap_or_else(|| format!("#{}", id));

    Ok(ProposalInput {
        description: format!("Update NFT: {}", label),
        kind: ProposalKind::UpdatePrepairedNft { id, new_nft_data },
    })
}

/// Mint the root NFT of in-progress entry `id`
pub fn mint_root(id: u64) -> ProposalInput {
    ProposalInput {
        description: format!("MintRoot. ID: {}", id),
        kind: ProposalKind::MintRoot { id },
    }
}

/// Mint an in-progress entry after checking it is complete
pub fn mint_root_from(entry: &InProgressMetadata) -> Result<ProposalInput> {
    if !entry.is_ready_for_mint() {
        return Err(DaoClientError::InvalidInput(format!(
            "In-progress NFT {} is missing data required for minting",
            entry.id
        )));
    }
    Ok(mint_root(entry.id))
}

/// Create the revenue table of a minted NFT. `price` is in NEAR.
pub fn create_revenue_table(
    root_id: &str,
    contract: &str,
    table: RevenueShares,
    price: &str,
) -> Result<ProposalInput> {
    require_non_empty("root ID", Some(root_id))?;
    validate_account_id("contract", contract)?;
    validate_revenue_table(&table)?;
    let price = parse_near_amount(price)?;

    Ok(ProposalInput {
        description: format!("Create Revenue Table for uniqID: {}-{}", contract, root_id),
        kind: ProposalKind::CreateRevenueTable {
            root_id: root_id.to_string(),
            contract: contract.to_string(),
            unsafe_table: table,
            price: price.to_string(),
        },
    })
}

/// Replace the revenue table of a registered NFT. `price` is in NEAR.
pub fn alter_revenue_table(
    tree_index: TreeIndex,
    table: RevenueShares,
    price: &str,
) -> Result<ProposalInput> {
    validate_revenue_table(&table)?;
    let price = parse_near_amount(price)?;

    Ok(ProposalInput {
        description: format!("Alter Revenue Table for treeIndex: {}", tree_index),
        kind: ProposalKind::AlterRevenueTable {
            tree_index,
            unsafe_table: table,
            price: price.to_string(),
        },
    })
}

/// Pay out the income tables in `tree_index_list`
pub fn payout(tree_index_list: Vec<TreeIndex>) -> Result<ProposalInput> {
    if tree_index_list.is_empty() {
        return Err(DaoClientError::InvalidInput(
            "Payout needs at least one tree index".to_string(),
        ));
    }

    let listed = tree_index_list
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(",");

    Ok(ProposalInput {
        description: format!("Payout the songs with the following TreeIndexes: {}", listed),
        kind: ProposalKind::PayoutRevenue { tree_index_list },
    })
}

/// Resend failed payout `failed_id` to `new_address`
pub fn resend_failed_transaction(failed_id: u64, new_address: &str) -> Result<ProposalInput> {
    validate_account_id("new address", new_address)?;

    Ok(ProposalInput {
        description: format!("Resend transaction with different address, ID: {}", failed_id),
        kind: ProposalKind::ResendFailedTransaction {
            failed_id,
            new_address: new_address.to_string(),
        },
    })
}
