//! Session state that survives restarts.
//!
//! Between submitting a proposal and resolving its ID the user may reload the
//! page or restart the tool, so the baseline and the correlation key are kept in
//! a [`SessionStore`]. Keys are plain strings, values are strings or JSON.

use crate::correlator::CorrelationKey;
use crate::error::{DaoClientError, Result};
use crate::types::{KindTag, ProposalId};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

/// Baseline proposal ID read before the last submission
pub const LAST_PROPOSAL_ID: &str = "last_proposal_id";

/// JSON-encoded [`CorrelationKey`] awaiting resolution
pub const PENDING_CORRELATION: &str = "pending_correlation";

/// ID of the most recently resolved proposal
pub const RESOLVED_PROPOSAL_ID: &str = "resolved_proposal_id";

/// String key-value storage
pub trait SessionStore: Send + Sync {
    /// Value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key` if present
    fn remove(&self, key: &str) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| DaoClientError::Session("session lock poisoned".to_string()))
}

/// Store kept in memory, lost on exit
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.entries)?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.entries)?.remove(key);
        Ok(())
    }
}

/// Store backed by a JSON object on disk. The file is rewritten on every change.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileSessionStore {
    /// Use `path`; the file is created on the first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let raw = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = lock(&self.guard)?;
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = lock(&self.guard)?;
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = lock(&self.guard)?;
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

/// Session key holding the distinguishing value of a proposal family, with the
/// payload path the value is taken from.
pub fn family_session_key(kind: KindTag) -> Option<(&'static str, &'static str)> {
    match kind {
        KindTag::AddMemberToRole => Some(("group_name_when_registering", "role")),
        KindTag::ChangePolicyAddOrUpdateRole => Some(("name_of_the_new_group", "role.name")),
        KindTag::PrepairNft => Some(("nft_title_when_prepairing", "nft_data.title")),
        KindTag::UpdatePrepairedNft | KindTag::MintRoot => Some(("in_progress_id", "id")),
        KindTag::CreateRevenueTable => Some(("last_root_id", "root_id")),
        KindTag::AlterRevenueTable => Some(("tree_index", "tree_index")),
        KindTag::ResendFailedTransaction => Some(("failed_id", "failed_id")),
        KindTag::PayoutRevenue => None,
    }
}

/// Typed access to the correlation state in a [`SessionStore`]
#[derive(Clone)]
pub struct PersistedSession {
    store: Arc<dyn SessionStore>,
}

impl PersistedSession {
    /// Wrap a store
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Session kept in memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStore::new()))
    }

    /// Get the underlying store
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    fn get_id(&self, key: &str) -> Result<Option<ProposalId>> {
        match self.store.get(key)? {
            Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
                DaoClientError::Session(format!("{} is not a proposal ID: {:?}", key, raw))
            }),
            None => Ok(None),
        }
    }

    /// Baseline stored by the last submission
    pub fn last_proposal_id(&self) -> Result<Option<ProposalId>> {
        self.get_id(LAST_PROPOSAL_ID)
    }

    /// Most recently resolved proposal
    pub fn resolved_proposal_id(&self) -> Result<Option<ProposalId>> {
        self.get_id(RESOLVED_PROPOSAL_ID)
    }

    /// Remember a resolved proposal
    pub fn record_resolved(&self, proposal_id: ProposalId) -> Result<()> {
        self.store
            .set(RESOLVED_PROPOSAL_ID, &proposal_id.to_string())
    }

    /// Persist `key` with its baseline and family value, replacing any pending key
    pub fn save_correlation_key(&self, key: &CorrelationKey) -> Result<()> {
        if let Some(previous) = self.pending()? {
            if previous.token != key.token {
                warn!(
                    "Replacing unresolved {} correlation from {}",
                    previous.expected_kind, previous.created_at
                );
            }
        }

        self.store.set(
            LAST_PROPOSAL_ID,
            &key.baseline_proposal_id.to_string(),
        )?;

        if let Some((session_key, path)) = family_session_key(key.expected_kind) {
            match key.fields.get(path) {
                Some(Value::String(value)) => self.store.set(session_key, value)?,
                Some(other) => self.store.set(session_key, &other.to_string())?,
                None => self.store.remove(session_key)?,
            }
        }

        self.store
            .set(PENDING_CORRELATION, &serde_json::to_string(key)?)?;
        debug!(
            "Saved {} correlation key {}",
            key.expected_kind, key.token
        );
        Ok(())
    }

    /// Pending key, if any
    pub fn pending(&self) -> Result<Option<CorrelationKey>> {
        match self.store.get(PENDING_CORRELATION)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Pending key, or [`DaoClientError::NoPendingCorrelation`]
    pub fn load_correlation_key(&self) -> Result<CorrelationKey> {
        self.pending()?.ok_or(DaoClientError::NoPendingCorrelation)
    }

    /// Clear the pending key if its token is `token`. Returns whether it was cleared.
    pub fn invalidate(&self, token: &Uuid) -> Result<bool> {
        let key = match self.pending()? {
            Some(key) if key.token == *token => key,
            Some(key) => {
                debug!(
                    "Not invalidating correlation {}: pending key is {}",
                    token, key.token
                );
                return Ok(false);
            }
            None => return Ok(false),
        };

        self.store.remove(PENDING_CORRELATION)?;
        if let Some((session_key, _)) = family_session_key(key.expected_kind) {
            self.store.remove(session_key)?;
        }
        debug!("Invalidated correlation key {}", token);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlator::DistinguishingFields;
    use crate::types::ProposalKind;
    use assert_matches::assert_matches;

    fn mint_key(baseline: ProposalId, id: u64) -> CorrelationKey {
        CorrelationKey::for_kind(baseline, &ProposalKind::MintRoot { id })
    }

    #[test]
    fn test_memory_store() {
        let store = MemorySessionStore::new();
        assert_eq!(store.get("a").unwrap(), None);

        store.set("a", "1").unwrap();
        store.set("a", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));

        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        FileSessionStore::new(&path).set("last_proposal_id", "50").unwrap();

        let reopened = FileSessionStore::new(&path);
        assert_eq!(
            reopened.get("last_proposal_id").unwrap().as_deref(),
            Some("50")
        );
        reopened.remove("last_proposal_id").unwrap();
        assert_eq!(reopened.get("last_proposal_id").unwrap(), None);
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("absent.json"));
        assert_eq!(store.get("anything").unwrap(), None);
        store.remove("anything").unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"not json").unwrap();

        let store = FileSessionStore::new(file.path());
        assert_matches!(store.get("x"), Err(DaoClientError::Serialization(_)));
    }

    #[test]
    fn test_save_and_load_correlation_key() {
        let session = PersistedSession::in_memory();
        assert_matches!(
            session.load_correlation_key(),
            Err(DaoClientError::NoPendingCorrelation)
        );

        let key = mint_key(50, 7);
        session.save_correlation_key(&key).unwrap();

        assert_eq!(session.last_proposal_id().unwrap(), Some(50));
        assert_eq!(
            session.store().get("in_progress_id").unwrap().as_deref(),
            Some("7")
        );
        assert_eq!(session.load_correlation_key().unwrap(), key);
    }

    #[test]
    fn test_family_value_for_string_fields() {
        let session = PersistedSession::in_memory();
        let key = CorrelationKey::new(
            3,
            KindTag::AddMemberToRole,
            DistinguishingFields::new().with("role", "master_nft.x.near"),
        );
        session.save_correlation_key(&key).unwrap();

        assert_eq!(
            session
                .store()
                .get("group_name_when_registering")
                .unwrap()
                .as_deref(),
            Some("master_nft.x.near")
        );
    }

    #[test]
    fn test_invalidate_requires_matching_token() {
        let session = PersistedSession::in_memory();
        let key = mint_key(10, 1);
        session.save_correlation_key(&key).unwrap();

        assert!(!session.invalidate(&Uuid::new_v4()).unwrap());
        assert!(session.pending().unwrap().is_some());

        assert!(session.invalidate(&key.token).unwrap());
        assert!(session.pending().unwrap().is_none());
        assert_eq!(session.store().get("in_progress_id").unwrap(), None);

        // Already consumed
        assert!(!session.invalidate(&key.token).unwrap());
    }

    #[test]
    fn test_newer_key_is_not_cleared_by_older_token() {
        let session = PersistedSession::in_memory();
        let older = mint_key(10, 1);
        let newer = mint_key(12, 2);
        session.save_correlation_key(&older).unwrap();
        session.save_correlation_key(&newer).unwrap();

        assert!(!session.invalidate(&older.token).unwrap());
        assert_eq!(session.load_correlation_key().unwrap().token, newer.token);
    }

    #[test]
    fn test_session_on_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let key = mint_key(20, 4);

        PersistedSession::new(Arc::new(FileSessionStore::new(&path)))
            .save_correlation_key(&key)
            .unwrap();

        let restored = PersistedSession::new(Arc::new(FileSessionStore::new(&path)));
        assert_eq!(restored.load_correlation_key().unwrap(), key);
        restored.record_resolved(22).unwrap();
        assert_eq!(restored.resolved_proposal_id().unwrap(), Some(22));
    }
}
