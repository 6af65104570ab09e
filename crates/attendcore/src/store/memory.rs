use async_trait::async_trait;
use tokio::sync::RwLock;

use super::snapshot::Snapshot;
use super::{CredentialRecord, CredentialStore, GroupPolicy, GroupSummary};
use crate::error::StoreError;

/// In-process store. Contents are lost when the process exits.
pub struct MemoryStore {
    snapshot: RwLock<Snapshot>,
    policy: GroupPolicy,
}

impl MemoryStore {
    pub fn new(policy: GroupPolicy) -> Self {
        Self::with_snapshot(Snapshot::default(), policy)
    }

    /// Store pre-seeded with `snapshot`.
    pub fn with_snapshot(snapshot: Snapshot, policy: GroupPolicy) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
            policy,
        }
    }

    /// Copy of the current contents.
    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert_if_absent(&self, group: &str, login: &str, digest: &str) -> Result<(), StoreError> {
        self.snapshot
            .write()
            .await
            .insert_if_absent(group, login, digest, self.policy)
    }

    async fn find(&self, group: &str, login: &str) -> Result<CredentialRecord, StoreError> {
        self.snapshot.read().await.find(group, login)
    }

    async fn toggle(&self, group: &str, login: &str, value: bool) -> Result<(), StoreError> {
        self.snapshot.write().await.toggle(group, login, value)
    }

    async fn ensure_group(&self, group: &str, relevance: bool) -> Result<bool, StoreError> {
        Ok(self.snapshot.write().await.ensure_group(group, relevance))
    }

    async fn groups(&self) -> Result<Vec<GroupSummary>, StoreError> {
        Ok(self.snapshot.read().await.summaries())
    }
}
