//! Flat JSON file backend.
//!
//! The whole snapshot is rewritten on every mutation. A mutation holds an
//! exclusive OS lock on a sibling `.lock` file for the full
//! load-mutate-persist cycle, so the bot and the admin CLI can share one
//! file. Writes go to a uniquely named temp file in the same directory that
//! is then renamed over the original; readers never see a partial file.

use async_trait::async_trait;
use fs2::FileExt;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::RwLock;

use super::snapshot::Snapshot;
use super::{CredentialRecord, CredentialStore, GroupPolicy, GroupSummary};
use crate::error::StoreError;

pub struct JsonFileStore {
    path: PathBuf,
    policy: GroupPolicy,
    /// Orders mutations within this process before they queue on the file lock
    lock: RwLock<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>, policy: GroupPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Snapshot, StoreError> {
        match fs_err::tokio::read(&self.path).await {
            Ok(bytes) => Snapshot::from_json(&bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Snapshot::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Runs `f` against the current snapshot and persists the result if it
    /// succeeded. Nothing is written when `f` fails.
    async fn mutate<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Snapshot) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let _guard = self.lock.write().await;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || {
            let _file_lock = FileLock::acquire(&path)?;
            let mut snapshot = load_blocking(&path)?;
            let value = f(&mut snapshot)?;
            persist_blocking(&path, &snapshot)?;
            Ok(value)
        })
        .await?
    }
}

/// Exclusive advisory lock, released when the file is closed.
struct FileLock {
    _file: fs_err::File,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self, StoreError> {
        let file = fs_err::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path(path))?;
        file.file().lock_exclusive()?;
        Ok(Self { _file: file })
    }
}

fn load_blocking(path: &Path) -> Result<Snapshot, StoreError> {
    match fs_err::read(path) {
        Ok(bytes) => Snapshot::from_json(&bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Snapshot::default()),
        Err(e) => Err(e.into()),
    }
}

fn persist_blocking(path: &Path, snapshot: &Snapshot) -> Result<(), StoreError> {
    let bytes = snapshot.to_json()?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // Dropped (and deleted) on any error below
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

#[async_trait]
impl CredentialStore for JsonFileStore {
    async fn insert_if_absent(&self, group: &str, login: &str, digest: &str) -> Result<(), StoreError> {
        let policy = self.policy;
        let (g, l, d) = (group.to_string(), login.to_string(), digest.to_string());
        self.mutate(move |snapshot| snapshot.insert_if_absent(&g, &l, &d, policy))
            .await?;
        log::debug!("Stored new student {:?} in group {:?}", login, group);
        Ok(())
    }

    async fn find(&self, group: &str, login: &str) -> Result<CredentialRecord, StoreError> {
        let _guard = self.lock.read().await;
        self.load().await?.find(group, login)
    }

    async fn toggle(&self, group: &str, login: &str, value: bool) -> Result<(), StoreError> {
        let (group, login) = (group.to_string(), login.to_string());
        self.mutate(move |snapshot| snapshot.toggle(&group, &login, value)).await
    }

    async fn ensure_group(&self, group: &str, relevance: bool) -> Result<bool, StoreError> {
        let group = group.to_string();
        self.mutate(move |snapshot| Ok(snapshot.ensure_group(&group, relevance)))
            .await
    }

    async fn groups(&self) -> Result<Vec<GroupSummary>, StoreError> {
        let _guard = self.lock.read().await;
        Ok(self.load().await?.summaries())
    }
}
