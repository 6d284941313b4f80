//! Transactional registry mutation
//!
//! Every registry write happens inside a [`Transaction`], which holds the
//! exclusive writer lock from creation until drop. Changes accumulate in
//! a staged copy of the store; [`Transaction::checkpoint`] makes the
//! staged state durable by writing a staging file and renaming it over
//! the store, so a crash at any point leaves either the old store or the
//! new one, never a torn file. Dropping a transaction without a flush
//! discards whatever was staged since the last checkpoint and releases
//! the lock.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use fd_lock::RwLockWriteGuard;

use crate::core::registry::{
    InstalledEntry, RegistryStore, STAGING_FILE, STORE_FILE, STORE_VERSION,
};
use crate::core::spec::PackageSpec;
use crate::error::TransactionError;

/// An open registry transaction
pub struct Transaction<'a> {
    dir: &'a Path,
    live: &'a mut BTreeMap<PackageSpec, InstalledEntry>,
    staged: BTreeMap<PackageSpec, InstalledEntry>,
    dirty: bool,
    _guard: RwLockWriteGuard<'a, File>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(
        dir: &'a Path,
        live: &'a mut BTreeMap<PackageSpec, InstalledEntry>,
        guard: RwLockWriteGuard<'a, File>,
    ) -> Self {
        let staged = live.clone();
        Self {
            dir,
            live,
            staged,
            dirty: false,
            _guard: guard,
        }
    }

    /// True when `spec` is installed in the staged view.
    pub fn installed(&self, spec: &PackageSpec) -> bool {
        self.staged.contains_key(spec)
    }

    /// Staged entry for an exact concrete spec.
    pub fn get(&self, spec: &PackageSpec) -> Option<&InstalledEntry> {
        self.staged.get(spec)
    }

    /// Install prefix of a staged entry.
    pub fn prefix_of(&self, spec: &PackageSpec) -> Option<PathBuf> {
        self.staged.get(spec).map(|entry| entry.prefix.clone())
    }

    /// Stage an install record, maintaining mutual edges.
    ///
    /// Reinstalling a spec keeps its recorded dependents and rewrites its
    /// dependency edges. Any dependents on the passed entry are ignored;
    /// reverse edges are owned by the transaction.
    pub fn record_install(&mut self, mut entry: InstalledEntry) {
        let spec = entry.spec.clone();
        if let Some(previous) = self.staged.get(&spec) {
            entry.dependents = previous.dependents.clone();
            for dep in previous.dependencies.clone() {
                if let Some(dep_entry) = self.staged.get_mut(&dep) {
                    dep_entry.dependents.remove(&spec);
                }
            }
        } else {
            entry.dependents.clear();
        }
        for dep in entry.dependencies.clone() {
            if let Some(dep_entry) = self.staged.get_mut(&dep) {
                dep_entry.dependents.insert(spec.clone());
            }
        }
        self.staged.insert(spec, entry);
        self.dirty = true;
    }

    /// Stage removal of an install record, scrubbing edges on both sides.
    ///
    /// Returns false when the spec was not installed.
    pub fn record_uninstall(&mut self, spec: &PackageSpec) -> bool {
        let Some(removed) = self.staged.remove(spec) else {
            return false;
        };
        for dep in &removed.dependencies {
            if let Some(dep_entry) = self.staged.get_mut(dep) {
                dep_entry.dependents.remove(spec);
            }
        }
        for dependent in &removed.dependents {
            if let Some(dependent_entry) = self.staged.get_mut(dependent) {
                dependent_entry.dependencies.remove(spec);
            }
        }
        self.dirty = true;
        true
    }

    /// Make the staged state durable, keeping the lock.
    ///
    /// No-op when nothing changed since the last flush. On success the
    /// in-memory registry follows the durable state.
    pub fn checkpoint(&mut self) -> Result<(), TransactionError> {
        if !self.dirty {
            return Ok(());
        }
        let store = RegistryStore {
            version: STORE_VERSION,
            entries: self.staged.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&store).map_err(|e| {
            TransactionError::Serialize {
                error: e.to_string(),
            }
        })?;

        let staging_path = self.dir.join(STAGING_FILE);
        let store_path = self.dir.join(STORE_FILE);
        write_durable(&staging_path, json.as_bytes()).map_err(|e| TransactionError::Store {
            path: staging_path.clone(),
            error: e.to_string(),
        })?;
        fs::rename(&staging_path, &store_path).map_err(|e| TransactionError::Store {
            path: store_path,
            error: e.to_string(),
        })?;

        self.live.clone_from(&self.staged);
        self.dirty = false;
        tracing::debug!(entries = self.staged.len(), "registry store flushed");
        Ok(())
    }

    /// Flush and finish. The lock is released on return.
    pub fn commit(mut self) -> Result<(), TransactionError> {
        self.checkpoint()
    }

    /// Discard changes staged since the last checkpoint and release the
    /// lock. Dropping the transaction does the same.
    pub fn rollback(self) {
        drop(self);
    }
}

fn write_durable(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
