//! Installed-package registry
//!
//! The registry is the authoritative record of what is installed: one
//! entry per concrete spec, with dependency edges kept mutually
//! consistent in both directions. It persists as a JSON store under
//! `<root>/registry/` and survives process restarts. All mutation goes
//! through [`Transaction`], which holds an exclusive file lock for the
//! whole batch.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::core::spec::PackageSpec;
use crate::core::transaction::Transaction;
use crate::error::{RegistryError, SpecError, TransactionError};

/// Store format version
pub(crate) const STORE_VERSION: u32 = 1;

/// Store file name inside the registry directory
pub(crate) const STORE_FILE: &str = "index.json";

/// Staging file the store is written to before the atomic rename
pub(crate) const STAGING_FILE: &str = "index.json.tmp";

/// Lock file serializing writers
pub(crate) const LOCK_FILE: &str = "index.lock";

/// One installed package record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstalledEntry {
    /// Concrete spec of the installed package
    pub spec: PackageSpec,
    /// Install prefix on disk
    pub prefix: PathBuf,
    /// Direct dependencies, as concrete specs
    #[serde(default)]
    pub dependencies: BTreeSet<PackageSpec>,
    /// Direct dependents, kept as the reverse of `dependencies`
    #[serde(default)]
    pub dependents: BTreeSet<PackageSpec>,
    /// Install time, seconds since the unix epoch
    pub installed_at: u64,
}

impl InstalledEntry {
    /// Create a record for a fresh install. The spec must be concrete.
    pub fn new(
        spec: PackageSpec,
        prefix: impl Into<PathBuf>,
        dependencies: BTreeSet<PackageSpec>,
    ) -> Result<Self, SpecError> {
        spec.ensure_concrete()?;
        Ok(Self {
            spec,
            prefix: prefix.into(),
            dependencies,
            dependents: BTreeSet::new(),
            installed_at: unix_timestamp(),
        })
    }
}

/// On-disk shape of the registry store
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RegistryStore {
    /// Store format version
    pub version: u32,
    /// All installed entries
    pub entries: Vec<InstalledEntry>,
}

/// Authoritative installed-package database
pub struct InstalledRegistry {
    dir: PathBuf,
    entries: BTreeMap<PackageSpec, InstalledEntry>,
    lock: fd_lock::RwLock<fs::File>,
}

impl InstalledRegistry {
    /// Open the registry under `dir`, creating an empty store if absent.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| RegistryError::CreateDir {
            path: dir.clone(),
            error: e.to_string(),
        })?;

        let store_path = dir.join(STORE_FILE);
        let entries = if store_path.exists() {
            let content = fs::read_to_string(&store_path).map_err(|e| RegistryError::Read {
                path: store_path.clone(),
                error: e.to_string(),
            })?;
            let store: RegistryStore =
                serde_json::from_str(&content).map_err(|e| RegistryError::Parse {
                    path: store_path.clone(),
                    error: e.to_string(),
                })?;
            if store.version != STORE_VERSION {
                return Err(RegistryError::UnsupportedVersion {
                    found: store.version,
                    expected: STORE_VERSION,
                });
            }
            store
                .entries
                .into_iter()
                .map(|entry| (entry.spec.clone(), entry))
                .collect()
        } else {
            BTreeMap::new()
        };

        let lock_path = dir.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| RegistryError::OpenLock {
                path: lock_path,
                error: e.to_string(),
            })?;

        Ok(Self {
            dir,
            entries,
            lock: fd_lock::RwLock::new(lock_file),
        })
    }

    /// Registry directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of installed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is installed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for an exact concrete spec.
    pub fn get(&self, spec: &PackageSpec) -> Option<&InstalledEntry> {
        self.entries.get(spec)
    }

    /// True when the exact concrete spec is installed.
    pub fn contains(&self, spec: &PackageSpec) -> bool {
        self.entries.contains_key(spec)
    }

    /// All entries, in spec order.
    pub fn entries(&self) -> impl Iterator<Item = &InstalledEntry> {
        self.entries.values()
    }

    /// All entries whose spec satisfies `query`, in spec order.
    ///
    /// A query matching nothing returns an empty list, never an error.
    pub fn query(&self, query: &PackageSpec) -> Vec<&InstalledEntry> {
        self.entries
            .values()
            .filter(|entry| entry.spec.satisfies(query))
            .collect()
    }

    /// Direct dependents of `spec`.
    pub fn dependents_of(&self, spec: &PackageSpec) -> BTreeSet<PackageSpec> {
        self.entries
            .get(spec)
            .map(|entry| entry.dependents.clone())
            .unwrap_or_default()
    }

    /// Number of direct dependents of `spec`.
    pub fn dependent_count(&self, spec: &PackageSpec) -> usize {
        self.entries
            .get(spec)
            .map_or(0, |entry| entry.dependents.len())
    }

    /// Dependents of `spec`, followed transitively.
    pub fn transitive_dependents(&self, spec: &PackageSpec) -> BTreeSet<PackageSpec> {
        let mut result = BTreeSet::new();
        let mut queue: VecDeque<PackageSpec> = self.dependents_of(spec).into_iter().collect();
        while let Some(current) = queue.pop_front() {
            if result.insert(current.clone()) {
                queue.extend(self.dependents_of(&current));
            }
        }
        result
    }

    /// Audit edge consistency, returning human-readable problems.
    ///
    /// A clean registry has every dependency installed and every edge
    /// mirrored by its reverse edge.
    pub fn verify(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (spec, entry) in &self.entries {
            if !entry.spec.is_concrete() {
                problems.push(format!("'{spec}' is recorded without a pinned version"));
            }
            for dep in &entry.dependencies {
                match self.entries.get(dep) {
                    None => problems.push(format!(
                        "'{spec}' depends on '{dep}' which is not installed"
                    )),
                    Some(dep_entry) if !dep_entry.dependents.contains(spec) => {
                        problems.push(format!(
                            "'{dep}' is missing the dependent edge back to '{spec}'"
                        ));
                    }
                    Some(_) => {}
                }
            }
            for dependent in &entry.dependents {
                match self.entries.get(dependent) {
                    None => problems.push(format!(
                        "'{spec}' lists dependent '{dependent}' which is not installed"
                    )),
                    Some(dependent_entry) if !dependent_entry.dependencies.contains(spec) => {
                        problems.push(format!(
                            "'{dependent}' is missing the dependency edge back to '{spec}'"
                        ));
                    }
                    Some(_) => {}
                }
            }
        }
        problems
    }

    /// Start a transaction, blocking until the writer lock is held.
    ///
    /// All mutation happens on the transaction; the registry itself only
    /// reflects staged changes once they are flushed.
    pub fn begin_transaction(&mut self) -> Result<Transaction<'_>, TransactionError> {
        let Self { dir, entries, lock } = self;
        let guard = lock.write().map_err(|e| TransactionError::Lock {
            path: dir.join(LOCK_FILE),
            error: e.to_string(),
        })?;
        Ok(Transaction::new(dir, entries, guard))
    }
}

impl fmt::Debug for InstalledRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstalledRegistry")
            .field("dir", &self.dir)
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Seconds since the unix epoch.
pub(crate) fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn spec(input: &str) -> PackageSpec {
        input.parse().unwrap()
    }

    fn write_store(dir: &Path, json: &str) {
        fs::write(dir.join(STORE_FILE), json).unwrap();
    }

    #[test]
    fn test_load_creates_empty_registry() {
        let temp = TempDir::new().unwrap();
        let registry = InstalledRegistry::load(temp.path().join("registry")).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(temp.path().join("registry").join(LOCK_FILE).exists());
    }

    #[test]
    fn test_load_reads_existing_store() {
        let temp = TempDir::new().unwrap();
        write_store(
            temp.path(),
            r#"{"version":1,"entries":[
                {"spec":"openblas@0.3.24","prefix":"/opt/openblas","dependencies":[],"dependents":["fftw@3.3.10"],"installed_at":100},
                {"spec":"fftw@3.3.10","prefix":"/opt/fftw","dependencies":["openblas@0.3.24"],"dependents":[],"installed_at":200}
            ]}"#,
        );
        let registry = InstalledRegistry::load(temp.path()).unwrap();
        assert_eq!(registry.len(), 2);
        let entry = registry.get(&spec("fftw@3.3.10")).unwrap();
        assert_eq!(entry.prefix, PathBuf::from("/opt/fftw"));
        assert!(entry.dependencies.contains(&spec("openblas@0.3.24")));
        assert!(registry.verify().is_empty());
    }

    #[test]
    fn test_load_rejects_unsupported_store_version() {
        let temp = TempDir::new().unwrap();
        write_store(temp.path(), r#"{"version":99,"entries":[]}"#);
        let err = InstalledRegistry::load(temp.path()).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::UnsupportedVersion {
                found: 99,
                expected: STORE_VERSION
            }
        ));
    }

    #[test]
    fn test_load_rejects_corrupt_store() {
        let temp = TempDir::new().unwrap();
        write_store(temp.path(), "not json at all");
        let err = InstalledRegistry::load(temp.path()).unwrap_err();
        assert!(matches!(err, RegistryError::Parse { .. }));
    }

    #[test]
    fn test_query_returns_empty_for_no_match() {
        let temp = TempDir::new().unwrap();
        let registry = InstalledRegistry::load(temp.path()).unwrap();
        assert!(registry.query(&spec("nothing")).is_empty());
    }

    #[test]
    fn test_query_filters_by_satisfaction() {
        let temp = TempDir::new().unwrap();
        write_store(
            temp.path(),
            r#"{"version":1,"entries":[
                {"spec":"openblas@0.3.21+shared","prefix":"/a","dependencies":[],"dependents":[],"installed_at":1},
                {"spec":"openblas@0.3.24~shared","prefix":"/b","dependencies":[],"dependents":[],"installed_at":2},
                {"spec":"lapack@3.11.0","prefix":"/c","dependencies":[],"dependents":[],"installed_at":3}
            ]}"#,
        );
        let registry = InstalledRegistry::load(temp.path()).unwrap();

        assert_eq!(registry.query(&spec("openblas")).len(), 2);
        assert_eq!(registry.query(&spec("openblas+shared")).len(), 1);
        assert_eq!(registry.query(&spec("openblas@0.3.24")).len(), 1);
        assert_eq!(registry.query(&spec("hdf5")).len(), 0);
    }

    #[test]
    fn test_dependents_and_transitive_dependents() {
        let temp = TempDir::new().unwrap();
        write_store(
            temp.path(),
            r#"{"version":1,"entries":[
                {"spec":"zlib@1.3","prefix":"/z","dependencies":[],"dependents":["hdf5@1.14.3"],"installed_at":1},
                {"spec":"hdf5@1.14.3","prefix":"/h","dependencies":["zlib@1.3"],"dependents":["netcdf@4.9.2"],"installed_at":2},
                {"spec":"netcdf@4.9.2","prefix":"/n","dependencies":["hdf5@1.14.3"],"dependents":[],"installed_at":3}
            ]}"#,
        );
        let registry = InstalledRegistry::load(temp.path()).unwrap();

        let direct = registry.dependents_of(&spec("zlib@1.3"));
        assert_eq!(direct.len(), 1);
        assert!(direct.contains(&spec("hdf5@1.14.3")));
        assert_eq!(registry.dependent_count(&spec("zlib@1.3")), 1);

        let transitive = registry.transitive_dependents(&spec("zlib@1.3"));
        assert_eq!(transitive.len(), 2);
        assert!(transitive.contains(&spec("netcdf@4.9.2")));

        assert!(registry.dependents_of(&spec("missing@1.0")).is_empty());
    }

    #[test]
    fn test_verify_reports_edge_inconsistencies() {
        let temp = TempDir::new().unwrap();
        write_store(
            temp.path(),
            r#"{"version":1,"entries":[
                {"spec":"a@1.0","prefix":"/a","dependencies":["ghost@1.0"],"dependents":[],"installed_at":1},
                {"spec":"b@1.0","prefix":"/b","dependencies":["a@1.0"],"dependents":[],"installed_at":2}
            ]}"#,
        );
        let registry = InstalledRegistry::load(temp.path()).unwrap();
        let problems = registry.verify();
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().any(|p| p.contains("ghost@1.0")));
        assert!(problems
            .iter()
            .any(|p| p.contains("missing the dependent edge")));
    }

    #[test]
    fn test_installed_entry_requires_concrete_spec() {
        let err = InstalledEntry::new(spec("fftw"), "/opt/fftw", BTreeSet::new()).unwrap_err();
        assert!(matches!(err, SpecError::NotConcrete { .. }));

        let entry = InstalledEntry::new(spec("fftw@3.3.10"), "/opt/fftw", BTreeSet::new()).unwrap();
        assert_eq!(entry.spec, spec("fftw@3.3.10"));
        assert!(entry.dependents.is_empty());
    }
}
