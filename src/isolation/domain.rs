//! Shared library domains.
//!
//! Domains are kept in an arena and looked up by name. Units refer to their
//! domain by [`DomainId`] only; the registry owns every boundary.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::isolation::IsolationConfigError;

/// Name of the process-wide default domain.
pub const DEFAULT_DOMAIN: &str = "default";

/// Index of a domain inside a [`DomainRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomainId(usize);

/// The libraries visible to every unit in one domain.
#[derive(Debug)]
pub struct DomainBoundary {
    name: String,
    libraries: BTreeSet<String>,
}

impl DomainBoundary {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contains(&self, library: &str) -> bool {
        self.libraries.contains(library)
    }

    pub fn libraries(&self) -> impl Iterator<Item = &str> {
        self.libraries.iter().map(String::as_str)
    }
}

/// Arena of domain boundaries keyed by domain name.
#[derive(Debug)]
pub struct DomainRegistry {
    shared_root: PathBuf,
    arena: RwLock<Vec<Arc<DomainBoundary>>>,
    index: DashMap<String, DomainId>,
}

impl DomainRegistry {
    /// Domains are scanned from `<shared_root>/<domain>/`.
    pub fn new(shared_root: impl Into<PathBuf>) -> Self {
        Self {
            shared_root: shared_root.into(),
            arena: RwLock::new(Vec::new()),
            index: DashMap::new(),
        }
    }

    /// Map a descriptor's domain reference to a registered boundary.
    ///
    /// Blank names and [`DEFAULT_DOMAIN`] resolve to the default domain, which
    /// always exists. Any other name must be a single path segment with a
    /// directory under the shared root, or have been registered explicitly.
    pub fn resolve(&self, name: Option<&str>) -> Result<DomainId, IsolationConfigError> {
        let name = match name.map(str::trim) {
            None | Some("") => DEFAULT_DOMAIN,
            Some(name) => name,
        };

        match self.index.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(*entry.get()),
            Entry::Vacant(entry) => {
                let dir = self.shared_root.join(name);
                if name != DEFAULT_DOMAIN && (!is_single_segment(name) || !dir.is_dir()) {
                    return Err(IsolationConfigError::UnknownDomain {
                        name: name.to_string(),
                        path: dir,
                    });
                }
                let libraries = scan_libraries(&dir)
                    .map_err(|source| IsolationConfigError::Io { path: dir, source })?;

                tracing::debug!(domain = %name, libraries = libraries.len(), "Domain registered");
                let id = self.push(name, libraries);
                entry.insert(id);
                Ok(id)
            }
        }
    }

    /// Register a domain without touching disk. Registering a known name
    /// replaces its library set in place and keeps its [`DomainId`].
    pub fn register<I, S>(&self, name: &str, libraries: I) -> DomainId
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let libraries = libraries.into_iter().map(Into::into).collect();
        match self.index.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                let id = *entry.get();
                let mut arena = self.arena.write().unwrap_or_else(|e| e.into_inner());
                arena[id.0] = Arc::new(DomainBoundary {
                    name: name.to_string(),
                    libraries,
                });
                id
            }
            Entry::Vacant(entry) => {
                let id = self.push(name, libraries);
                entry.insert(id);
                id
            }
        }
    }

    pub fn get(&self, id: DomainId) -> Option<Arc<DomainBoundary>> {
        let arena = self.arena.read().unwrap_or_else(|e| e.into_inner());
        arena.get(id.0).cloned()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn push(&self, name: &str, libraries: BTreeSet<String>) -> DomainId {
        let mut arena = self.arena.write().unwrap_or_else(|e| e.into_inner());
        arena.push(Arc::new(DomainBoundary {
            name: name.to_string(),
            libraries,
        }));
        DomainId(arena.len() - 1)
    }
}

/// Whether `name` is one plain directory name, with no root or `..`.
fn is_single_segment(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Library names (file stems) of the regular files in `dir`.
/// A missing directory holds no libraries.
pub(crate) fn scan_libraries(dir: &Path) -> io::Result<BTreeSet<String>> {
    let mut libraries = BTreeSet::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(libraries),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            libraries.insert(stem.to_string());
        }
    }
    Ok(libraries)
}
