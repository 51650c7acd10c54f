//! Walking the upload tree: `<root>/<tenant>/<item>/`.
//!
//! Only directories count at either level. Stray files are ignored. Entries
//! come back in directory-listing order, which the filesystem decides.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One tenant's upload subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantBatch {
    /// Tenant (schema) name
    pub name: String,

    /// `<root>/<tenant>`
    pub path: PathBuf,
}

/// One uploaded map awaiting processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapItem {
    /// Owning tenant
    pub tenant: String,

    /// Directory name, base64 of the item's store identifier
    pub name: String,

    /// `<root>/<tenant>/<item>`
    pub path: PathBuf,
}

impl MapItem {
    /// Where this item's pyramid lives under `storage_root`.
    pub fn destination(&self, storage_root: &Path) -> PathBuf {
        storage_root.join(&self.tenant).join(&self.name)
    }
}

/// Lazily list the subdirectories of `path`.
fn subdirectories(path: &Path) -> io::Result<impl Iterator<Item = io::Result<(String, PathBuf)>>> {
    let entries = fs::read_dir(path)?;

    Ok(entries.filter_map(|entry| {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => return Some(Err(e)),
        };
        match entry.file_type() {
            Ok(t) if t.is_dir() => {}
            Ok(_) => return None,
            Err(e) => return Some(Err(e)),
        }
        match entry.file_name().into_string() {
            Ok(name) => Some(Ok((name, entry.path()))),
            Err(raw) => {
                tracing::warn!("Skipping non UTF-8 directory name {:?}", raw);
                None
            }
        }
    }))
}

/// The upload root.
#[derive(Debug, Clone)]
pub struct UploadTree {
    root: PathBuf,
}

impl UploadTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Tenant directories directly under the root.
    pub fn tenants(&self) -> io::Result<impl Iterator<Item = io::Result<TenantBatch>>> {
        Ok(subdirectories(&self.root)?.map(|r| r.map(|(name, path)| TenantBatch { name, path })))
    }
}

impl TenantBatch {
    /// Item directories directly under this tenant.
    pub fn items(&self) -> io::Result<impl Iterator<Item = io::Result<MapItem>> + '_> {
        Ok(subdirectories(&self.path)?.map(move |r| {
            r.map(|(name, path)| MapItem {
                tenant: self.name.clone(),
                name,
                path,
            })
        }))
    }
}
