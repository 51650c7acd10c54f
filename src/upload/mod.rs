//! The upload tree: discovering tenants and items, and validating items.

mod tree;
mod validator;

pub use tree::{MapItem, TenantBatch, UploadTree};
pub use validator::ItemValidator;

use crate::error::ValidationError;
use std::path::Path;

/// Validation outcome of one item, as seen by a dry run.
#[derive(Debug)]
pub struct ScanEntry {
    pub item: MapItem,
    pub result: Result<(), ValidationError>,
}

/// Result of walking the upload tree without processing anything.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub tenants: usize,
    pub entries: Vec<ScanEntry>,
}

impl ScanReport {
    /// Items that would be processed.
    pub fn ready(&self) -> usize {
        self.entries.iter().filter(|e| e.result.is_ok()).count()
    }

    /// Items that would be skipped.
    pub fn rejected(&self) -> usize {
        self.entries.len() - self.ready()
    }
}

impl std::fmt::Display for ScanReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Tenants: {}, Items: {}, Ready: {}, Rejected: {}",
            self.tenants,
            self.entries.len(),
            self.ready(),
            self.rejected()
        )?;
        for entry in &self.entries {
            match &entry.result {
                Ok(()) => writeln!(f, "  {}/{}: ready", entry.item.tenant, entry.item.name)?,
                Err(e) => writeln!(f, "  {}/{}: {}", entry.item.tenant, entry.item.name, e)?,
            }
        }
        Ok(())
    }
}

/// Walk the tree and validate every item without touching anything.
pub fn scan(
    tree: &UploadTree,
    validator: &ItemValidator,
    storage_root: &Path,
) -> std::io::Result<ScanReport> {
    let mut report = ScanReport::default();

    for tenant in tree.tenants()? {
        let tenant = tenant?;
        report.tenants += 1;
        for item in tenant.items()? {
            let item = item?;
            let result = validator.validate(&item, &item.destination(storage_root));
            report.entries.push(ScanEntry { item, result });
        }
    }

    Ok(report)
}
