//! Per-run record of which items were promoted.
//!
//! Lives only as long as one run. Each tenant task owns its own
//! [`TenantProgress`]; the scheduler merges them into the run's ledger.

use std::collections::BTreeMap;

/// Outcomes for the items of one tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantProgress {
    tenant: String,
    items: BTreeMap<String, bool>,
}

impl TenantProgress {
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            items: BTreeMap::new(),
        }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Record that processing of `item` has started. Outcome starts false.
    pub fn begin(&mut self, item: &str) {
        self.items.insert(item.to_string(), false);
    }

    /// Record that `item` was promoted.
    pub fn mark_promoted(&mut self, item: &str) {
        self.items.insert(item.to_string(), true);
    }

    pub fn outcome(&self, item: &str) -> Option<bool> {
        self.items.get(item).copied()
    }

    /// Items attempted in this run.
    pub fn attempted(&self) -> usize {
        self.items.len()
    }

    pub fn promoted(&self) -> usize {
        self.items.values().filter(|&&done| done).count()
    }

    /// True when at least one item was attempted and every attempt was promoted.
    /// Only then may the tenant directory be removed.
    pub fn all_promoted(&self) -> bool {
        !self.items.is_empty() && self.items.values().all(|&done| done)
    }
}

/// Outcomes for every tenant seen in a run.
#[derive(Debug, Clone, Default)]
pub struct ProgressLedger {
    tenants: BTreeMap<String, TenantProgress>,
}

impl ProgressLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a finished tenant's outcomes.
    pub fn record(&mut self, progress: TenantProgress) {
        self.tenants.insert(progress.tenant.clone(), progress);
    }

    pub fn tenant(&self, tenant: &str) -> Option<&TenantProgress> {
        self.tenants.get(tenant)
    }

    pub fn outcome(&self, tenant: &str, item: &str) -> Option<bool> {
        self.tenants.get(tenant).and_then(|t| t.outcome(item))
    }

    pub fn tenants(&self) -> impl Iterator<Item = &TenantProgress> {
        self.tenants.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tenant_is_not_complete() {
        let progress = TenantProgress::new("acme");
        assert!(!progress.all_promoted());
        assert_eq!(progress.attempted(), 0);
    }

    #[test]
    fn test_all_promoted() {
        let mut progress = TenantProgress::new("acme");
        progress.begin("a");
        progress.begin("b");
        assert!(!progress.all_promoted());
        assert_eq!(progress.outcome("a"), Some(false));

        progress.mark_promoted("a");
        assert!(!progress.all_promoted());
        progress.mark_promoted("b");
        assert!(progress.all_promoted());
        assert_eq!(progress.promoted(), 2);
    }

    #[test]
    fn test_one_failure_blocks_cleanup() {
        let mut progress = TenantProgress::new("acme");
        progress.begin("a");
        progress.mark_promoted("a");
        progress.begin("b");
        assert!(!progress.all_promoted());
        assert_eq!(progress.attempted(), 2);
        assert_eq!(progress.promoted(), 1);
    }

    #[test]
    fn test_ledger_lookup() {
        let mut acme = TenantProgress::new("acme");
        acme.begin("a");
        acme.mark_promoted("a");

        let mut ledger = ProgressLedger::new();
        ledger.record(acme);
        ledger.record(TenantProgress::new("globex"));

        assert_eq!(ledger.outcome("acme", "a"), Some(true));
        assert_eq!(ledger.outcome("acme", "b"), None);
        assert_eq!(ledger.outcome("initech", "a"), None);
        assert_eq!(ledger.tenants().count(), 2);
        assert!(ledger.tenant("globex").is_some());
    }
}
