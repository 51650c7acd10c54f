//! Run orchestration: locking, item processing, tenant scheduling and metrics.

mod ledger;
mod lock;
mod metrics;
mod processor;
mod scheduler;


pub use ledger::{ProgressLedger, TenantProgress};
pub use lock::RunLock;
pub use metrics::{Metrics, MetricsSnapshot};
pub use processor::{ItemProcessor, ItemResult};
pub use scheduler::{RunReport, RunStats, Scheduler, SchedulerConfig};
