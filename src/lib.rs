//! Driftwatch - EC2 configuration drift detection
//!
//! Compares live EC2 instances against their Terraform state and reports attribute-level drift,
//! once or on a schedule.

pub mod compare;
pub mod config;
pub mod drift;
pub mod error;
pub mod instance;
pub mod orchestrator;
pub mod output;
pub mod providers;
pub mod scheduler;
pub mod store;
pub mod terraform;

pub use compare::{compare, compare_deep, compare_instances_deep};
pub use config::Config;
pub use drift::{AttributeDrift, DriftResult};
pub use error::{DriftError, ErrorKind};
pub use instance::{Instance, Origin};
pub use orchestrator::{DetectionSettings, DriftOrchestrator};
pub use output::{ConsoleReporter, JsonReporter, OutputFormat, Reporter};
pub use providers::{InstanceProvider, ProviderError};
pub use scheduler::{OverlapPolicy, Schedule, Scheduler};
pub use store::{ClearableRepository, DriftRepository, InMemoryDriftRepository, RepositoryError};
