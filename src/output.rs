mod console;
mod json;

pub use console::ConsoleReporter;
pub use json::JsonReporter;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::drift::DriftResult;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Sink for drift results, invoked after they have been persisted.
pub trait Reporter: Send + Sync {
    fn name(&self) -> &str;

    fn report_drift(&self, result: &DriftResult) -> Result<(), ReportError>;

    fn report_multiple_drifts(&self, results: &[DriftResult]) -> Result<(), ReportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Console,
    Json,
}

pub fn reporter_for(format: OutputFormat) -> Arc<dyn Reporter> {
    match format {
        OutputFormat::Console => Arc::new(ConsoleReporter::stdout()),
        OutputFormat::Json => Arc::new(JsonReporter::stdout()),
    }
}
