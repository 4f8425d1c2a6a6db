use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use super::{ReportError, Reporter};
use crate::drift::DriftResult;

/// Writes results as pretty-printed JSON, one document per call.
pub struct JsonReporter<W> {
    out: Mutex<W>,
}

impl JsonReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn write<T: serde::Serialize + ?Sized>(&self, value: &T) -> Result<(), ReportError> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer_pretty(&mut *out, value)?;
        writeln!(out)?;
        out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> Reporter for JsonReporter<W> {
    fn name(&self) -> &str {
        "json"
    }

    fn report_drift(&self, result: &DriftResult) -> Result<(), ReportError> {
        self.write(result)
    }

    fn report_multiple_drifts(&self, results: &[DriftResult]) -> Result<(), ReportError> {
        self.write(results)
    }
}
