use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use termtree::Tree;

use super::{ReportError, Reporter};
use crate::drift::DriftResult;

const ABSENT: &str = "<absent>";

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Drift")]
    drift: String,
    #[tabled(rename = "Attributes")]
    attributes: String,
}

impl From<&DriftResult> for SummaryRow {
    fn from(result: &DriftResult) -> Self {
        Self {
            resource: result.resource_id().to_string(),
            resource_type: result.resource_type().to_string(),
            source: result.source_type().to_string(),
            drift: if result.has_drift() { "yes" } else { "no" }.to_string(),
            attributes: result
                .drifted_attributes()
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Human-readable reporter: a summary table plus a tree of drifted attributes per resource.
pub struct ConsoleReporter<W> {
    out: Mutex<W>,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, text: &str) -> Result<(), ReportError> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "{}", text)?;
        out.flush()?;
        Ok(())
    }
}

fn render_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => ABSENT.to_string(),
    }
}

fn render_tree(result: &DriftResult) -> String {
    let root = format!(
        "{} ({}, source of truth: {})",
        result.resource_id(),
        result.resource_type(),
        result.source_type()
    );

    let leaves: Vec<String> = result
        .drifted_attributes()
        .values()
        .map(|drift| {
            format!(
                "{}: {} -> {}",
                drift.path,
                render_value(drift.source_value.as_ref()),
                render_value(drift.target_value.as_ref())
            )
        })
        .collect();

    Tree::new(root).with_leaves(leaves).to_string()
}

fn render_result(result: &DriftResult) -> String {
    if result.has_drift() {
        render_tree(result)
    } else {
        format!("{} ({}): no drift", result.resource_id(), result.resource_type())
    }
}

impl<W: Write + Send> Reporter for ConsoleReporter<W> {
    fn name(&self) -> &str {
        "console"
    }

    fn report_drift(&self, result: &DriftResult) -> Result<(), ReportError> {
        self.write(&render_result(result))
    }

    fn report_multiple_drifts(&self, results: &[DriftResult]) -> Result<(), ReportError> {
        if results.is_empty() {
            return self.write("No resources checked.");
        }

        let mut sorted: Vec<&DriftResult> = results.iter().collect();
        sorted.sort_by(|a, b| a.resource_id().cmp(b.resource_id()));

        let mut table = Table::new(sorted.iter().map(|r| SummaryRow::from(*r)));
        table.with(Style::rounded());

        let mut text = table.to_string();
        for result in sorted.iter().filter(|r| r.has_drift()) {
            text.push_str("\n\n");
            text.push_str(&render_tree(result));
        }

        let drifted = sorted.iter().filter(|r| r.has_drift()).count();
        text.push_str(&format!(
            "\n\n{} of {} resources drifted",
            drifted,
            sorted.len()
        ));

        self.write(&text)
    }
}
