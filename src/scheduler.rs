//! Timer-driven re-runs of bulk drift detection.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::DriftError;
use crate::orchestrator::DriftOrchestrator;

/// What a tick does when the previous scheduled run is still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Start another run alongside the active one.
    #[default]
    Allow,
    /// Log and skip the tick.
    Skip,
}

/// A parsed schedule expression.
///
/// Accepts 5-field cron (`*/5 * * * *`), 6/7-field cron with a leading seconds field, the
/// `@hourly`/`@daily`/... macros, and fixed intervals such as `@every 30s`.
#[derive(Debug)]
pub enum Schedule {
    Cron(cron::Schedule),
    Every(Duration),
}

impl Schedule {
    pub fn parse(expression: &str) -> Result<Self, DriftError> {
        let expression = expression.trim();

        if expression.is_empty() {
            return Err(DriftError::Validation(
                "schedule expression is empty".to_string(),
            ));
        }

        if let Some(interval) = expression.strip_prefix("@every") {
            return parse_interval(interval.trim()).map(Schedule::Every);
        }

        let normalized = if !expression.starts_with('@')
            && expression.split_whitespace().count() == 5
        {
            format!("0 {}", expression)
        } else {
            expression.to_string()
        };

        cron::Schedule::from_str(&normalized)
            .map(Schedule::Cron)
            .map_err(|e| DriftError::Validation(format!("invalid schedule '{}': {}", expression, e)))
    }

    /// Time from `now` until the next tick, if the schedule has one.
    pub fn next_delay(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            Schedule::Every(interval) => Some(*interval),
            Schedule::Cron(schedule) => schedule
                .after(&now)
                .next()
                .and_then(|next| (next - now).to_std().ok()),
        }
    }
}

fn parse_interval(text: &str) -> Result<Duration, DriftError> {
    let invalid = || DriftError::Validation(format!("invalid interval '@every {}'", text));

    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (digits, unit) = text.split_at(split);
    let value: u64 = digits.parse().map_err(|_| invalid())?;

    let interval = match unit.trim() {
        "ms" => Duration::from_millis(value),
        "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value * 60),
        "h" => Duration::from_secs(value * 3600),
        _ => return Err(invalid()),
    };

    if interval.is_zero() {
        return Err(invalid());
    }

    Ok(interval)
}

struct RunningSchedule {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Start/stop lifecycle around periodic [`DriftOrchestrator::detect_and_report_drift_for_all`]
/// runs. Tick failures are logged and never stop the schedule.
pub struct Scheduler {
    orchestrator: Arc<DriftOrchestrator>,
    running: Mutex<Option<RunningSchedule>>,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<DriftOrchestrator>) -> Self {
        Self {
            orchestrator,
            running: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<RunningSchedule>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts ticking on the orchestrator's current schedule expression.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(&self) -> Result<(), DriftError> {
        let settings = self.orchestrator.settings();
        let schedule = Schedule::parse(&settings.schedule)?;

        let mut running = self.lock();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return Err(DriftError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_schedule(
            Arc::clone(&self.orchestrator),
            schedule,
            settings.overlap,
            cancel.clone(),
        ));

        *running = Some(RunningSchedule { cancel, handle });

        tracing::info!(
            schedule = %settings.schedule,
            overlap = ?settings.overlap,
            "scheduler started"
        );

        Ok(())
    }

    /// Stops the schedule and cancels in-flight scheduled runs. No-op when not running.
    pub fn stop(&self) {
        if let Some(running) = self.lock().take() {
            running.cancel.cancel();
            tracing::info!("scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Clears the in-flight flag when a tick ends, including by panic.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

async fn run_schedule(
    orchestrator: Arc<DriftOrchestrator>,
    schedule: Schedule,
    overlap: OverlapPolicy,
    cancel: CancellationToken,
) {
    let active = Arc::new(AtomicBool::new(false));

    loop {
        let Some(delay) = schedule.next_delay(Utc::now()) else {
            tracing::warn!("schedule has no upcoming ticks");
            break;
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        if overlap == OverlapPolicy::Skip && active.swap(true, Ordering::SeqCst) {
            tracing::warn!("previous scheduled run still active, skipping tick");
            continue;
        }

        let orchestrator = Arc::clone(&orchestrator);
        let run_cancel = cancel.child_token();
        let guard = (overlap == OverlapPolicy::Skip).then(|| ActiveGuard(Arc::clone(&active)));

        tokio::spawn(async move {
            let _guard = guard;

            match orchestrator
                .detect_and_report_drift_for_all(&run_cancel, &[])
                .await
            {
                Ok(results) => {
                    let drifted = results.iter().filter(|r| r.has_drift()).count();
                    tracing::info!(
                        resources = results.len(),
                        drifted,
                        "scheduled drift detection complete"
                    );
                }
                Err(err) => {
                    tracing::error!(
                        error = %err,
                        kind = ?err.kind(),
                        "scheduled drift detection failed"
                    );
                }
            }
        });
    }
}
