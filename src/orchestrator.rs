//! Fans drift detection out across resources from both origins.
//!
//! Every call snapshots the live-tunable settings when it starts, so setters only affect the
//! next invocation. Calls are bounded by the configured timeout and by the caller's
//! [`CancellationToken`].

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::compare::compare;
use crate::config::DetectionConfig;
use crate::drift::DriftResult;
use crate::error::DriftError;
use crate::instance::{Instance, Origin, default_attribute_paths};
use crate::output::Reporter;
use crate::providers::{InstanceProvider, ProviderError};
use crate::scheduler::OverlapPolicy;
use crate::store::DriftRepository;

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSettings {
    pub source_of_truth: Origin,
    pub attribute_paths: Vec<String>,
    pub parallelism: usize,
    pub timeout: Duration,
    pub schedule: String,
    pub overlap: OverlapPolicy,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        DetectionSettings::from(&DetectionConfig::default())
    }
}

impl From<&DetectionConfig> for DetectionSettings {
    fn from(config: &DetectionConfig) -> Self {
        Self {
            source_of_truth: config.source_of_truth,
            attribute_paths: config.attribute_paths.clone(),
            parallelism: config.parallelism.max(1),
            timeout: Duration::from_secs(config.timeout_secs),
            schedule: config.schedule.clone().unwrap_or_default(),
            overlap: config.overlap,
        }
    }
}

impl DetectionSettings {
    /// Paths for one run: explicit paths, else configured paths, else the default EC2 set.
    fn resolve_paths(&self, paths: &[String]) -> Vec<String> {
        if !paths.is_empty() {
            paths.to_vec()
        } else if !self.attribute_paths.is_empty() {
            self.attribute_paths.clone()
        } else {
            default_attribute_paths()
        }
    }
}

pub struct DriftOrchestrator {
    aws: Arc<dyn InstanceProvider>,
    terraform: Arc<dyn InstanceProvider>,
    repository: Arc<dyn DriftRepository>,
    reporters: Vec<Arc<dyn Reporter>>,
    settings: RwLock<DetectionSettings>,
}

impl DriftOrchestrator {
    pub fn new(
        aws: Arc<dyn InstanceProvider>,
        terraform: Arc<dyn InstanceProvider>,
        repository: Arc<dyn DriftRepository>,
        settings: DetectionSettings,
    ) -> Self {
        Self {
            aws,
            terraform,
            repository,
            reporters: Vec::new(),
            settings: RwLock::new(settings),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    pub fn repository(&self) -> &Arc<dyn DriftRepository> {
        &self.repository
    }

    fn read_settings(&self) -> RwLockReadGuard<'_, DetectionSettings> {
        self.settings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_settings(&self) -> RwLockWriteGuard<'_, DetectionSettings> {
        self.settings.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current settings, as a run started now would see them.
    pub fn settings(&self) -> DetectionSettings {
        self.read_settings().clone()
    }

    pub fn source_of_truth(&self) -> Origin {
        self.read_settings().source_of_truth
    }

    pub fn set_source_of_truth(&self, origin: Origin) {
        self.write_settings().source_of_truth = origin;
    }

    pub fn attribute_paths(&self) -> Vec<String> {
        self.read_settings().attribute_paths.clone()
    }

    pub fn set_attribute_paths(&self, paths: Vec<String>) {
        self.write_settings().attribute_paths = paths;
    }

    pub fn parallelism(&self) -> usize {
        self.read_settings().parallelism
    }

    pub fn set_parallelism(&self, parallelism: usize) -> Result<(), DriftError> {
        if parallelism == 0 {
            return Err(DriftError::Validation(
                "parallelism must be at least 1".to_string(),
            ));
        }
        self.write_settings().parallelism = parallelism;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        self.read_settings().timeout
    }

    pub fn set_timeout(&self, timeout: Duration) -> Result<(), DriftError> {
        if timeout.is_zero() {
            return Err(DriftError::Validation(
                "timeout must be greater than zero".to_string(),
            ));
        }
        self.write_settings().timeout = timeout;
        Ok(())
    }

    pub fn schedule(&self) -> String {
        self.read_settings().schedule.clone()
    }

    pub fn set_schedule(&self, schedule: impl Into<String>) {
        self.write_settings().schedule = schedule.into();
    }

    pub fn overlap_policy(&self) -> OverlapPolicy {
        self.read_settings().overlap
    }

    pub fn set_overlap_policy(&self, overlap: OverlapPolicy) {
        self.write_settings().overlap = overlap;
    }

    /// Compares one resource across both origins and persists the result.
    ///
    /// Both sides must be fetched successfully; a one-sided result is not a meaningful comparison.
    pub async fn detect_drift_by_id(
        &self,
        cancel: &CancellationToken,
        resource_id: &str,
        paths: &[String],
    ) -> Result<DriftResult, DriftError> {
        let settings = self.settings();
        let paths = settings.resolve_paths(paths);

        bounded(cancel, settings.timeout, async {
            let (aws, terraform) = self.fetch_pair(resource_id).await?;
            let result = compare_pair(resource_id, &aws, &terraform, &paths, settings.source_of_truth);
            persist(self.repository.as_ref(), &result).await?;

            tracing::info!(
                resource_id = %resource_id,
                has_drift = result.has_drift(),
                drifted = result.drifted_attributes().len(),
                "drift detection complete"
            );

            Ok::<_, DriftError>(result)
        })
        .await
    }

    /// Compares every resource known to either origin.
    ///
    /// Per-resource failures do not stop the run; they are returned together with the successful
    /// results as [`DriftError::PartialFailure`]. Result order is unspecified.
    pub async fn detect_drift_for_all(
        &self,
        cancel: &CancellationToken,
        paths: &[String],
    ) -> Result<Vec<DriftResult>, DriftError> {
        let settings = self.settings();
        let paths = Arc::new(settings.resolve_paths(paths));

        bounded(cancel, settings.timeout, self.run_all(&settings, paths)).await
    }

    pub async fn detect_and_report_drift_by_id(
        &self,
        cancel: &CancellationToken,
        resource_id: &str,
        paths: &[String],
    ) -> Result<DriftResult, DriftError> {
        let result = self.detect_drift_by_id(cancel, resource_id, paths).await?;
        self.report(|reporter| reporter.report_drift(&result))?;
        Ok(result)
    }

    /// Bulk detection followed by reporting. Partial results are reported before the partial
    /// failure is returned.
    pub async fn detect_and_report_drift_for_all(
        &self,
        cancel: &CancellationToken,
        paths: &[String],
    ) -> Result<Vec<DriftResult>, DriftError> {
        match self.detect_drift_for_all(cancel, paths).await {
            Ok(results) => {
                self.report(|reporter| reporter.report_multiple_drifts(&results))?;
                Ok(results)
            }
            Err(err) => {
                if let DriftError::PartialFailure { results, .. } = &err {
                    self.report(|reporter| reporter.report_multiple_drifts(results))?;
                }
                Err(err)
            }
        }
    }

    /// Drops all stored history, if the repository supports it.
    pub async fn clear_history(&self) -> Result<(), DriftError> {
        let clearable = self.repository.as_clearable().ok_or_else(|| {
            DriftError::Validation("repository does not support clearing".to_string())
        })?;
        clearable.clear().await?;
        Ok(())
    }

    fn report<F>(&self, mut send: F) -> Result<(), DriftError>
    where
        F: FnMut(&dyn Reporter) -> Result<(), crate::output::ReportError>,
    {
        let mut first_error = None;

        for reporter in &self.reporters {
            if let Err(source) = send(reporter.as_ref()) {
                tracing::warn!(reporter = reporter.name(), error = %source, "reporter failed");
                first_error.get_or_insert(DriftError::Report {
                    reporter: reporter.name().to_string(),
                    source,
                });
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn fetch_pair(&self, resource_id: &str) -> Result<(Instance, Instance), DriftError> {
        let (aws, terraform) = tokio::join!(
            self.aws.get_instance(resource_id),
            self.terraform.get_instance(resource_id)
        );

        match (aws, terraform) {
            (Ok(aws), Ok(terraform)) => Ok((aws, terraform)),
            (Err(ProviderError::NotFound(_)), Err(ProviderError::NotFound(_))) => {
                tracing::warn!(resource_id = %resource_id, "instance unknown to both origins");
                Err(DriftError::ResourceNotFound {
                    resource_id: resource_id.to_string(),
                })
            }
            (Err(aws), Err(terraform)) => {
                tracing::warn!(resource_id = %resource_id, "fetch failed on both origins");
                Err(DriftError::FetchBoth {
                    resource_id: resource_id.to_string(),
                    aws,
                    terraform,
                })
            }
            (Err(err), Ok(_)) => Err(fetch_error(resource_id, Origin::Aws, err)),
            (Ok(_), Err(err)) => Err(fetch_error(resource_id, Origin::Terraform, err)),
        }
    }

    async fn list_pair(&self) -> Result<(Vec<Instance>, Vec<Instance>), DriftError> {
        let (aws, terraform) = tokio::join!(
            self.aws.list_instances(),
            self.terraform.list_instances()
        );

        match (aws, terraform) {
            (Ok(aws), Ok(terraform)) => Ok((aws, terraform)),
            (Err(aws), Err(terraform)) => Err(DriftError::ListBoth { aws, terraform }),
            (Err(source), Ok(_)) => Err(DriftError::List {
                origin: Origin::Aws,
                source,
            }),
            (Ok(_), Err(source)) => Err(DriftError::List {
                origin: Origin::Terraform,
                source,
            }),
        }
    }

    async fn run_all(
        &self,
        settings: &DetectionSettings,
        paths: Arc<Vec<String>>,
    ) -> Result<Vec<DriftResult>, DriftError> {
        let (aws, terraform) = self.list_pair().await?;
        let mut aws = index_by_id(aws, Origin::Aws);
        let mut terraform = index_by_id(terraform, Origin::Terraform);

        let ids: BTreeSet<String> = aws.keys().chain(terraform.keys()).cloned().collect();
        let total = ids.len();
        let truth = settings.source_of_truth;

        tracing::info!(
            resources = total,
            parallelism = settings.parallelism,
            "starting bulk drift detection"
        );

        let semaphore = Arc::new(Semaphore::new(settings.parallelism));
        let mut workers = JoinSet::new();

        for id in ids {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| DriftError::Task(e.to_string()))?;

            let pair = (aws.remove(&id), terraform.remove(&id));
            let repository = Arc::clone(&self.repository);
            let paths = Arc::clone(&paths);

            workers.spawn(async move {
                let _permit = permit;

                let result = match pair {
                    (Some(aws), Some(terraform)) => {
                        compare_pair(&id, &aws, &terraform, &paths, truth)
                    }
                    (Some(_), None) => DriftResult::existence(&id, truth, Origin::Aws),
                    (None, _) => DriftResult::existence(&id, truth, Origin::Terraform),
                };

                persist(repository.as_ref(), &result).await?;
                Ok::<_, DriftError>(result)
            });
        }

        let mut results = Vec::with_capacity(total);
        let mut errors = Vec::new();

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(result)) => results.push(result),
                Ok(Err(err)) => errors.push(err),
                Err(err) => errors.push(DriftError::Task(err.to_string())),
            }
        }

        let drifted = results.iter().filter(|r| r.has_drift()).count();

        if errors.is_empty() {
            tracing::info!(resources = total, drifted, "bulk drift detection complete");
            return Ok(results);
        }

        tracing::warn!(
            resources = total,
            failed = errors.len(),
            drifted,
            "bulk drift detection finished with failures"
        );

        Err(DriftError::PartialFailure {
            failed: errors.len(),
            total,
            results,
            errors,
        })
    }
}

/// Runs `work` under the timeout, racing the caller's cancellation.
async fn bounded<T, F>(
    cancel: &CancellationToken,
    timeout: Duration,
    work: F,
) -> Result<T, DriftError>
where
    F: Future<Output = Result<T, DriftError>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(DriftError::Cancelled),
        outcome = tokio::time::timeout(timeout, work) => {
            outcome.map_err(|_| DriftError::Timeout(timeout))?
        }
    }
}

fn fetch_error(resource_id: &str, origin: Origin, err: ProviderError) -> DriftError {
    tracing::warn!(resource_id = %resource_id, origin = %origin, error = %err, "fetch failed");

    match err {
        ProviderError::NotFound(_) => DriftError::InstanceNotFound {
            resource_id: resource_id.to_string(),
            origin,
        },
        source => DriftError::Fetch {
            resource_id: resource_id.to_string(),
            origin,
            source,
        },
    }
}

fn index_by_id(instances: Vec<Instance>, origin: Origin) -> HashMap<String, Instance> {
    let mut indexed = HashMap::with_capacity(instances.len());

    for instance in instances {
        if instance.id().is_empty() {
            tracing::warn!(origin = %origin, "skipping instance without id");
            continue;
        }
        if indexed.contains_key(instance.id()) {
            tracing::warn!(
                resource_id = %instance.id(),
                origin = %origin,
                "duplicate instance id, keeping first"
            );
            continue;
        }
        indexed.insert(instance.id().to_string(), instance);
    }

    indexed
}

/// Labels the two sides by source of truth and runs the comparator.
fn compare_pair(
    resource_id: &str,
    aws: &Instance,
    terraform: &Instance,
    paths: &[String],
    source_of_truth: Origin,
) -> DriftResult {
    let (source, target) = match source_of_truth {
        Origin::Aws => (aws, terraform),
        Origin::Terraform => (terraform, aws),
    };

    DriftResult::new(resource_id, source_of_truth).with_drifts(compare(source, target, paths))
}

async fn persist(repository: &dyn DriftRepository, result: &DriftResult) -> Result<(), DriftError> {
    repository
        .save_drift_result(result)
        .await
        .map_err(|source| DriftError::Persist {
            resource_id: result.resource_id().to_string(),
            source,
        })
}
