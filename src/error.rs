use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::drift::DriftResult;
use crate::instance::Origin;
use crate::output::ReportError;
use crate::providers::ProviderError;
use crate::store::RepositoryError;

/// Coarse classification callers use to decide how to react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested resource or record does not exist.
    NotFound,
    /// Provider, persistence or reporter failure.
    Operational,
    /// Caller-supplied configuration is malformed.
    Validation,
    /// Deadline exceeded or explicit cancellation.
    Cancellation,
    /// A bulk run produced some results and some per-resource failures.
    PartialFailure,
}

#[derive(Debug, Error)]
pub enum DriftError {
    #[error("{origin} instance not found: {resource_id}")]
    InstanceNotFound { resource_id: String, origin: Origin },

    #[error("instance not found in aws or terraform: {resource_id}")]
    ResourceNotFound { resource_id: String },

    #[error("failed to fetch {resource_id} from {origin}: {source}")]
    Fetch {
        resource_id: String,
        origin: Origin,
        #[source]
        source: ProviderError,
    },

    #[error("failed to fetch {resource_id} from both aws and terraform (aws: {aws}; terraform: {terraform})")]
    FetchBoth {
        resource_id: String,
        aws: ProviderError,
        terraform: ProviderError,
    },

    #[error("failed to list instances from {origin}: {source}")]
    List {
        origin: Origin,
        #[source]
        source: ProviderError,
    },

    #[error("failed to list instances from both aws and terraform (aws: {aws}; terraform: {terraform})")]
    ListBoth {
        aws: ProviderError,
        terraform: ProviderError,
    },

    #[error("failed to persist drift result for {resource_id}: {source}")]
    Persist {
        resource_id: String,
        #[source]
        source: RepositoryError,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("reporter '{reporter}' failed: {source}")]
    Report {
        reporter: String,
        #[source]
        source: ReportError,
    },

    #[error("worker task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error("drift detection timed out after {0:?}")]
    Timeout(Duration),

    #[error("drift detection cancelled")]
    Cancelled,

    /// Bulk detection finished with per-resource failures. Successful results are kept.
    #[error("drift detection failed for {failed} of {total} resources")]
    PartialFailure {
        failed: usize,
        total: usize,
        results: Vec<DriftResult>,
        errors: Vec<DriftError>,
    },
}

impl DriftError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriftError::InstanceNotFound { .. } | DriftError::ResourceNotFound { .. } => {
                ErrorKind::NotFound
            }
            DriftError::Repository(RepositoryError::NotFound(_))
            | DriftError::Repository(RepositoryError::ResourceNotFound(_)) => ErrorKind::NotFound,
            DriftError::Provider(ProviderError::NotConfigured(_))
            | DriftError::Config(_)
            | DriftError::Validation(_)
            | DriftError::AlreadyRunning => ErrorKind::Validation,
            DriftError::Timeout(_) | DriftError::Cancelled => ErrorKind::Cancellation,
            DriftError::PartialFailure { .. } => ErrorKind::PartialFailure,
            _ => ErrorKind::Operational,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        self.kind() == ErrorKind::Cancellation
    }

    /// Results that were produced before a bulk run failed partially.
    pub fn partial_results(&self) -> &[DriftResult] {
        match self {
            DriftError::PartialFailure { results, .. } => results,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = DriftError::InstanceNotFound {
            resource_id: "i-123".to_string(),
            origin: Origin::Terraform,
        };
        assert_eq!(err.to_string(), "terraform instance not found: i-123");
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let missing = DriftError::ResourceNotFound {
            resource_id: "i-nope".to_string(),
        };
        assert_eq!(missing.to_string(), "instance not found in aws or terraform: i-nope");
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_fetch_names_failing_side() {
        let err = DriftError::Fetch {
            resource_id: "i-123".to_string(),
            origin: Origin::Aws,
            source: ProviderError::Unavailable("connection refused".to_string()),
        };
        assert!(err.to_string().contains("from aws"));
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(err.kind(), ErrorKind::Operational);
    }

    #[test]
    fn test_fetch_both_display() {
        let err = DriftError::FetchBoth {
            resource_id: "i-1".to_string(),
            aws: ProviderError::Unavailable("aws down".to_string()),
            terraform: ProviderError::Unavailable("state locked".to_string()),
        };
        let message = err.to_string();
        assert!(message.contains("aws down"));
        assert!(message.contains("state locked"));
    }

    #[test]
    fn test_cancellation_kinds() {
        assert!(DriftError::Timeout(Duration::from_secs(1)).is_cancellation());
        assert!(DriftError::Cancelled.is_cancellation());
        assert!(!DriftError::Validation("x".to_string()).is_cancellation());
    }

    #[test]
    fn test_validation_kinds() {
        assert_eq!(DriftError::AlreadyRunning.kind(), ErrorKind::Validation);
        let config_err = DriftError::from(ConfigError::Invalid("parallelism".to_string()));
        assert_eq!(config_err.kind(), ErrorKind::Validation);
        let provider_err = DriftError::from(ProviderError::NotConfigured("aws".to_string()));
        assert_eq!(provider_err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_repository_not_found_conversion() {
        let err: DriftError = RepositoryError::NotFound("abc".to_string()).into();
        assert!(matches!(err, DriftError::Repository(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_partial_failure_display_and_results() {
        let err = DriftError::PartialFailure {
            failed: 1,
            total: 3,
            results: vec![
                DriftResult::new("i-1", Origin::Aws),
                DriftResult::new("i-2", Origin::Aws),
            ],
            errors: vec![DriftError::Task("boom".to_string())],
        };
        assert_eq!(
            err.to_string(),
            "drift detection failed for 1 of 3 resources"
        );
        assert_eq!(err.partial_results().len(), 2);
        assert_eq!(err.kind(), ErrorKind::PartialFailure);
        assert!(DriftError::Cancelled.partial_results().is_empty());
    }
}
