//! Jobs, outcomes and the batch result.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::common::{CompanyId, TargetId};
use crate::kernel::substrate::SubstrateError;

// =============================================================================
// Jobs
// =============================================================================

/// One unit of personalization work. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub company_id: CompanyId,
    pub target_id: TargetId,
    pub content_type: String,
    pub source_text: String,
}

impl Job {
    pub fn new(
        company_id: CompanyId,
        target_id: TargetId,
        content_type: impl Into<String>,
        source_text: impl Into<String>,
    ) -> Self {
        Self {
            company_id,
            target_id,
            content_type: content_type.into(),
            source_text: source_text.into(),
        }
    }

    pub fn identifier(&self) -> JobIdentifier {
        JobIdentifier::for_pair(self.company_id, self.target_id)
    }
}

/// What to personalize, as submitted by the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalizationTarget {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

/// Wire shape of a job.
///
/// ```json
/// {"company_info_id": 1, "target_account_id": 10,
///  "personalization_target": {"type": "product_overview", "text": "..."}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub company_info_id: CompanyId,
    pub target_account_id: TargetId,
    pub personalization_target: PersonalizationTarget,
}

impl From<JobRequest> for Job {
    fn from(request: JobRequest) -> Self {
        Self {
            company_id: request.company_info_id,
            target_id: request.target_account_id,
            content_type: request.personalization_target.content_type,
            source_text: request.personalization_target.text,
        }
    }
}

/// Batch file accepted by the worker: either a bare array of jobs or
/// `{"jobs": [...]}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BatchRequest {
    Jobs(Vec<JobRequest>),
    Wrapped { jobs: Vec<JobRequest> },
}

impl BatchRequest {
    pub fn into_jobs(self) -> Vec<Job> {
        let requests = match self {
            BatchRequest::Jobs(jobs) | BatchRequest::Wrapped { jobs } => jobs,
        };
        requests.into_iter().map(Job::from).collect()
    }
}

// =============================================================================
// Identifiers
// =============================================================================

/// Stable key of a job within its batch: `company-<id>-target-<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobIdentifier(String);

impl JobIdentifier {
    pub fn for_pair(company_id: CompanyId, target_id: TargetId) -> Self {
        Self(format!("company-{}-target-{}", company_id, target_id))
    }

    /// Disambiguate a repeated pair by its batch position.
    pub fn with_position(&self, position: usize) -> Self {
        Self(format!("{}#{}", self.0, position))
    }

    /// Substrate task id for this job under one orchestrator invocation.
    pub fn task_id(&self, invocation_id: &str) -> String {
        format!("target-workflow-{}-{}", self.0, invocation_id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for JobIdentifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Id and display name of a resolved record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef<I> {
    pub id: I,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    InvalidJob,
    CompanyNotFound,
    TargetNotFound,
    /// Storage lookups kept failing
    LookupFailed,
    GenerationFailed,
    PersistFailed,
    Cancelled,
    /// The pipeline's own config could not be loaded
    ConfigError,
    PipelineTimedOut,
    /// The pipeline raised or panicked
    PipelineFailed,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidJob => "InvalidJob",
            FailureKind::CompanyNotFound => "CompanyNotFound",
            FailureKind::TargetNotFound => "TargetNotFound",
            FailureKind::LookupFailed => "LookupFailed",
            FailureKind::GenerationFailed => "GenerationFailed",
            FailureKind::PersistFailed => "PersistFailed",
            FailureKind::Cancelled => "Cancelled",
            FailureKind::ConfigError => "ConfigError",
            FailureKind::PipelineTimedOut => "PipelineTimedOut",
            FailureKind::PipelineFailed => "PipelineFailed",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&SubstrateError> for FailureKind {
    fn from(err: &SubstrateError) -> Self {
        use crate::kernel::substrate::ErrorKind;

        match err {
            SubstrateError::Cancelled { .. } => FailureKind::Cancelled,
            SubstrateError::TimedOut { .. } => FailureKind::PipelineTimedOut,
            SubstrateError::Panicked { .. } => FailureKind::PipelineFailed,
            SubstrateError::Failed { source, .. } => match source.kind {
                ErrorKind::ConfigNotFound | ErrorKind::ConfigParseError => FailureKind::ConfigError,
                ErrorKind::Cancelled => FailureKind::Cancelled,
                _ => FailureKind::PipelineFailed,
            },
        }
    }
}

/// Result of one pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Success {
        company: EntityRef<CompanyId>,
        target: EntityRef<TargetId>,
        original_text: String,
        personalized_text: String,
        content_type: String,
    },
    Failure {
        job_identifier: JobIdentifier,
        error_kind: FailureKind,
        error_message: String,
    },
}

impl PipelineOutcome {
    pub fn failure(
        job_identifier: &JobIdentifier,
        error_kind: FailureKind,
        error_message: impl Into<String>,
    ) -> Self {
        PipelineOutcome::Failure {
            job_identifier: job_identifier.clone(),
            error_kind,
            error_message: error_message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            PipelineOutcome::Failure { error_kind, .. } => Some(*error_kind),
            PipelineOutcome::Success { .. } => None,
        }
    }
}

// =============================================================================
// Batch result
// =============================================================================

/// Outcomes keyed by job identifier, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BatchResult {
    outcomes: IndexMap<JobIdentifier, PipelineOutcome>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            outcomes: IndexMap::with_capacity(capacity),
        }
    }

    /// Record an outcome. Identifiers are unique within a batch, so an
    /// existing entry is never overwritten.
    pub fn record(&mut self, job_identifier: JobIdentifier, outcome: PipelineOutcome) {
        self.outcomes.entry(job_identifier).or_insert(outcome);
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, job_identifier: &str) -> Option<&PipelineOutcome> {
        self.outcomes.get(job_identifier)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&JobIdentifier, &PipelineOutcome)> {
        self.outcomes.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &JobIdentifier> {
        self.outcomes.keys()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::substrate::{ErrorKind, StepError};
    use std::time::Duration;

    fn success(name: &str) -> PipelineOutcome {
        PipelineOutcome::Success {
            company: EntityRef {
                id: CompanyId::new(1),
                name: "Acme".into(),
            },
            target: EntityRef {
                id: TargetId::new(10),
                name: name.into(),
            },
            original_text: "X".into(),
            personalized_text: "X for Globex".into(),
            content_type: "product_overview".into(),
        }
    }

    #[test]
    fn test_identifier_formats() {
        let id = JobIdentifier::for_pair(CompanyId::new(1), TargetId::new(10));
        assert_eq!(id.as_str(), "company-1-target-10");
        assert_eq!(id.with_position(3).as_str(), "company-1-target-10#3");
        assert_eq!(
            id.task_id("ad-content-abc"),
            "target-workflow-company-1-target-10-ad-content-abc"
        );
    }

    #[test]
    fn test_wire_job_conversion() {
        let raw = r#"[{"company_info_id": 1, "target_account_id": 99,
            "personalization_target": {"type": "differentiators", "text": "Y"}}]"#;
        let jobs = serde_json::from_str::<BatchRequest>(raw).unwrap().into_jobs();
        assert_eq!(jobs, vec![Job::new(
                CompanyId::new(1),
                TargetId::new(99),
                "differentiators",
                "Y"
            )]);

        let wrapped = r#"{"jobs": [{"company_info_id": 2, "target_account_id": 3,
            "personalization_target": {"type": "headline", "text": "Z"}}]}"#;
        let jobs = serde_json::from_str::<BatchRequest>(wrapped).unwrap().into_jobs();
        assert_eq!(jobs[0].identifier().as_str(), "company-2-target-3");
    }

    #[test]
    fn test_batch_result_preserves_submission_order() {
        let mut result = BatchResult::new();
        let b = JobIdentifier::for_pair(CompanyId::new(2), TargetId::new(1));
        let a = JobIdentifier::for_pair(CompanyId::new(1), TargetId::new(1));
        result.record(b.clone(), success("B"));
        result.record(
            a.clone(),
            PipelineOutcome::failure(&a, FailureKind::TargetNotFound, "missing"),
        );

        let keys: Vec<_> = result.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["company-2-target-1", "company-1-target-1"]);
        assert_eq!(result.succeeded(), 1);
        assert_eq!(result.failed(), 1);

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.find("company-2-target-1").unwrap() < json.find("company-1-target-1").unwrap());
    }

    #[test]
    fn test_record_never_overwrites() {
        let mut result = BatchResult::new();
        let id = JobIdentifier::for_pair(CompanyId::new(1), TargetId::new(1));
        result.record(id.clone(), success("first"));
        result.record(
            id.clone(),
            PipelineOutcome::failure(&id, FailureKind::Cancelled, "late"),
        );
        assert_eq!(result.len(), 1);
        assert!(result.get("company-1-target-1").unwrap().is_success());
    }

    #[test]
    fn test_outcome_json_shape() {
        let id = JobIdentifier::for_pair(CompanyId::new(1), TargetId::new(99));
        let failure = PipelineOutcome::failure(
            &id,
            FailureKind::TargetNotFound,
            "Target account not found for ID: 99",
        );
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["job_identifier"], "company-1-target-99");
        assert_eq!(json["error_kind"], "TargetNotFound");

        let json = serde_json::to_value(success("Globex")).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["target"]["name"], "Globex");
        assert_eq!(json["company"]["id"], 1);
    }

    #[test]
    fn test_failure_kind_from_substrate_error() {
        let config = SubstrateError::Failed {
            id: "p".into(),
            source: StepError::new(ErrorKind::ConfigNotFound, "missing"),
        };
        assert_eq!(FailureKind::from(&config), FailureKind::ConfigError);
        assert_eq!(
            FailureKind::from(&SubstrateError::TimedOut {
                id: "p".into(),
                timeout: Duration::from_secs(1)
            }),
            FailureKind::PipelineTimedOut
        );
        assert_eq!(
            FailureKind::from(&SubstrateError::Cancelled { id: "p".into() }),
            FailureKind::Cancelled
        );
    }
}
