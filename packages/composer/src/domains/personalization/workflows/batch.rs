//! Batch orchestrator: fan out one pipeline per job, fan the outcomes back in.

use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::target_pipeline::{PersonalizationPipeline, PipelineInput, TARGET_WORKFLOW_KIND};
use crate::domains::personalization::activities::{load_config, ORCHESTRATOR_CONFIG_RESOURCE};
use crate::domains::personalization::types::{
    BatchResult, FailureKind, Job, JobIdentifier, PipelineOutcome,
};
use crate::kernel::substrate::{PipelineHandle, StepError, Substrate, TaskScope};
use crate::kernel::ServerDeps;

/// The batch as a whole could not run. Per-job problems never surface here.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("orchestrator config could not be loaded: {0}")]
    Config(#[source] StepError),

    #[error("batch cancelled before any pipeline was started")]
    Cancelled,
}

pub struct JobOrchestrator<S: Substrate> {
    substrate: Arc<S>,
    deps: ServerDeps,
    pipeline: Arc<PersonalizationPipeline<S>>,
}

impl<S: Substrate> JobOrchestrator<S> {
    pub fn new(substrate: Arc<S>, deps: ServerDeps) -> Self {
        let pipeline = Arc::new(PersonalizationPipeline::new(substrate.clone(), deps.clone()));
        Self {
            substrate,
            deps,
            pipeline,
        }
    }

    /// Run every job and return one outcome per job, in submission order.
    pub async fn run_batch(&self, jobs: Vec<Job>) -> Result<BatchResult, OrchestratorError> {
        self.run_batch_with_cancellation(jobs, CancellationToken::new())
            .await
    }

    /// Like [`run_batch`](Self::run_batch). Cancelling `cancel` stops every
    /// pipeline that has not finished; those jobs resolve as `Cancelled`.
    pub async fn run_batch_with_cancellation(
        &self,
        jobs: Vec<Job>,
        cancel: CancellationToken,
    ) -> Result<BatchResult, OrchestratorError> {
        if jobs.is_empty() {
            info!("Empty batch; nothing to personalize");
            return Ok(BatchResult::new());
        }

        let invocation_id = format!("ad-content-{}", Uuid::new_v4());
        self.run_invocation(invocation_id, jobs, cancel).await
    }

    #[instrument(skip(self, jobs, cancel), fields(invocation_id = %invocation_id, jobs = jobs.len()))]
    async fn run_invocation(
        &self,
        invocation_id: String,
        jobs: Vec<Job>,
        cancel: CancellationToken,
    ) -> Result<BatchResult, OrchestratorError> {
        // Dropping this future mid-batch cancels every pipeline it started,
        // without cancelling the caller's token on a normal return
        let invocation = cancel.child_token();
        let _cancel_on_drop = invocation.clone().drop_guard();
        let scope = TaskScope::with_token(invocation_id.clone(), invocation);
        let substrate = self.substrate.as_ref();

        let loaded = load_config(
            substrate,
            &scope,
            self.deps.config_provider.as_ref(),
            ORCHESTRATOR_CONFIG_RESOURCE,
        )
        .await
        .map_err(|e| {
            if e.is_cancelled() {
                OrchestratorError::Cancelled
            } else {
                warn!(error = %e, "Failed to load orchestrator config");
                OrchestratorError::Config(e)
            }
        })?;

        let identifiers = assign_identifiers(&jobs);

        // Start everything before awaiting anything
        let mut started: Vec<(JobIdentifier, PipelineHandle<PipelineOutcome>)> =
            Vec::with_capacity(jobs.len());
        for (job, job_identifier) in jobs.into_iter().zip(identifiers) {
            let options = loaded
                .policies
                .start(TARGET_WORKFLOW_KIND, job_identifier.task_id(&invocation_id));
            let input = PipelineInput {
                job,
                job_identifier: job_identifier.clone(),
            };
            let handle =
                substrate.start_pipeline(&scope, self.pipeline.clone(), options, input);
            info!(job_identifier = %job_identifier, task_id = %handle.id(), "Started pipeline");
            started.push((job_identifier, handle));
        }

        let mut results = BatchResult::with_capacity(started.len());
        for (job_identifier, handle) in started {
            let outcome = match substrate.await_pipeline(handle).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(job_identifier = %job_identifier, error = %e, "Pipeline raised");
                    PipelineOutcome::failure(&job_identifier, FailureKind::from(&e), e.to_string())
                }
            };
            info!(
                job_identifier = %job_identifier,
                success = outcome.is_success(),
                "Pipeline completed"
            );
            results.record(job_identifier, outcome);
        }

        info!(
            total = results.len(),
            succeeded = results.succeeded(),
            failed = results.failed(),
            "Batch personalization finished"
        );

        Ok(results)
    }
}

/// One identifier per job. A repeated (company, target) pair gets its batch
/// position appended so no outcome is overwritten.
pub fn assign_identifiers(jobs: &[Job]) -> Vec<JobIdentifier> {
    let mut seen = HashSet::with_capacity(jobs.len());
    jobs.iter()
        .enumerate()
        .map(|(position, job)| {
            let base = job.identifier();
            let id = if seen.contains(&base) {
                base.with_position(position)
            } else {
                base
            };
            seen.insert(id.clone());
            id
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{CompanyId, TargetId};

    fn job(company: i64, target: i64) -> Job {
        Job::new(CompanyId::new(company), TargetId::new(target), "product_overview", "X")
    }

    #[test]
    fn test_identifiers_for_distinct_pairs() {
        let ids = assign_identifiers(&[job(1, 10), job(1, 11), job(2, 10)]);
        let ids: Vec<&str> = ids.iter().map(|i| i.as_str()).collect();
        assert_eq!(
            ids,
            vec!["company-1-target-10", "company-1-target-11", "company-2-target-10"]
        );
    }

    #[test]
    fn test_repeated_pair_gets_position_suffix() {
        let ids = assign_identifiers(&[job(1, 10), job(1, 11), job(1, 10), job(1, 10)]);
        let ids: Vec<&str> = ids.iter().map(|i| i.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "company-1-target-10",
                "company-1-target-11",
                "company-1-target-10#2",
                "company-1-target-10#3",
            ]
        );
    }
}
