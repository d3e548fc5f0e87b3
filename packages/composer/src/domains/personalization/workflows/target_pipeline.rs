//! Per-job personalization pipeline.
//!
//! ```text
//! Start -> CompanyResolved -> TargetResolved -> ContextReady
//!       -> ContentGenerated -> Persisted -> Done
//! ```
//!
//! Any hard step failure moves the pipeline to `Failed` and is returned as a
//! `PipelineOutcome::Failure`. Only a failure to load the pipeline's own
//! config is raised to the substrate.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::domains::personalization::activities::{
    extract_target_context, generate_personalized_content, load_config,
    persist_personalized_content, resolve_company, resolve_target, GenerationRequest,
    PIPELINE_CONFIG_RESOURCE,
};
use crate::domains::personalization::models::NewPersonalizedContent;
use crate::domains::personalization::types::{
    EntityRef, FailureKind, Job, JobIdentifier, PipelineOutcome,
};
use crate::kernel::substrate::{
    ErrorKind, StepCategory, StepError, Substrate, TaskScope, Workflow,
};
use crate::kernel::ServerDeps;

pub const TARGET_WORKFLOW_KIND: &str = "TargetWorkflow";

#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub job: Job,
    pub job_identifier: JobIdentifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    CompanyResolved,
    TargetResolved,
    ContextReady,
    ContentGenerated,
    Persisted,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Start => "start",
            PipelineState::CompanyResolved => "company_resolved",
            PipelineState::TargetResolved => "target_resolved",
            PipelineState::ContextReady => "context_ready",
            PipelineState::ContentGenerated => "content_generated",
            PipelineState::Persisted => "persisted",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks and logs the state of one run.
struct StateTracker<'a> {
    job_identifier: &'a JobIdentifier,
    state: PipelineState,
}

impl<'a> StateTracker<'a> {
    fn new(job_identifier: &'a JobIdentifier) -> Self {
        Self {
            job_identifier,
            state: PipelineState::Start,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug!(
            job_identifier = %self.job_identifier,
            from = %self.state,
            to = %next,
            "Pipeline state transition"
        );
        self.state = next;
    }

    fn fail(&mut self, kind: FailureKind, message: impl Into<String>) -> PipelineOutcome {
        let message = message.into();
        warn!(
            job_identifier = %self.job_identifier,
            stopped_at = %self.state,
            error_kind = %kind,
            error = %message,
            "Pipeline failed"
        );
        self.state = PipelineState::Failed;
        PipelineOutcome::failure(self.job_identifier, kind, message)
    }

    /// Map a step error: terminal kinds keep their own meaning, everything
    /// else is reported as the step's failure kind.
    fn fail_step(&mut self, step_kind: FailureKind, err: StepError) -> PipelineOutcome {
        let kind = match err.kind {
            ErrorKind::Cancelled => FailureKind::Cancelled,
            ErrorKind::CompanyNotFound => FailureKind::CompanyNotFound,
            ErrorKind::TargetNotFound => FailureKind::TargetNotFound,
            ErrorKind::InvalidJob => FailureKind::InvalidJob,
            _ => step_kind,
        };
        self.fail(kind, err.to_string())
    }
}

/// One isolated personalization run. Holds no per-job state between runs.
pub struct PersonalizationPipeline<S: Substrate> {
    substrate: Arc<S>,
    deps: ServerDeps,
}

impl<S: Substrate> PersonalizationPipeline<S> {
    pub fn new(substrate: Arc<S>, deps: ServerDeps) -> Self {
        Self { substrate, deps }
    }

    #[instrument(skip(self, scope, input), fields(job_identifier = %input.job_identifier))]
    pub async fn execute(
        &self,
        scope: &TaskScope,
        input: PipelineInput,
    ) -> Result<PipelineOutcome, StepError> {
        let PipelineInput {
            job,
            job_identifier,
        } = input;
        let mut tracker = StateTracker::new(&job_identifier);
        let substrate = self.substrate.as_ref();

        info!(
            company_id = %job.company_id,
            target_id = %job.target_id,
            content_type = %job.content_type,
            "Starting personalization pipeline"
        );

        // Raised: the substrate retries the whole pipeline per its start policy
        let loaded = load_config(
            substrate,
            scope,
            self.deps.config_provider.as_ref(),
            PIPELINE_CONFIG_RESOURCE,
        )
        .await?;
        let policies = &loaded.policies;
        let completion = loaded.completion_options();

        if job.source_text.trim().is_empty() {
            return Ok(tracker.fail(
                FailureKind::InvalidJob,
                "No text provided for personalization",
            ));
        }

        let store = self.deps.store.as_ref();
        let ai = self.deps.ai.as_ref();

        // 1. Company
        let company = match substrate
            .run_step(
                scope,
                policies.step("resolve_company", StepCategory::Storage),
                || resolve_company(store, job.company_id),
            )
            .await
        {
            Ok(company) => company,
            Err(e) => return Ok(tracker.fail_step(FailureKind::LookupFailed, e)),
        };
        tracker.advance(PipelineState::CompanyResolved);

        // 2. Target
        let target = match substrate
            .run_step(
                scope,
                policies.step("resolve_target", StepCategory::Storage),
                || resolve_target(store, job.target_id),
            )
            .await
        {
            Ok(target) => target,
            Err(e) => return Ok(tracker.fail_step(FailureKind::LookupFailed, e)),
        };
        tracker.advance(PipelineState::TargetResolved);

        // 3. Context (soft)
        let target_context = match target.reference_url() {
            None => {
                debug!(target_id = %target.id, "Target has no reference URL; skipping context");
                String::new()
            }
            Some(url) => {
                let scraper = self.deps.web_scraper.as_ref();
                match substrate
                    .run_step(
                        scope,
                        policies.step("extract_target_context", StepCategory::ExternalFetch),
                        || extract_target_context(scraper, ai, &target, url, &completion),
                    )
                    .await
                {
                    Ok(context) => context,
                    Err(e) if e.is_cancelled() => {
                        return Ok(tracker.fail(FailureKind::Cancelled, e.to_string()))
                    }
                    Err(e) => {
                        warn!(
                            url = %url,
                            attempts = e.attempts,
                            error = %e,
                            "Context extraction failed; continuing without context"
                        );
                        String::new()
                    }
                }
            }
        };
        tracker.advance(PipelineState::ContextReady);

        // 4. Generate
        let request = GenerationRequest::new(&company, &target, &target_context, &job);
        let personalized_text = match substrate
            .run_step(
                scope,
                policies.step("generate_personalized_content", StepCategory::Generation),
                || generate_personalized_content(ai, &request, &completion),
            )
            .await
        {
            Ok(text) => text,
            Err(e) => return Ok(tracker.fail_step(FailureKind::GenerationFailed, e)),
        };
        tracker.advance(PipelineState::ContentGenerated);

        // 5. Persist
        let record = NewPersonalizedContent::builder()
            .company_info_id(company.id)
            .target_account_id(target.id)
            .original_text(job.source_text.clone())
            .personalized_text(personalized_text.clone())
            .text_type(job.content_type.clone())
            .build();

        let stored = match substrate
            .run_step(
                scope,
                policies.step("persist_personalized_content", StepCategory::Storage),
                || persist_personalized_content(store, &record),
            )
            .await
        {
            Ok(stored) => stored,
            Err(e) => return Ok(tracker.fail_step(FailureKind::PersistFailed, e)),
        };
        tracker.advance(PipelineState::Persisted);

        tracker.advance(PipelineState::Done);
        info!(record_id = %stored.id, target = %target.name, "Personalization pipeline completed");

        Ok(PipelineOutcome::Success {
            company: EntityRef {
                id: company.id,
                name: company.company_name,
            },
            target: EntityRef {
                id: target.id,
                name: target.name,
            },
            original_text: job.source_text,
            personalized_text,
            content_type: job.content_type,
        })
    }
}

#[async_trait]
impl<S: Substrate> Workflow for PersonalizationPipeline<S> {
    type Input = PipelineInput;
    type Output = PipelineOutcome;

    async fn run(
        &self,
        scope: TaskScope,
        input: PipelineInput,
    ) -> Result<PipelineOutcome, StepError> {
        self.execute(&scope, input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{CompanyId, TargetId};
    use crate::domains::companies::Company;
    use crate::domains::targets::Target;
    use crate::kernel::substrate::LocalSubstrate;
    use crate::kernel::{MockAI, MockContentStore, MockWebScraper, TestDependencies};

    fn pipeline(deps: &TestDependencies) -> PersonalizationPipeline<LocalSubstrate> {
        PersonalizationPipeline::new(Arc::new(LocalSubstrate::default()), deps.to_deps())
    }

    fn input(company: i64, target: i64, text: &str) -> PipelineInput {
        let job = Job::new(
            CompanyId::new(company),
            TargetId::new(target),
            "product_overview",
            text,
        );
        PipelineInput {
            job_identifier: job.identifier(),
            job,
        }
    }

    fn store() -> MockContentStore {
        MockContentStore::new()
            .with_company(Company::new(CompanyId::new(1), "Acme").with_description("AP automation"))
            .with_target(Target::new(TargetId::new(10), "Globex"))
            .with_target(Target::new(TargetId::new(11), "Initech").with_url("https://initech.example"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_happy_path_persists_and_succeeds() {
        let deps = TestDependencies::new()
            .mock_store(store())
            .mock_ai(MockAI::new().with_response("Close Globex's books faster."));
        let scope = TaskScope::root("test");

        let outcome = pipeline(&deps)
            .execute(&scope, input(1, 10, "Close your books faster."))
            .await
            .unwrap();

        match outcome {
            PipelineOutcome::Success {
                company,
                target,
                personalized_text,
                content_type,
                ..
            } => {
                assert_eq!(company.name, "Acme");
                assert_eq!(target.name, "Globex");
                assert_eq!(personalized_text, "Close Globex's books faster.");
                assert_eq!(content_type, "product_overview");
            }
            other => panic!("expected success, got {:?}", other),
        }

        let inserted = deps.store.inserted();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].original_text, "Close your books faster.");
        assert_eq!(inserted[0].text_type, "product_overview");
        // No reference URL, so only the generator was called
        assert!(deps.web_scraper.scrape_calls().is_empty());
        assert_eq!(deps.ai.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_company_stops_before_generation() {
        let deps = TestDependencies::new().mock_store(store());
        let scope = TaskScope::root("test");

        let outcome = pipeline(&deps)
            .execute(&scope, input(2, 10, "X"))
            .await
            .unwrap();

        assert_eq!(outcome.failure_kind(), Some(FailureKind::CompanyNotFound));
        assert_eq!(deps.store.company_lookups().len(), 1);
        assert!(deps.store.target_lookups().is_empty());
        assert_eq!(deps.ai.call_count(), 0);
        assert_eq!(deps.store.insert_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_source_text_is_invalid() {
        let deps = TestDependencies::new().mock_store(store());
        let scope = TaskScope::root("test");

        let outcome = pipeline(&deps)
            .execute(&scope, input(1, 10, "  \n "))
            .await
            .unwrap();

        match outcome {
            PipelineOutcome::Failure {
                error_kind,
                error_message,
                job_identifier,
            } => {
                assert_eq!(error_kind, FailureKind::InvalidJob);
                assert_eq!(error_message, "No text provided for personalization");
                assert_eq!(job_identifier.as_str(), "company-1-target-10");
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(deps.store.company_lookups().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_text_reported_before_missing_company() {
        let deps = TestDependencies::new().mock_store(store());
        let scope = TaskScope::root("test");

        let outcome = pipeline(&deps)
            .execute(&scope, input(2, 99, ""))
            .await
            .unwrap();

        assert_eq!(outcome.failure_kind(), Some(FailureKind::InvalidJob));
        assert!(deps.store.company_lookups().is_empty());
        assert!(deps.store.target_lookups().is_empty());
        assert_eq!(deps.ai.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_lookup_errors_are_retried() {
        let deps = TestDependencies::new().mock_store(store().failing_next_lookups(2));
        let scope = TaskScope::root("test");

        let outcome = pipeline(&deps)
            .execute(&scope, input(1, 10, "X"))
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(deps.store.company_lookups().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_failure_is_soft() {
        let deps = TestDependencies::new()
            .mock_store(store())
            .mock_scraper(MockWebScraper::new().with_failing_url("https://initech.example"))
            .mock_ai(MockAI::new().with_default_response("Tailored for Initech"));
        let scope = TaskScope::root("test");

        let outcome = pipeline(&deps)
            .execute(&scope, input(1, 11, "X"))
            .await
            .unwrap();

        assert!(outcome.is_success());
        // Three fetch attempts, then generation with no context
        assert_eq!(deps.web_scraper.scrape_calls().len(), 3);
        assert_eq!(deps.ai.call_count(), 1);
        assert!(deps.ai.was_called_with("No additional context available."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_feeds_generation() {
        let deps = TestDependencies::new()
            .mock_store(store())
            .mock_scraper(
                MockWebScraper::new().with_page("https://initech.example", "Initech makes TPS reports."),
            )
            .mock_ai(
                MockAI::new()
                    .with_response("Initech drowns in TPS reports.")
                    .with_response("Tailored for Initech"),
            );
        let scope = TaskScope::root("test");

        let outcome = pipeline(&deps)
            .execute(&scope, input(1, 11, "X"))
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert!(deps.web_scraper.was_scraped("https://initech.example"));
        let last = deps.ai.last_prompt().unwrap();
        assert!(last.contains("Initech drowns in TPS reports."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_exhaustion_skips_persist() {
        let deps = TestDependencies::new()
            .mock_store(store())
            .mock_ai(MockAI::new().failing_when_prompt_contains("Personalized version"));
        let scope = TaskScope::root("test");

        let outcome = pipeline(&deps)
            .execute(&scope, input(1, 10, "X"))
            .await
            .unwrap();

        assert_eq!(outcome.failure_kind(), Some(FailureKind::GenerationFailed));
        assert_eq!(deps.ai.call_count(), 3);
        assert_eq!(deps.store.insert_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persist_exhaustion_is_hard() {
        let deps = TestDependencies::new().mock_store(store().failing_next_inserts(u32::MAX));
        let scope = TaskScope::root("test");

        let outcome = pipeline(&deps)
            .execute(&scope, input(1, 10, "X"))
            .await
            .unwrap();

        assert_eq!(outcome.failure_kind(), Some(FailureKind::PersistFailed));
        assert_eq!(deps.store.insert_attempts(), 3);
        assert!(deps.store.inserted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_pipeline_config_is_raised() {
        let deps = TestDependencies::new()
            .mock_store(store())
            .with_config(crate::kernel::StaticConfigProvider::new());
        let scope = TaskScope::root("test");

        let err = pipeline(&deps)
            .execute(&scope, input(1, 10, "X"))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::ConfigNotFound);
        assert!(deps.store.company_lookups().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_generation_backoff() {
        let deps = TestDependencies::new()
            .mock_store(store())
            .mock_ai(MockAI::new().failing_when_prompt_contains("Personalized version"))
            .with_workflow_yaml("retry_policy:\n  initial_interval: 300\n  maximum_interval: 300\n");
        let scope = TaskScope::root("test");

        let canceller = scope.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            canceller.cancel();
        });

        let outcome = pipeline(&deps)
            .execute(&scope, input(1, 10, "X"))
            .await
            .unwrap();

        assert_eq!(outcome.failure_kind(), Some(FailureKind::Cancelled));
        assert_eq!(deps.ai.call_count(), 1);
    }
}
