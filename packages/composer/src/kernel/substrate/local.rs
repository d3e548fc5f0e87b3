//! In-process substrate built on tokio.
//!
//! - each pipeline is a tokio task with a child `CancellationToken`
//! - steps are throttled by `max_concurrent_activities`, pipelines by
//!   `max_concurrent_workflows`
//! - a step permit is held for one attempt only, never across a backoff sleep
//! - cancellation is observed before every attempt, while waiting for a
//!   permit, during the attempt and during backoff

use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{
    Policy, PipelineHandle, StartOptions, StepError, StepOptions, Substrate, SubstrateError,
    TaskScope, Workflow,
};
use crate::kernel::workflow_config::WorkflowConfig;

/// Worker throttles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerOptions {
    pub max_concurrent_activities: usize,
    pub max_concurrent_workflows: usize,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            max_concurrent_activities: 10,
            max_concurrent_workflows: 5,
        }
    }
}

impl WorkerOptions {
    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self {
            max_concurrent_activities: config.max_concurrent_activities,
            max_concurrent_workflows: config.max_concurrent_workflows,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalSubstrate {
    options: WorkerOptions,
    activity_permits: Arc<Semaphore>,
    workflow_permits: Arc<Semaphore>,
}

impl LocalSubstrate {
    pub fn new(options: WorkerOptions) -> Self {
        // A zero throttle would stall every task forever
        let activities = options.max_concurrent_activities.max(1);
        let workflows = options.max_concurrent_workflows.max(1);

        Self {
            options,
            activity_permits: Arc::new(Semaphore::new(activities)),
            workflow_permits: Arc::new(Semaphore::new(workflows)),
        }
    }

    pub fn options(&self) -> WorkerOptions {
        self.options
    }

    pub fn available_activity_permits(&self) -> usize {
        self.activity_permits.available_permits()
    }

    pub fn available_workflow_permits(&self) -> usize {
        self.workflow_permits.available_permits()
    }
}

impl Default for LocalSubstrate {
    fn default() -> Self {
        Self::new(WorkerOptions::default())
    }
}

#[async_trait]
impl Substrate for LocalSubstrate {
    async fn run_step<T, F, Fut>(
        &self,
        scope: &TaskScope,
        options: StepOptions,
        step: F,
    ) -> Result<T, StepError>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, StepError>> + Send,
    {
        let StepOptions {
            name,
            policy,
            timeout,
        } = options;
        let permits = &self.activity_permits;
        let step = &step;

        retry_loop(scope, name, &policy, move |attempt| async move {
            let _permit = tokio::select! {
                biased;
                _ = scope.cancelled() => return Err(StepError::cancelled()),
                permit = permits.acquire() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return Err(StepError::cancelled()),
                },
            };

            debug!(task_id = %scope.id(), step = name, attempt, "Running step");

            tokio::select! {
                biased;
                _ = scope.cancelled() => Err(StepError::cancelled()),
                result = tokio::time::timeout(timeout, step()) => {
                    result.unwrap_or_else(|_| Err(StepError::timeout(name, timeout)))
                }
            }
        })
        .await
    }

    fn start_pipeline<W: Workflow>(
        &self,
        parent: &TaskScope,
        workflow: Arc<W>,
        options: StartOptions,
        input: W::Input,
    ) -> PipelineHandle<W::Output> {
        let id = options.id.clone();
        let scope = parent.child(id.clone());

        info!(
            parent_id = %parent.id(),
            pipeline_id = %id,
            kind = options.kind,
            "Starting pipeline"
        );

        let task = tokio::spawn(drive_pipeline(
            scope,
            self.workflow_permits.clone(),
            workflow,
            options,
            input,
        ));

        let task_id = id.clone();
        let completion = async move {
            match task.await {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(SubstrateError::Panicked {
                    id: task_id,
                    message: panic_message(e.into_panic()),
                }),
                Err(_) => Err(SubstrateError::Cancelled { id: task_id }),
            }
        }
        .boxed();

        PipelineHandle::new(id, completion)
    }
}

/// Shared retry loop for steps and pipelines.
async fn retry_loop<T, F, Fut>(
    scope: &TaskScope,
    name: &str,
    policy: &Policy,
    mut attempt: F,
) -> Result<T, StepError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, StepError>>,
{
    let mut made = 0u32;

    loop {
        if scope.is_cancelled() {
            return Err(StepError::cancelled().with_attempts(made));
        }

        made += 1;
        let err = match attempt(made).await {
            Ok(value) => return Ok(value),
            Err(e) => e.with_attempts(made),
        };

        if err.is_cancelled() {
            return Err(err);
        }

        if !policy.is_retryable(err.kind) {
            debug!(task_id = %scope.id(), step = name, error = %err, "Non-retryable failure");
            return Err(err);
        }

        if !policy.has_attempts_left(made) {
            warn!(
                task_id = %scope.id(),
                step = name,
                attempts = made,
                error = %err,
                "Retries exhausted"
            );
            return Err(err);
        }

        let delay = policy.backoff_for(made);
        warn!(
            task_id = %scope.id(),
            step = name,
            attempt = made,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Attempt failed, backing off"
        );

        tokio::select! {
            biased;
            _ = scope.cancelled() => return Err(StepError::cancelled().with_attempts(made)),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn drive_pipeline<W: Workflow>(
    scope: TaskScope,
    permits: Arc<Semaphore>,
    workflow: Arc<W>,
    options: StartOptions,
    input: W::Input,
) -> Result<W::Output, SubstrateError> {
    let id = options.id.clone();

    // The execution clock starts once the pipeline holds a worker slot
    let _permit = tokio::select! {
        biased;
        _ = scope.cancelled() => return Err(SubstrateError::Cancelled { id: id.clone() }),
        permit = permits.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return Err(SubstrateError::Cancelled { id: id.clone() }),
        },
    };

    let run = retry_loop(&scope, options.kind, &options.policy, |_| {
        workflow.run(scope.clone(), input.clone())
    });

    match tokio::time::timeout(options.execution_timeout, run).await {
        Ok(Ok(output)) => {
            debug!(pipeline_id = %id, "Pipeline completed");
            Ok(output)
        }
        Ok(Err(e)) if e.is_cancelled() => Err(SubstrateError::Cancelled { id }),
        Ok(Err(e)) => Err(SubstrateError::Failed { id, source: e }),
        Err(_) => {
            scope.cancel();
            Err(SubstrateError::TimedOut {
                id,
                timeout: options.execution_timeout,
            })
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
