// Durable execution substrate interface
//
// Workflows never retry, sleep or spawn on their own. Every step goes through
// `Substrate::run_step` and every child pipeline through `start_pipeline`, so
// retry, timeout, cancellation and throttling live in one place.
//
// `LocalSubstrate` is the in-process realization used by the worker binary and
// tests. It is not durable: a crashed process does not resume its pipelines.

pub mod error;
pub mod local;
pub mod policy;

pub use error::{ErrorKind, StepError, SubstrateError};
pub use local::{LocalSubstrate, WorkerOptions};
pub use policy::{Policy, PolicySet, StepCategory};

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Task scope
// =============================================================================

/// Identity and cancellation for one running task (an orchestrator invocation
/// or a pipeline). Cancelling a scope cancels every child scope.
#[derive(Debug, Clone)]
pub struct TaskScope {
    id: String,
    cancel: CancellationToken,
}

impl TaskScope {
    pub fn root(id: impl Into<String>) -> Self {
        Self::with_token(id, CancellationToken::new())
    }

    pub fn with_token(id: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            id: id.into(),
            cancel,
        }
    }

    pub fn child(&self, id: impl Into<String>) -> Self {
        Self::with_token(id, self.cancel.child_token())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resolves once this scope (or any ancestor) is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

// =============================================================================
// Options
// =============================================================================

/// How a single step is executed.
#[derive(Debug, Clone)]
pub struct StepOptions {
    pub name: &'static str,
    pub policy: Arc<Policy>,
    /// Ceiling for one attempt.
    pub timeout: Duration,
}

impl StepOptions {
    pub fn new(name: &'static str, policy: Arc<Policy>, timeout: Duration) -> Self {
        Self {
            name,
            policy,
            timeout,
        }
    }
}

/// How a child pipeline is started.
#[derive(Debug, Clone)]
pub struct StartOptions {
    pub kind: &'static str,
    /// Globally unique task id for this logical run.
    pub id: String,
    pub policy: Arc<Policy>,
    /// Wall-clock ceiling for the whole pipeline, retries included.
    pub execution_timeout: Duration,
}

// =============================================================================
// Pipeline handle
// =============================================================================

/// A started pipeline. The pipeline runs whether or not the handle is awaited.
pub struct PipelineHandle<O> {
    id: String,
    completion: BoxFuture<'static, Result<O, SubstrateError>>,
}

impl<O> PipelineHandle<O> {
    pub fn new(id: String, completion: BoxFuture<'static, Result<O, SubstrateError>>) -> Self {
        Self { id, completion }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn join(self) -> Result<O, SubstrateError> {
        self.completion.await
    }
}

impl<O> std::fmt::Debug for PipelineHandle<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineHandle").field("id", &self.id).finish()
    }
}

// =============================================================================
// Traits
// =============================================================================

/// A unit of orchestration that can be started as a child pipeline.
///
/// Returning `Err` raises to the substrate, which retries the whole run per the
/// start policy. Expected failures should be encoded in `Output` instead.
#[async_trait]
pub trait Workflow: Send + Sync + 'static {
    type Input: Clone + Send + Sync + 'static;
    type Output: Send + 'static;

    async fn run(&self, scope: TaskScope, input: Self::Input) -> Result<Self::Output, StepError>;
}

#[async_trait]
pub trait Substrate: Send + Sync + 'static {
    /// Run `step` until it succeeds, fails with a non-retryable kind, exhausts
    /// its attempts, or `scope` is cancelled. Each attempt is bounded by
    /// `options.timeout`.
    async fn run_step<T, F, Fut>(
        &self,
        scope: &TaskScope,
        options: StepOptions,
        step: F,
    ) -> Result<T, StepError>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, StepError>> + Send;

    /// Start a child pipeline without waiting for it. The child's scope is
    /// derived from `parent`, so cancelling the parent cancels the child.
    fn start_pipeline<W: Workflow>(
        &self,
        parent: &TaskScope,
        workflow: Arc<W>,
        options: StartOptions,
        input: W::Input,
    ) -> PipelineHandle<W::Output>;

    async fn await_pipeline<O: Send + 'static>(
        &self,
        handle: PipelineHandle<O>,
    ) -> Result<O, SubstrateError> {
        handle.join().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelling_parent_cancels_children() {
        let root = TaskScope::root("ad-content-1");
        let child = root.child("target-workflow-a");
        let grandchild = child.child("step");

        assert!(!grandchild.is_cancelled());
        root.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
    }

    #[test]
    fn test_cancelling_child_leaves_parent_running() {
        let root = TaskScope::root("ad-content-1");
        let child = root.child("target-workflow-a");
        let sibling = root.child("target-workflow-b");

        child.cancel();
        assert!(!root.is_cancelled());
        assert!(!sibling.is_cancelled());
        assert_eq!(child.id(), "target-workflow-a");
    }
}
