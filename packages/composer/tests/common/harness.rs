//! Test harness wiring mock collaborators into a local substrate.
//!
//! Every test gets fresh mocks, so call recordings never leak between tests.

use composer_core::domains::personalization::JobOrchestrator;
use composer_core::kernel::substrate::{LocalSubstrate, WorkerOptions};
use composer_core::kernel::{MockAI, TestDependencies};
use std::sync::Arc;
use test_context::AsyncTestContext;

use super::seeded_store;

pub const DEFAULT_PERSONALIZED_TEXT: &str = "Personalized copy";

/// Test harness holding the mocks and the substrate they run on.
///
/// # Example using test-context
///
/// ```ignore
/// use test_context::test_context;
///
/// #[test_context(TestHarness)]
/// #[tokio::test(start_paused = true)]
/// async fn my_test(ctx: &TestHarness) {
///     let result = ctx.orchestrator().run_batch(jobs).await.unwrap();
/// }
/// ```
pub struct TestHarness {
    pub deps: TestDependencies,
    pub substrate: Arc<LocalSubstrate>,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new()
    }

    async fn teardown(self) {
        // Mocks are dropped with the harness
    }
}

impl TestHarness {
    /// Seeded store, an AI that always answers, default throttles.
    pub fn new() -> Self {
        Self::with_deps(
            TestDependencies::new()
                .mock_store(seeded_store())
                .mock_ai(MockAI::new().with_default_response(DEFAULT_PERSONALIZED_TEXT)),
        )
    }

    pub fn with_deps(deps: TestDependencies) -> Self {
        Self::with_worker_options(deps, WorkerOptions::default())
    }

    pub fn with_worker_options(deps: TestDependencies, options: WorkerOptions) -> Self {
        // Respect RUST_LOG; try_init so repeated harnesses don't panic
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        Self {
            deps,
            substrate: Arc::new(LocalSubstrate::new(options)),
        }
    }

    pub fn orchestrator(&self) -> JobOrchestrator<LocalSubstrate> {
        JobOrchestrator::new(self.substrate.clone(), self.deps.to_deps())
    }
}
