use std::sync::Arc;
use std::time::Duration;

use crate::kernel::substrate::{Policy, PolicySet, StepError, StepOptions, Substrate, TaskScope};
use crate::kernel::workflow_config::{ConfigProvider, WorkflowConfig};
use crate::kernel::CompletionOptions;

/// Config resource read by the orchestrator.
pub const ORCHESTRATOR_CONFIG_RESOURCE: &str = "ad_content_workflow_config.yaml";
/// Config resource read by every pipeline.
pub const PIPELINE_CONFIG_RESOURCE: &str = "target_workflow_config.yaml";

const CONFIG_LOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// A config snapshot and the policies resolved from it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: WorkflowConfig,
    pub policies: PolicySet,
}

impl LoadedConfig {
    pub fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            model: self.config.openai.model.clone(),
            temperature: self.config.openai.temperature,
            max_tokens: self.config.openai.max_tokens,
        }
    }
}

/// Load `resource` as a single-attempt step. Config errors are not transient,
/// so there is nothing to retry.
pub async fn load_config<S: Substrate>(
    substrate: &S,
    scope: &TaskScope,
    provider: &dyn ConfigProvider,
    resource: &'static str,
) -> Result<LoadedConfig, StepError> {
    let options = StepOptions::new(
        "load_config",
        Arc::new(Policy::single_attempt()),
        CONFIG_LOAD_TIMEOUT,
    );

    substrate
        .run_step(scope, options, || async move {
            let config = provider.load(resource).await?;
            let policies = PolicySet::from_config(&config)?;
            Ok::<_, StepError>(LoadedConfig { config, policies })
        })
        .await
}
