//! The workflow config shipped in `config/` must load and resolve.

use composer_core::domains::personalization::activities::{
    ORCHESTRATOR_CONFIG_RESOURCE, PIPELINE_CONFIG_RESOURCE,
};
use composer_core::kernel::substrate::{PolicySet, StepCategory};
use composer_core::kernel::{ConfigProvider, FileConfigProvider};
use std::path::Path;
use std::time::Duration;

fn provider() -> FileConfigProvider {
    FileConfigProvider::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("config"))
}

#[tokio::test]
async fn test_shipped_orchestrator_config_resolves() {
    let config = provider().load(ORCHESTRATOR_CONFIG_RESOURCE).await.unwrap();
    let policies = PolicySet::from_config(&config).unwrap();

    assert_eq!(config.max_concurrent_workflows, 5);
    assert_eq!(config.max_concurrent_activities, 10);
    assert_eq!(policies.timeout(StepCategory::Spawn), Duration::from_secs(1800));
}

#[tokio::test]
async fn test_shipped_pipeline_config_resolves() {
    let config = provider().load(PIPELINE_CONFIG_RESOURCE).await.unwrap();
    let policies = PolicySet::from_config(&config).unwrap();

    assert_eq!(policies.policy(StepCategory::Generation).max_attempts, 4);
    assert_eq!(policies.policy(StepCategory::Storage).max_attempts, 3);
    let fetch = policies.policy(StepCategory::ExternalFetch);
    assert_eq!(fetch.max_attempts, 2);
    assert_eq!(fetch.max_backoff, Duration::from_secs(10));
    assert_eq!(policies.timeout(StepCategory::Generation), Duration::from_secs(600));
    assert_eq!(config.openai.model, "gpt-4o");
}
