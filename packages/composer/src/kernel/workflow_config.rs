//! Workflow configuration resources.
//!
//! The orchestrator and every pipeline load their tunables from a named YAML
//! resource (`ad_content_workflow_config.yaml`, `target_workflow_config.yaml`).
//! Each scope loads its own snapshot and passes it down explicitly; nothing is
//! cached at module level.
//!
//! # Example resource
//!
//! ```yaml
//! task_queue: ad-composer-task-queue
//! timeouts:
//!   workflow_execution: 1800
//!   activity: 300
//! retry_policy:
//!   initial_interval: 1
//!   backoff_coefficient: 2.0
//!   maximum_interval: 60
//!   maximum_attempts: 3
//!   non_retryable_error_types: []
//!   categories:
//!     generation:
//!       maximum_attempts: 5
//! max_concurrent_activities: 10
//! max_concurrent_workflows: 5
//! openai:
//!   model: gpt-4o
//!   temperature: 0.7
//!   max_tokens: 1000
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_TASK_QUEUE: &str = "ad-composer-task-queue";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("config resource not found: {resource}")]
    NotFound { resource: String },

    #[error("config resource {resource} could not be read: {message}")]
    Unreadable { resource: String, message: String },

    #[error("config resource {resource} is malformed: {message}")]
    Parse { resource: String, message: String },

    #[error("invalid config value for {field}: {message}")]
    Invalid { field: String, message: String },
}

// =============================================================================
// Config document
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub task_queue: String,
    pub timeouts: TimeoutsConfig,
    pub retry_policy: RetryPolicyConfig,
    pub max_concurrent_activities: usize,
    pub max_concurrent_workflows: usize,
    pub openai: OpenAiConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            task_queue: DEFAULT_TASK_QUEUE.to_string(),
            timeouts: TimeoutsConfig::default(),
            retry_policy: RetryPolicyConfig::default(),
            max_concurrent_activities: 10,
            max_concurrent_workflows: 5,
            openai: OpenAiConfig::default(),
        }
    }
}

impl WorkflowConfig {
    /// Parse a YAML document. `resource` is only used in error messages.
    pub fn from_yaml(resource: &str, raw: &str) -> Result<Self, ConfigError> {
        // An empty document is a valid "all defaults" config
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(raw).map_err(|e| ConfigError::Parse {
            resource: resource.to_string(),
            message: e.to_string(),
        })
    }
}

/// Timeouts in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Overall wall-clock ceiling for one pipeline run, retries included.
    pub workflow_execution: u64,
    /// Baseline ceiling for a single step attempt.
    pub activity: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            workflow_execution: 1800,
            activity: 300,
        }
    }
}

/// Retry settings. Every field is optional; the policy resolver fills in
/// defaults for whatever is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub initial_interval: Option<f64>,
    pub backoff_coefficient: Option<f64>,
    pub maximum_interval: Option<f64>,
    pub maximum_attempts: Option<u32>,
    pub non_retryable_error_types: Option<Vec<String>>,
}

impl RetrySection {
    /// Field-by-field overlay: values set on `self` win over `base`.
    pub fn overlay(&self, base: &RetrySection) -> RetrySection {
        RetrySection {
            initial_interval: self.initial_interval.or(base.initial_interval),
            backoff_coefficient: self.backoff_coefficient.or(base.backoff_coefficient),
            maximum_interval: self.maximum_interval.or(base.maximum_interval),
            maximum_attempts: self.maximum_attempts.or(base.maximum_attempts),
            non_retryable_error_types: self
                .non_retryable_error_types
                .clone()
                .or_else(|| base.non_retryable_error_types.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicyConfig {
    #[serde(flatten)]
    pub base: RetrySection,
    /// Per-category overrides keyed by `storage`, `external_fetch`,
    /// `generation` or `spawn`.
    pub categories: HashMap<String, RetrySection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

// =============================================================================
// Providers
// =============================================================================

/// Loads a named configuration resource.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    async fn load(&self, resource: &str) -> Result<WorkflowConfig, ConfigError>;
}

/// Reads YAML resources from a directory on disk.
#[derive(Debug, Clone)]
pub struct FileConfigProvider {
    root: PathBuf,
}

impl FileConfigProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ConfigProvider for FileConfigProvider {
    async fn load(&self, resource: &str) -> Result<WorkflowConfig, ConfigError> {
        let path = self.root.join(resource);
        debug!(path = %path.display(), "Loading workflow config");

        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    resource: resource.to_string(),
                }
            } else {
                ConfigError::Unreadable {
                    resource: resource.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        WorkflowConfig::from_yaml(resource, &raw)
    }
}

/// In-memory resources, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    documents: HashMap<String, String>,
}

impl StaticConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, resource: impl Into<String>, yaml: impl Into<String>) -> Self {
        self.documents.insert(resource.into(), yaml.into());
        self
    }
}

#[async_trait]
impl ConfigProvider for StaticConfigProvider {
    async fn load(&self, resource: &str) -> Result<WorkflowConfig, ConfigError> {
        let raw = self
            .documents
            .get(resource)
            .ok_or_else(|| ConfigError::NotFound {
                resource: resource.to_string(),
            })?;
        WorkflowConfig::from_yaml(resource, raw)
    }
}
