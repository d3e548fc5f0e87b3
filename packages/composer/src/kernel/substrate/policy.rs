//! Retry and timeout policies.
//!
//! A `PolicySet` is resolved once per invocation from that scope's config
//! snapshot. Each step receives an `Arc<Policy>` clone, so a policy bound to a
//! running retry loop never changes underneath it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::{ErrorKind, StartOptions, StepOptions};
use crate::kernel::workflow_config::{ConfigError, RetrySection, WorkflowConfig};

const DEFAULT_INITIAL_BACKOFF_SECS: f64 = 1.0;
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
const DEFAULT_MAX_BACKOFF_SECS: f64 = 60.0;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub initial_backoff: Duration,
    pub backoff_multiplier: f64,
    pub max_backoff: Duration,
    /// Total attempts allowed, first attempt included. `0` means unlimited.
    pub max_attempts: u32,
    pub non_retryable_error_kinds: Vec<String>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs_f64(DEFAULT_INITIAL_BACKOFF_SECS),
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_backoff: Duration::from_secs_f64(DEFAULT_MAX_BACKOFF_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            non_retryable_error_kinds: Vec::new(),
        }
    }
}

impl Policy {
    /// One attempt, no retries.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry `n` (1-based): `min(initial * multiplier^(n-1), max)`.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let max = self.max_backoff.as_secs_f64();

        if !secs.is_finite() || secs >= max {
            self.max_backoff
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    pub fn has_attempts_left(&self, attempts_made: u32) -> bool {
        self.max_attempts == 0 || attempts_made < self.max_attempts
    }

    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        !kind.is_always_terminal()
            && !self
                .non_retryable_error_kinds
                .iter()
                .any(|k| k == kind.as_str())
    }

    /// Resolve a config section, falling back to defaults field by field.
    pub fn resolve(section: &RetrySection, field_prefix: &str) -> Result<Self, ConfigError> {
        let initial_backoff = seconds(
            section.initial_interval.unwrap_or(DEFAULT_INITIAL_BACKOFF_SECS),
            field_prefix,
            "initial_interval",
        )?;
        let max_backoff = seconds(
            section.maximum_interval.unwrap_or(DEFAULT_MAX_BACKOFF_SECS),
            field_prefix,
            "maximum_interval",
        )?;

        let backoff_multiplier = section
            .backoff_coefficient
            .unwrap_or(DEFAULT_BACKOFF_MULTIPLIER);
        if !backoff_multiplier.is_finite() || backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid {
                field: format!("{}.backoff_coefficient", field_prefix),
                message: format!("must be a number >= 1.0, got {}", backoff_multiplier),
            });
        }

        Ok(Self {
            initial_backoff,
            backoff_multiplier,
            max_backoff,
            max_attempts: section.maximum_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            non_retryable_error_kinds: section.non_retryable_error_types.clone().unwrap_or_default(),
        })
    }
}

fn seconds(value: f64, prefix: &str, name: &str) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::Invalid {
        field: format!("{}.{}", prefix, name),
        message: format!("must be a non-negative number of seconds, got {}", value),
    })
}

/// Step categories, each with its own policy and timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepCategory {
    /// Company/target lookups and the persist write.
    Storage,
    /// Target context extraction.
    ExternalFetch,
    Generation,
    /// Child pipeline starts.
    Spawn,
}

impl StepCategory {
    pub const ALL: [StepCategory; 4] = [
        StepCategory::Storage,
        StepCategory::ExternalFetch,
        StepCategory::Generation,
        StepCategory::Spawn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepCategory::Storage => "storage",
            StepCategory::ExternalFetch => "external_fetch",
            StepCategory::Generation => "generation",
            StepCategory::Spawn => "spawn",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == key)
    }
}

/// Policies and timeouts for every category, resolved from one config snapshot.
#[derive(Debug, Clone)]
pub struct PolicySet {
    storage: Arc<Policy>,
    external_fetch: Arc<Policy>,
    generation: Arc<Policy>,
    spawn: Arc<Policy>,
    activity_timeout: Duration,
    workflow_timeout: Duration,
}

impl PolicySet {
    pub fn from_config(config: &WorkflowConfig) -> Result<Self, ConfigError> {
        let retry = &config.retry_policy;

        for key in retry.categories.keys() {
            if StepCategory::from_key(key).is_none() {
                warn!(category = %key, "Ignoring unknown retry policy category");
            }
        }

        let resolve = |category: StepCategory| -> Result<Arc<Policy>, ConfigError> {
            let section = match retry.categories.get(category.as_str()) {
                Some(over) => over.overlay(&retry.base),
                None => retry.base.clone(),
            };
            let prefix = format!("retry_policy.categories.{}", category.as_str());
            Policy::resolve(&section, &prefix).map(Arc::new)
        };

        let activity_timeout = Duration::from_secs(config.timeouts.activity);
        let workflow_timeout = Duration::from_secs(config.timeouts.workflow_execution);
        if activity_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "timeouts.activity".into(),
                message: "must be greater than zero".into(),
            });
        }
        // Fetch and generation steps get twice the baseline
        if activity_timeout.checked_mul(2).is_none() {
            return Err(ConfigError::Invalid {
                field: "timeouts.activity".into(),
                message: format!("{} seconds is out of range", config.timeouts.activity),
            });
        }
        if workflow_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "timeouts.workflow_execution".into(),
                message: "must be greater than zero".into(),
            });
        }

        Ok(Self {
            storage: resolve(StepCategory::Storage)?,
            external_fetch: resolve(StepCategory::ExternalFetch)?,
            generation: resolve(StepCategory::Generation)?,
            spawn: resolve(StepCategory::Spawn)?,
            activity_timeout,
            workflow_timeout,
        })
    }

    pub fn policy(&self, category: StepCategory) -> Arc<Policy> {
        match category {
            StepCategory::Storage => self.storage.clone(),
            StepCategory::ExternalFetch => self.external_fetch.clone(),
            StepCategory::Generation => self.generation.clone(),
            StepCategory::Spawn => self.spawn.clone(),
        }
    }

    pub fn timeout(&self, category: StepCategory) -> Duration {
        match category {
            StepCategory::Storage => self.activity_timeout,
            StepCategory::ExternalFetch | StepCategory::Generation => {
                self.activity_timeout.saturating_mul(2)
            }
            StepCategory::Spawn => self.workflow_timeout,
        }
    }

    pub fn step(&self, name: &'static str, category: StepCategory) -> StepOptions {
        StepOptions::new(name, self.policy(category), self.timeout(category))
    }

    pub fn start(&self, kind: &'static str, id: impl Into<String>) -> StartOptions {
        StartOptions {
            kind,
            id: id.into(),
            policy: self.policy(StepCategory::Spawn),
            execution_timeout: self.timeout(StepCategory::Spawn),
        }
    }
}
