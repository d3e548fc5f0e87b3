//! Personalization activities - the individual steps of a pipeline.
//!
//! Each activity performs one attempt and classifies its failure as a
//! `StepError`. Retries, timeouts and cancellation are applied by the
//! substrate around them.

pub mod config;
pub mod generate;
pub mod lookup;
pub mod persist;
pub mod target_context;

pub use config::{load_config, LoadedConfig, ORCHESTRATOR_CONFIG_RESOURCE, PIPELINE_CONFIG_RESOURCE};
pub use generate::{generate_personalized_content, GenerationRequest};
pub use lookup::{resolve_company, resolve_target};
pub use persist::persist_personalized_content;
pub use target_context::extract_target_context;
