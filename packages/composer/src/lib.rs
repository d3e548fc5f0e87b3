// Ad Composer - Batch Personalization Core
//
// Personalizes marketing copy for many target accounts at once. A batch fans
// out into one isolated pipeline per job; every step runs through an execution
// substrate with its own retry and timeout policy.
//
// Workflows are organized per-domain in domains/*/workflows/

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;

pub use config::*;
