// Personalization domain - batch personalization of marketing copy
//
// Responsibilities:
// - Fan a batch of jobs out into one isolated pipeline per job
// - Resolve company and target, pull optional target context, generate and
//   persist the personalized copy
// - Turn every per-job failure into a structured outcome so one bad job never
//   sinks the batch

pub mod activities;
pub mod models;
pub mod types;
pub mod workflows;

pub use types::*;
pub use workflows::*;
