// Business domains
pub mod companies;
pub mod personalization;
pub mod targets;
