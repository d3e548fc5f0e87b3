// Companies domain - the company whose marketing copy gets personalized
//
// Rows live in `company_info` and are read-only from the composer's side.

pub mod models;

pub use models::*;
