pub mod batch;
pub mod target_pipeline;

pub use batch::*;
pub use target_pipeline::*;
