pub mod personalized_content;

pub use personalized_content::*;
