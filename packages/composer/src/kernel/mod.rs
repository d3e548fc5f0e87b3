// Kernel - infrastructure shared by every domain
//
// Traits for external services, their production implementations, the
// workflow config provider and the execution substrate.

pub mod ai;
pub mod deps;
pub mod simple_scraper;
pub mod store;
pub mod substrate;
pub mod test_dependencies;
pub mod traits;
pub mod workflow_config;

pub use ai::OpenAIClient;
pub use deps::ServerDeps;
pub use simple_scraper::SimpleScraper;
pub use store::PostgresContentStore;
pub use test_dependencies::{MockAI, MockContentStore, MockWebScraper, TestDependencies};
pub use traits::*;
pub use workflow_config::{
    ConfigError, ConfigProvider, FileConfigProvider, StaticConfigProvider, WorkflowConfig,
};
