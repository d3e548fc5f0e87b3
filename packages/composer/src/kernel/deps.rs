//! Composer dependencies (using traits for testability)
//!
//! Central container handed to the orchestrator and every pipeline. All
//! external services sit behind trait objects so tests can swap in mocks.

use std::sync::Arc;

use super::workflow_config::ConfigProvider;
use super::{BaseAI, BaseContentStore, BaseWebScraper};

#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn BaseContentStore>,
    pub ai: Arc<dyn BaseAI>,
    pub web_scraper: Arc<dyn BaseWebScraper>,
    pub config_provider: Arc<dyn ConfigProvider>,
}

impl ServerDeps {
    pub fn new(
        store: Arc<dyn BaseContentStore>,
        ai: Arc<dyn BaseAI>,
        web_scraper: Arc<dyn BaseWebScraper>,
        config_provider: Arc<dyn ConfigProvider>,
    ) -> Self {
        Self {
            store,
            ai,
            web_scraper,
            config_provider,
        }
    }
}
