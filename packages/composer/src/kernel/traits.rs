// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// What to prompt for, and how failures are classified, lives in the
// personalization activities.
//
// Naming convention: Base* for trait names (e.g., BaseAI, BaseWebScraper)

use anyhow::Result;
use async_trait::async_trait;

use crate::common::{CompanyId, TargetId};
use crate::domains::companies::Company;
use crate::domains::personalization::models::{NewPersonalizedContent, PersonalizedContent};
use crate::domains::targets::Target;

// =============================================================================
// AI Trait (Infrastructure - Generic LLM capabilities)
// =============================================================================

/// Per-call completion settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u64,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

#[async_trait]
pub trait BaseAI: Send + Sync {
    /// Complete a prompt with an LLM (returns raw text response)
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.complete_with_options(prompt, &CompletionOptions::default())
            .await
    }

    /// Complete a prompt with explicit model/temperature/token settings
    async fn complete_with_options(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String>;
}

// =============================================================================
// Web Scraper Trait (Infrastructure)
// =============================================================================

/// A single scraped page
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeResult {
    pub url: String,
    pub markdown: String,
    pub title: Option<String>,
}

#[async_trait]
pub trait BaseWebScraper: Send + Sync {
    /// Fetch one page and return its main content as markdown
    async fn scrape(&self, url: &str) -> Result<ScrapeResult>;
}

// =============================================================================
// Content Store Trait (Infrastructure - point reads and append-only writes)
// =============================================================================

#[async_trait]
pub trait BaseContentStore: Send + Sync {
    async fn find_company(&self, id: CompanyId) -> Result<Option<Company>>;

    async fn find_target(&self, id: TargetId) -> Result<Option<Target>>;

    async fn insert_personalized_content(
        &self,
        record: &NewPersonalizedContent,
    ) -> Result<PersonalizedContent>;
}
