// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into ServerDeps for tests.
// Every mock records its calls so tests can assert on which steps ran.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::workflow_config::StaticConfigProvider;
use super::{BaseAI, BaseContentStore, BaseWebScraper, CompletionOptions, ScrapeResult, ServerDeps};
use crate::common::{CompanyId, PersonalizedContentId, TargetId};
use crate::domains::companies::Company;
use crate::domains::personalization::activities::config::{
    ORCHESTRATOR_CONFIG_RESOURCE, PIPELINE_CONFIG_RESOURCE,
};
use crate::domains::personalization::models::{NewPersonalizedContent, PersonalizedContent};
use crate::domains::targets::Target;

/// A panicking test must not poison every later assertion
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Mock Web Scraper
// =============================================================================

pub struct MockWebScraper {
    pages: Arc<Mutex<HashMap<String, String>>>,
    failing_urls: Arc<Mutex<HashSet<String>>>,
    scrape_calls: Arc<Mutex<Vec<String>>>,
}

impl MockWebScraper {
    pub fn new() -> Self {
        Self {
            pages: Arc::new(Mutex::new(HashMap::new())),
            failing_urls: Arc::new(Mutex::new(HashSet::new())),
            scrape_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Serve `markdown` for `url`
    pub fn with_page(self, url: &str, markdown: &str) -> Self {
        lock(&self.pages).insert(url.to_string(), markdown.to_string());
        self
    }

    /// Every scrape of `url` fails
    pub fn with_failing_url(self, url: &str) -> Self {
        lock(&self.failing_urls).insert(url.to_string());
        self
    }

    /// Get all URLs that were scraped
    pub fn scrape_calls(&self) -> Vec<String> {
        lock(&self.scrape_calls).clone()
    }

    /// Check if a URL was scraped
    pub fn was_scraped(&self, url: &str) -> bool {
        lock(&self.scrape_calls).iter().any(|u| u == url)
    }
}

impl Default for MockWebScraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseWebScraper for MockWebScraper {
    async fn scrape(&self, url: &str) -> Result<ScrapeResult> {
        lock(&self.scrape_calls).push(url.to_string());

        if lock(&self.failing_urls).contains(url) {
            anyhow::bail!("HTTP 503 Service Unavailable for {}", url);
        }

        let markdown = lock(&self.pages)
            .get(url)
            .cloned()
            .unwrap_or_else(|| "# Mock Content\n\nThis is mock scraped content.".to_string());

        Ok(ScrapeResult {
            url: url.to_string(),
            markdown,
            title: Some("Mock Page".to_string()),
        })
    }
}

// =============================================================================
// Mock AI (Generic LLM capabilities)
// =============================================================================

#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Fail(String),
}

/// A recorded completion call
#[derive(Debug, Clone)]
pub struct AICall {
    pub prompt: String,
    pub options: CompletionOptions,
}

pub struct MockAI {
    replies: Arc<Mutex<Vec<MockReply>>>,
    failing_patterns: Arc<Mutex<Vec<String>>>,
    default_response: String,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<AICall>>>,
}

impl MockAI {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(Vec::new())),
            failing_patterns: Arc::new(Mutex::new(Vec::new())),
            default_response: "Mock AI response".to_string(),
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a text response to the queue
    pub fn with_response(self, response: impl Into<String>) -> Self {
        lock(&self.replies).push(MockReply::Text(response.into()));
        self
    }

    /// Queue a single failure
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        lock(&self.replies).push(MockReply::Fail(message.into()));
        self
    }

    /// Any prompt containing `pattern` fails
    pub fn failing_when_prompt_contains(self, pattern: &str) -> Self {
        lock(&self.failing_patterns).push(pattern.to_string());
        self
    }

    /// Response used once the queue is empty
    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    /// Sleep before answering every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get all prompts that were sent to the AI
    pub fn calls(&self) -> Vec<AICall> {
        lock(&self.calls).clone()
    }

    /// Get the last prompt sent to the AI
    pub fn last_prompt(&self) -> Option<String> {
        lock(&self.calls).last().map(|c| c.prompt.clone())
    }

    /// Check if a prompt containing the given text was sent
    pub fn was_called_with(&self, text: &str) -> bool {
        lock(&self.calls).iter().any(|c| c.prompt.contains(text))
    }

    /// Get the number of times the AI was called
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

impl Default for MockAI {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseAI for MockAI {
    async fn complete_with_options(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String> {
        lock(&self.calls).push(AICall {
            prompt: prompt.to_string(),
            options: options.clone(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if lock(&self.failing_patterns)
            .iter()
            .any(|p| prompt.contains(p.as_str()))
        {
            anyhow::bail!("Mock AI rejected prompt");
        }

        let reply = {
            let mut replies = lock(&self.replies);
            if replies.is_empty() {
                None
            } else {
                Some(replies.remove(0))
            }
        };

        match reply {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Fail(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(self.default_response.clone()),
        }
    }
}

// =============================================================================
// Mock Content Store
// =============================================================================

pub struct MockContentStore {
    companies: Arc<Mutex<HashMap<CompanyId, Company>>>,
    targets: Arc<Mutex<HashMap<TargetId, Target>>>,
    inserted: Arc<Mutex<Vec<PersonalizedContent>>>,
    company_lookups: Arc<Mutex<Vec<CompanyId>>>,
    target_lookups: Arc<Mutex<Vec<TargetId>>>,
    insert_attempts: Arc<Mutex<u32>>,
    lookup_failures_left: Arc<Mutex<u32>>,
    insert_failures_left: Arc<Mutex<u32>>,
    next_id: AtomicI64,
}

impl MockContentStore {
    pub fn new() -> Self {
        Self {
            companies: Arc::new(Mutex::new(HashMap::new())),
            targets: Arc::new(Mutex::new(HashMap::new())),
            inserted: Arc::new(Mutex::new(Vec::new())),
            company_lookups: Arc::new(Mutex::new(Vec::new())),
            target_lookups: Arc::new(Mutex::new(Vec::new())),
            insert_attempts: Arc::new(Mutex::new(0)),
            lookup_failures_left: Arc::new(Mutex::new(0)),
            insert_failures_left: Arc::new(Mutex::new(0)),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn with_company(self, company: Company) -> Self {
        lock(&self.companies).insert(company.id, company);
        self
    }

    pub fn with_target(self, target: Target) -> Self {
        lock(&self.targets).insert(target.id, target);
        self
    }

    /// The next `count` lookups (company or target) fail with a transient error
    pub fn failing_next_lookups(self, count: u32) -> Self {
        *lock(&self.lookup_failures_left) = count;
        self
    }

    /// The next `count` inserts fail. `u32::MAX` fails every insert.
    pub fn failing_next_inserts(self, count: u32) -> Self {
        *lock(&self.insert_failures_left) = count;
        self
    }

    /// Records successfully stored, in insertion order
    pub fn inserted(&self) -> Vec<PersonalizedContent> {
        lock(&self.inserted).clone()
    }

    pub fn company_lookups(&self) -> Vec<CompanyId> {
        lock(&self.company_lookups).clone()
    }

    pub fn target_lookups(&self) -> Vec<TargetId> {
        lock(&self.target_lookups).clone()
    }

    /// Insert calls, failed ones included
    pub fn insert_attempts(&self) -> u32 {
        *lock(&self.insert_attempts)
    }

    fn take_failure(counter: &Mutex<u32>) -> bool {
        let mut left = lock(counter);
        match *left {
            0 => false,
            u32::MAX => true,
            _ => {
                *left -= 1;
                true
            }
        }
    }
}

impl Default for MockContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseContentStore for MockContentStore {
    async fn find_company(&self, id: CompanyId) -> Result<Option<Company>> {
        lock(&self.company_lookups).push(id);
        if Self::take_failure(&self.lookup_failures_left) {
            anyhow::bail!("connection reset while loading company {}", id);
        }
        Ok(lock(&self.companies).get(&id).cloned())
    }

    async fn find_target(&self, id: TargetId) -> Result<Option<Target>> {
        lock(&self.target_lookups).push(id);
        if Self::take_failure(&self.lookup_failures_left) {
            anyhow::bail!("connection reset while loading target {}", id);
        }
        Ok(lock(&self.targets).get(&id).cloned())
    }

    async fn insert_personalized_content(
        &self,
        record: &NewPersonalizedContent,
    ) -> Result<PersonalizedContent> {
        *lock(&self.insert_attempts) += 1;
        if Self::take_failure(&self.insert_failures_left) {
            anyhow::bail!("could not serialize access due to concurrent update");
        }

        let row = PersonalizedContent {
            id: PersonalizedContentId::new(self.next_id.fetch_add(1, Ordering::SeqCst)),
            company_info_id: record.company_info_id,
            target_account_id: record.target_account_id,
            original_text: record.original_text.clone(),
            personalized_text: record.personalized_text.clone(),
            text_type: record.text_type.clone(),
            created_at: Utc::now(),
        };
        lock(&self.inserted).push(row.clone());
        Ok(row)
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// Mock collaborators plus in-memory config, wired into `ServerDeps`.
pub struct TestDependencies {
    pub store: Arc<MockContentStore>,
    pub ai: Arc<MockAI>,
    pub web_scraper: Arc<MockWebScraper>,
    pub config: StaticConfigProvider,
}

impl TestDependencies {
    /// Mocks with both workflow config resources present and empty (all defaults)
    pub fn new() -> Self {
        Self {
            store: Arc::new(MockContentStore::new()),
            ai: Arc::new(MockAI::new()),
            web_scraper: Arc::new(MockWebScraper::new()),
            config: StaticConfigProvider::new()
                .with_document(ORCHESTRATOR_CONFIG_RESOURCE, "")
                .with_document(PIPELINE_CONFIG_RESOURCE, ""),
        }
    }

    /// Set a mock content store
    pub fn mock_store(mut self, store: MockContentStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    /// Set a mock AI
    pub fn mock_ai(mut self, ai: MockAI) -> Self {
        self.ai = Arc::new(ai);
        self
    }

    /// Set a mock web scraper
    pub fn mock_scraper(mut self, scraper: MockWebScraper) -> Self {
        self.web_scraper = Arc::new(scraper);
        self
    }

    /// Replace the config resources
    pub fn with_config(mut self, config: StaticConfigProvider) -> Self {
        self.config = config;
        self
    }

    /// Use the same YAML for both the orchestrator and the pipeline resources
    pub fn with_workflow_yaml(self, yaml: &str) -> Self {
        self.with_config(
            StaticConfigProvider::new()
                .with_document(ORCHESTRATOR_CONFIG_RESOURCE, yaml)
                .with_document(PIPELINE_CONFIG_RESOURCE, yaml),
        )
    }

    /// Build a ServerDeps that shares these mocks
    pub fn to_deps(&self) -> ServerDeps {
        ServerDeps::new(
            self.store.clone(),
            self.ai.clone(),
            self.web_scraper.clone(),
            Arc::new(self.config.clone()),
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
