//! Target context extraction.
//!
//! Fetches the target's reference page and asks the LLM for a short brief on
//! the account. The pipeline treats failure here as soft: it continues with an
//! empty context.

use tracing::debug;

use crate::domains::targets::Target;
use crate::kernel::substrate::{ErrorKind, StepError};
use crate::kernel::{BaseAI, BaseWebScraper, CompletionOptions};

/// Upper bound on page text handed to the summarizer, in characters.
const MAX_PAGE_CHARS: usize = 12_000;

pub const CONTEXT_QUERY: &str =
    "Extract the key messaging, brand positioning, and main pain points of this company";

pub async fn extract_target_context(
    scraper: &dyn BaseWebScraper,
    ai: &dyn BaseAI,
    target: &Target,
    url: &str,
    options: &CompletionOptions,
) -> Result<String, StepError> {
    let page = scraper.scrape(url).await.map_err(|e| {
        StepError::new(
            ErrorKind::ContextExtractionError,
            format!("Failed to fetch {}: {:#}", url, e),
        )
    })?;

    let text = truncate_chars(page.markdown.trim(), MAX_PAGE_CHARS);
    if text.is_empty() {
        debug!(url = %url, "Reference page has no text; using empty context");
        return Ok(String::new());
    }

    let prompt = build_context_prompt(&target.name, text);

    // Extraction should be repeatable, so no sampling
    let options = CompletionOptions {
        temperature: 0.0,
        ..options.clone()
    };

    let summary = ai.complete_with_options(&prompt, &options).await.map_err(|e| {
        StepError::new(
            ErrorKind::ContextExtractionError,
            format!("Failed to summarize {}: {:#}", url, e),
        )
    })?;

    debug!(url = %url, context_length = summary.len(), "Extracted target context");
    Ok(summary.trim().to_string())
}

fn build_context_prompt(target_name: &str, page_text: &str) -> String {
    format!(
        "The following is content from the website of {name}.\n\n\
         ---\n{page}\n---\n\n\
         {query}. Answer in a few concise sentences using only the content above.",
        name = target_name,
        page = page_text,
        query = CONTEXT_QUERY,
    )
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
