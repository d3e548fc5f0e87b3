// AI implementation using OpenAI
//
// This is the infrastructure implementation of BaseAI.
// Business logic (what to prompt for) lives in domain layers.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rig::completion::Prompt;
use rig::providers::openai;

use super::{BaseAI, CompletionOptions};

const PREAMBLE: &str = "You are an expert B2B marketing copywriter.";

/// OpenAI implementation of AI capabilities
#[derive(Clone)]
pub struct OpenAIClient {
    client: openai::Client,
}

impl OpenAIClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: openai::Client::new(api_key),
        }
    }
}

#[async_trait]
impl BaseAI for OpenAIClient {
    async fn complete_with_options(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String> {
        tracing::debug!(
            prompt_length = prompt.len(),
            model = %options.model,
            temperature = options.temperature,
            "Building OpenAI agent for completion"
        );

        let agent = self
            .client
            .agent(&options.model)
            .preamble(PREAMBLE)
            .temperature(options.temperature)
            .max_tokens(options.max_tokens)
            .build();

        let response = agent
            .prompt(prompt)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    model = %options.model,
                    prompt_preview = %preview(prompt),
                    "OpenAI API call failed"
                );
                e
            })
            .context("Failed to call OpenAI API")?;

        tracing::debug!(
            response_length = response.len(),
            model = %options.model,
            "OpenAI API response received"
        );

        Ok(response)
    }
}

/// First 200 bytes of the prompt, cut on a char boundary.
fn preview(prompt: &str) -> &str {
    let mut end = prompt.len().min(200);
    while !prompt.is_char_boundary(end) {
        end -= 1;
    }
    &prompt[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_respects_char_boundaries() {
        let prompt = "é".repeat(150);
        let cut = preview(&prompt);
        assert!(cut.len() <= 200);
        assert!(cut.chars().all(|c| c == 'é'));
        assert_eq!(preview("short"), "short");
    }
}
