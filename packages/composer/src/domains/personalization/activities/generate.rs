use crate::domains::companies::Company;
use crate::domains::personalization::types::Job;
use crate::domains::targets::Target;
use crate::kernel::substrate::{ErrorKind, StepError};
use crate::kernel::{BaseAI, CompletionOptions};

/// Everything the generator needs for one job.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub company_name: String,
    pub company_description: String,
    pub target_name: String,
    pub target_context: String,
    pub content_type: String,
    pub original_text: String,
}

impl GenerationRequest {
    pub fn new(company: &Company, target: &Target, target_context: &str, job: &Job) -> Self {
        Self {
            company_name: company.company_name.clone(),
            company_description: company.description().to_string(),
            target_name: target.name.clone(),
            target_context: target_context.to_string(),
            content_type: job.content_type.clone(),
            original_text: job.source_text.clone(),
        }
    }

    pub fn prompt(&self) -> String {
        let context = if self.target_context.trim().is_empty() {
            "No additional context available."
        } else {
            self.target_context.trim()
        };

        format!(
            "You are a marketing expert specializing in personalized B2B content creation.\n\
             \n\
             Your company (content creator): {company}\n\
             Your company description: {description}\n\
             \n\
             Target client: {target}\n\
             Target client's website context: {context}\n\
             \n\
             Content type: {content_type}\n\
             Original Text: {original}\n\
             \n\
             Personalization Guidelines:\n\
             - Keep the personalized text concise and roughly the same length as the original text\n\
             - Tailor our ({company}) content specifically for {target}'s needs and challenges\n\
             - Maintain a professional B2B tone while being compelling and relevant\n\
             - Don't add quotes unless original text contains quotes\n\
             - Adapt the content to be appropriate for the content type: {content_type}\n\
             \n\
             Personalized version:",
            company = self.company_name,
            description = self.company_description,
            target = self.target_name,
            context = context,
            content_type = self.content_type,
            original = self.original_text,
        )
    }
}

/// Generate the personalized copy. An empty answer counts as a failed attempt.
pub async fn generate_personalized_content(
    ai: &dyn BaseAI,
    request: &GenerationRequest,
    options: &CompletionOptions,
) -> Result<String, StepError> {
    let response = ai
        .complete_with_options(&request.prompt(), options)
        .await
        .map_err(|e| StepError::new(ErrorKind::GenerationError, format!("{:#}", e)))?;

    let text = clean_output(&response, &request.original_text);
    if text.is_empty() {
        return Err(StepError::new(
            ErrorKind::GenerationError,
            "generator returned empty text",
        ));
    }

    Ok(text)
}

/// Trim whitespace and drop wrapping quotes the original never had.
fn clean_output(response: &str, original: &str) -> String {
    let text = response.trim();
    let original_quoted = original.contains('"') || original.contains('\u{201c}');

    if !original_quoted && text.chars().count() >= 2 {
        for (open, close) in [('"', '"'), ('\u{201c}', '\u{201d}')] {
            if let Some(inner) = text
                .strip_prefix(open)
                .and_then(|rest| rest.strip_suffix(close))
            {
                return inner.trim().to_string();
            }
        }
    }

    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{CompanyId, TargetId};
    use crate::kernel::MockAI;

    fn request(original: &str, context: &str) -> GenerationRequest {
        let company = Company::new(CompanyId::new(1), "Acme").with_description("AP automation");
        let target = Target::new(TargetId::new(10), "Globex");
        let job = Job::new(
            CompanyId::new(1),
            TargetId::new(10),
            "product_overview",
            original,
        );
        GenerationRequest::new(&company, &target, context, &job)
    }

    #[test]
    fn test_prompt_carries_all_inputs() {
        let prompt = request("Close your books faster.", "Globex struggles with invoices").prompt();
        assert!(prompt.contains("Your company (content creator): Acme"));
        assert!(prompt.contains("AP automation"));
        assert!(prompt.contains("Target client: Globex"));
        assert!(prompt.contains("Globex struggles with invoices"));
        assert!(prompt.contains("Original Text: Close your books faster."));
        assert!(prompt.contains("content type: product_overview"));
    }

    #[test]
    fn test_prompt_without_context() {
        let prompt = request("X", "  ").prompt();
        assert!(prompt.contains("No additional context available."));
    }

    #[test]
    fn test_clean_output_strips_added_quotes() {
        assert_eq!(clean_output(" \"Hello Globex\" ", "Hello"), "Hello Globex");
        assert_eq!(
            clean_output("\"Hello Globex\"", "\"Hello\""),
            "\"Hello Globex\""
        );
        assert_eq!(clean_output("\"", "x"), "\"");
    }

    #[tokio::test]
    async fn test_empty_output_is_generation_error() {
        let ai = MockAI::new().with_response("   ");
        let err = generate_personalized_content(&ai, &request("X", ""), &CompletionOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::GenerationError);
    }

    #[tokio::test]
    async fn test_uses_configured_model() {
        let ai = MockAI::new().with_response("X for Globex");
        let options = CompletionOptions {
            model: "gpt-4o-mini".into(),
            temperature: 0.3,
            max_tokens: 200,
        };

        let text = generate_personalized_content(&ai, &request("X", ""), &options)
            .await
            .unwrap();

        assert_eq!(text, "X for Globex");
        assert_eq!(ai.calls()[0].options, options);
    }
}
