//! Prompt assembly and answer generation.

use super::types::Segment;
use super::{RagError, Result};
use crate::config::DEFAULT_PROMPT_TEMPLATE;
use crate::provider::CompletionProvider;
use std::sync::Arc;
use tracing::{debug, info};

/// Separator placed between context segments in the prompt.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Turns retrieved segments and a question into an answer.
///
/// The template instructs the model to answer only from the supplied
/// context. The model's response is returned verbatim.
#[derive(Clone)]
pub struct AnswerComposer {
    provider: Arc<dyn CompletionProvider>,
    template: String,
}

impl AnswerComposer {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }

    /// Replaces the prompt template.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] unless the template contains both
    /// `{context}` and `{question}`.
    pub fn with_template(mut self, template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains("{context}") || !template.contains("{question}") {
            return Err(RagError::InvalidConfig(
                "prompt template must contain {context} and {question}".to_string(),
            ));
        }
        self.template = template;
        Ok(self)
    }

    /// Builds the prompt for `question` over `context`, segments in the
    /// order given.
    pub fn build_prompt(&self, question: &str, context: &[Segment]) -> String {
        let joined = context
            .iter()
            .map(|segment| segment.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);

        render(&self.template, &joined, question)
    }

    /// Asks the language model to answer `question` from `context`.
    ///
    /// # Errors
    ///
    /// - [`RagError::NoActiveDocument`] if `context` is empty
    /// - [`RagError::Llm`] if the backend call fails
    /// - [`RagError::EmptyResponse`] if the backend answers with blank text
    pub async fn answer(&self, question: &str, context: &[Segment]) -> Result<String> {
        if context.is_empty() {
            return Err(RagError::NoActiveDocument);
        }

        let prompt = self.build_prompt(question, context);
        debug!(segments = context.len(), prompt_len = prompt.len(), "Sending prompt to language model");

        let answer = self.provider.generate(&prompt).await.map_err(RagError::Llm)?;
        if answer.trim().is_empty() {
            return Err(RagError::EmptyResponse);
        }

        info!(answer_len = answer.len(), "Received answer");
        Ok(answer)
    }
}

/// Substitutes both placeholders in a single pass, so placeholder-like text
/// inside the question or the document is never expanded.
fn render(template: &str, context: &str, question: &str) -> String {
    let mut out = String::with_capacity(template.len() + context.len() + question.len());
    let mut rest = template;

    loop {
        let next = [("{context}", context), ("{question}", question)]
            .into_iter()
            .filter_map(|(placeholder, value)| rest.find(placeholder).map(|pos| (pos, placeholder, value)))
            .min_by_key(|(pos, _, _)| *pos);

        match next {
            Some((pos, placeholder, value)) => {
                out.push_str(&rest[..pos]);
                out.push_str(value);
                rest = &rest[pos + placeholder.len()..];
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}
