use async_trait::async_trait;
use report_fusion::{SummaryBudget, Summarizer};
use rig::{agent::Agent, client::CompletionClient, completion::Prompt, providers::openrouter};
use tracing::debug;

const PREAMBLE: &str = "You are a clinical text summarizer for radiology reports. \
    You condense report text without adding findings that are not in it.";

/// Abstractive summarizer backed by an OpenRouter-hosted LLM through rig.
pub struct LlmSummarizer {
    agent: Agent<openrouter::CompletionModel>,
}

impl LlmSummarizer {
    pub fn new(api_key: &str, model: &str) -> Self {
        let client = openrouter::Client::new(api_key);
        let agent = client.agent(model).preamble(PREAMBLE).build();
        Self { agent }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, text: &str, budget: SummaryBudget) -> anyhow::Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        let prompt = summary_prompt(text, budget);
        let summary = self.agent.prompt(prompt.as_str()).await?;

        debug!(
            input_chars = text.len(),
            output_chars = summary.len(),
            "Summarized clinical text"
        );
        Ok(summary.trim().to_string())
    }
}

fn summary_prompt(text: &str, budget: SummaryBudget) -> String {
    format!(
        "Summarize the following radiology text in at least {} and at most {} words. \
        Keep clinical terminology. Return only the summary.

        Text:
        {}",
        budget.min_length, budget.max_length, text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_text_short_circuits() {
        let summarizer = LlmSummarizer::new("sk-test", "test-model");

        let summary = summarizer
            .summarize("", SummaryBudget::for_text(""))
            .await
            .unwrap();
        assert_eq!(summary, "");

        let whitespace = summarizer
            .summarize(" \n", SummaryBudget::new(3, 8))
            .await
            .unwrap();
        assert_eq!(whitespace, "");
    }

    #[test]
    fn test_prompt_carries_budget() {
        let prompt = summary_prompt("Mild opacity. \n", SummaryBudget::new(3, 8));
        assert!(prompt.contains("at least 3 and at most 8 words"));
        assert!(prompt.contains("Mild opacity."));
    }
}
