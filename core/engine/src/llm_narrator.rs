use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::{LLMConfig, LLMProvider};

/// Produces prose from a prompt. Best-effort: callers decide whether an
/// error aborts their step or degrades it.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Narrator backed by an Ollama or OpenAI-compatible endpoint
pub struct LLMNarrator {
    config: LLMConfig,
    client: Client,
}

impl LLMNarrator {
    pub fn new(config: LLMConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client for narrator")?;

        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(LLMConfig::from_env()?)
    }

    /// Call Ollama API
    async fn call_ollama(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.config.base_url);

        let request_body = json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": 0.7,
                "top_p": 0.9,
                "num_predict": 1000,
            }
        });

        debug!("Calling Ollama at {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .context("Failed to call Ollama API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama API error {}: {}", status, error_text);
        }

        #[derive(Deserialize)]
        struct OllamaResponse {
            response: String,
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(ollama_response.response)
    }

    /// Call OpenAI API
    async fn call_openai(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);

        let request_body = json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You write concise, factual summaries of engineering work for management review."
                },
                {
                    "role": "user",
                    "content": prompt
                }
            ],
            "temperature": 0.7,
            "max_tokens": 1000
        });

        debug!("Calling OpenAI at {}", url);

        let mut request = self.client.post(&url).json(&request_body);

        if let Some(ref api_key) = self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.context("Failed to call OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error {}: {}", status, error_text);
        }

        #[derive(Deserialize)]
        struct OpenAIResponse {
            choices: Vec<OpenAIChoice>,
        }

        #[derive(Deserialize)]
        struct OpenAIChoice {
            message: OpenAIMessage,
        }

        #[derive(Deserialize)]
        struct OpenAIMessage {
            content: String,
        }

        let openai_response: OpenAIResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI response")?;

        openai_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("No response from OpenAI"))
    }
}

#[async_trait]
impl NarrativeGenerator for LLMNarrator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        info!("Requesting completion from {:?} model {}", self.config.provider, self.config.model);

        let text = match self.config.provider {
            LLMProvider::Ollama => self.call_ollama(prompt).await?,
            LLMProvider::OpenAI => self.call_openai(prompt).await?,
        };

        debug!("Completion returned {} characters", text.len());
        Ok(text)
    }
}

/// Prompt templates shared by summary and meeting generation
pub mod prompts {
    pub fn work_summary(work_data: &str) -> String {
        format!(
            r#"Please analyze the following engineer work data and provide a concise, professional summary:

Work Data:
{}

Please provide:
1. Key accomplishments and contributions
2. Collaboration highlights
3. Technical achievements
4. Areas of focus
5. Overall productivity assessment

Format the response as a clear, structured summary suitable for management review."#,
            work_data
        )
    }

    pub fn meeting_minutes(transcript: &str, participants: &[String]) -> String {
        format!(
            r#"Please analyze the following meeting transcript and generate professional meeting minutes.

Meeting Attendees: {}

Transcript:
{}

Please provide:
1. Meeting summary
2. Key discussion points
3. Decisions made
4. Action items with owners (if mentioned)
5. Next steps

Format as professional meeting minutes suitable for distribution to stakeholders."#,
            participants.join(", "),
            transcript
        )
    }

    /// Prompt asking for one section out of an already generated narrative
    pub fn extract_section(instruction: &str, narrative: &str, list_hint: &str) -> String {
        format!(
            "{}:\n\n{}\n\nProvide a bulleted list of {}.",
            instruction, narrative, list_hint
        )
    }
}
