//! Gemini 客户端
//!
//! 直接调用 Generative Language REST 接口 `models/{model}:generateContent`

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::generator::CompletionProvider;
use crate::domain::{ProviderConfig, SamplingParams};

/// Gemini 客户端
pub struct GeminiProvider {
    api_key: SecretString,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Debug)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

impl From<&SamplingParams> for GenerationConfig {
    fn from(params: &SamplingParams) -> Self {
        Self {
            temperature: params.temperature,
            top_k: params.top_k,
            top_p: params.top_p,
            max_output_tokens: params.max_output_tokens,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// 拼接第一个候选的全部文本片段
    fn text(self) -> Result<String> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            anyhow::bail!("gemini blocked the prompt: {}", reason);
        }
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .context("empty response from gemini")?;
        let finish_reason = candidate.finish_reason;
        let text: String = candidate
            .content
            .unwrap_or_default()
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect();
        if text.is_empty() {
            anyhow::bail!(
                "gemini returned no text (finish reason: {})",
                finish_reason.as_deref().unwrap_or("unknown")
            );
        }
        Ok(text)
    }
}

impl GeminiProvider {
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build gemini http client")?;

        Ok(Self {
            api_key: SecretString::new(config.api_key.expose_secret().clone()),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url,
            urlencoding::encode(&self.model)
        )
    }

    /// 调用 generateContent
    pub async fn generate_content(&self, prompt: &str, sampling: &SamplingParams) -> Result<String> {
        let req = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig::from(sampling),
        };

        debug!(model = %self.model, "gemini generateContent request");

        let res = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&req)
            .send()
            .await
            .context("failed to call gemini")?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("gemini returned HTTP {}: {}", status, body);
        }

        let body: GenerateContentResponse = res
            .json()
            .await
            .context("failed to parse gemini response")?;

        body.text()
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, prompt: &str, sampling: &SamplingParams) -> Result<String> {
        self.generate_content(prompt, sampling).await
    }
}
