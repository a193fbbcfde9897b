use crate::models::scan::Finding;
use crate::utils::normalize;
use anyhow::{anyhow, Result};
use log::{error, info};
use serde::{Deserialize, Serialize};

/// Upper bound on the assembled source text sent to the model. Truncation
/// past this point is silent and best-effort, not an error.
pub const MAX_SOURCE_CHARS: usize = 60_000;

const ANALYSIS_INSTRUCTION: &str = r#"You are a code security auditor. Analyze the provided source code for vulnerabilities.

Look for: SQL/NoSQL injection, broken authentication or session handling, hardcoded secrets or credential exposure, security misconfiguration, insecure deserialization, use of outdated or vulnerable dependencies, insufficient logging of security events, server-side request forgery, command injection.

Respond ONLY with a JSON array of finding objects, nothing else. Each finding has this exact shape:
{"file": "<file path, or 'snippet' for pasted code>", "line": <line number>, "severity": "Critical" | "High" | "Low", "issue": "<short description>", "fix_suggestion": "<how to fix it>"}

If no vulnerabilities are found, respond with []. No markdown, no code fences, no explanation."#;

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: String,
}

pub struct AnalysisClient {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl AnalysisClient {
    pub fn new(api_key: Option<String>, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(base_url: &str, api_key: Option<String>, model: String) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::new(api_key, model)
        }
    }

    /// Detection oracle: one completion call over the assembled source text,
    /// normalized into the closed findings shape. A missing credential
    /// degrades to a synthetic finding; an unreachable API surfaces as `Err`
    /// for the caller to downgrade.
    pub async fn analyze(&self, source: &str) -> Result<Vec<Finding>> {
        let Some(api_key) = self.api_key.as_deref() else {
            info!("No completion API key configured; skipping analysis");
            return Ok(vec![Finding::synthetic(
                "Analysis unavailable: completion API key is not configured",
                "Set GEMINI_API_KEY to enable vulnerability detection",
            )]);
        };

        let truncated: String = source.chars().take(MAX_SOURCE_CHARS).collect();
        let prompt = format!("{}\n\nSource code to audit:\n\n{}", ANALYSIS_INSTRUCTION, truncated);

        let completion = self.generate_content(api_key, &prompt).await?;
        Ok(normalize::parse_findings(&completion))
    }

    async fn generate_content(&self, api_key: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                top_k: 40,
                top_p: 0.95,
                max_output_tokens: 4096,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("X-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Completion API error {}: {}", status, error_text);
            return Err(anyhow!("Completion API error: {}", status));
        }

        let gemini_response: GeminiResponse = response.json().await?;

        let text = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| anyhow!("No content in completion response"))?;

        Ok(text)
    }
}
