//! Email classification through a local language model
//!
//! The model is asked for one JSON object. Its reply is treated as untrusted:
//! the object is dug out of whatever text surrounds it and every field is
//! checked before it becomes a [`Decision`].

use crate::logger::{Logger, SharedLogger};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "qwen2:7b-instruct";

/// Classifier errors
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("LLM request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("LLM request failed with status {0}")]
    Status(u16),

    #[error("Invalid LLM JSON response: {0}")]
    InvalidJson(String),
}

/// The fixed set of categories, each doubling as a folder name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Orders,
    #[serde(rename = "Hotels and Travel")]
    HotelsAndTravel,
    Advertisement,
    Bills,
    Personal,
    Tech,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Orders,
        Category::HotelsAndTravel,
        Category::Advertisement,
        Category::Bills,
        Category::Personal,
        Category::Tech,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Orders => "Orders",
            Category::HotelsAndTravel => "Hotels and Travel",
            Category::Advertisement => "Advertisement",
            Category::Bills => "Bills",
            Category::Personal => "Personal",
            Category::Tech => "Tech",
        }
    }

    /// Exact, case-sensitive match on the category name
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Move,
    MarkRead,
    Archive,
    Ignore,
}

impl Action {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "move" => Some(Action::Move),
            "mark_read" => Some(Action::MarkRead),
            "archive" => Some(Action::Archive),
            "ignore" => Some(Action::Ignore),
            _ => None,
        }
    }
}

/// A validated classification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub category: Category,
    pub action: Action,
    pub folder: Option<String>,
    pub confidence: f64,
}

/// What the classifier is shown of an email
#[derive(Debug, Clone)]
pub struct EmailSummary {
    pub from: String,
    pub subject: String,
    pub content: String,
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, email: &EmailSummary) -> Result<Decision, ClassifyError>;
}

pub fn build_prompt(email: &EmailSummary) -> String {
    format!(
        r#"You are a French email classifier. Return ONLY strict JSON:

{{
  "category": "ONE_VALUE_AMONG: Orders|Hotels and Travel|Advertisement|Bills|Personal|Tech",
  "action": "move",
  "folder": "SAME_VALUE_AS_CATEGORY",
  "confidence": 0.85
}}

Strict rules - return EXACTLY ONE category:
- "Orders" = Amazon, e-commerce, purchase confirmations, deliveries
- "Hotels and Travel" = Booking, SNCF, airlines, Airbnb, travel
- "Advertisement" = Commercial newsletters, promotions, marketing, offers
- "Bills" = Bank, EDF, taxes, insurance, invoices, payments
- "Personal" = Friends, family, non-commercial personal emails
- "Tech" = GitHub, Stack Overflow, tech training, IT news, Azure, development

Reply ONLY the JSON, NO text before/after.

Email:
From: {}
Subject: {}
Content: {}"#,
        email.from, email.subject, email.content
    )
}

/// End index (exclusive) of the object starting at `start`, if it closes
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Pull the JSON object out of a model reply.
///
/// Prefers the first balanced `{...}`; otherwise spans from the first `{` to
/// the last `}`; with no braces at all yields `{}`.
pub fn extract_json_object(text: &str) -> &str {
    let Some(start) = text.find('{') else {
        return "{}";
    };
    if let Some(end) = balanced_end(text, start) {
        return &text[start..end];
    }
    match text.rfind('}') {
        Some(end) if end > start => &text[start..=end],
        _ => "{}",
    }
}

/// Turn the model's raw object into a [`Decision`], coercing bad fields
pub fn validate_decision(raw: &serde_json::Value, logger: &dyn Logger) -> Decision {
    let category = match raw.get("category").and_then(|v| v.as_str()) {
        Some(name) => Category::parse(name),
        None => None,
    };
    let category = category.unwrap_or_else(|| {
        logger.warn(&format!(
            "Invalid category: {}, defaulting to Advertisement",
            raw.get("category").unwrap_or(&serde_json::Value::Null)
        ));
        Category::Advertisement
    });

    let action = raw
        .get("action")
        .and_then(|v| v.as_str())
        .and_then(Action::parse)
        .unwrap_or_else(|| {
            logger.warn(&format!(
                "Invalid action: {}, defaulting to ignore",
                raw.get("action").unwrap_or(&serde_json::Value::Null)
            ));
            Action::Ignore
        });

    let confidence = raw
        .get("confidence")
        .and_then(|v| v.as_f64())
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(0.0);

    Decision {
        category,
        action,
        // Models decorate folder names; the category is authoritative
        folder: Some(category.as_str().to_string()),
        confidence,
    }
}

/// Parse a full model reply into a decision
pub fn parse_decision(reply: &str, logger: &dyn Logger) -> Result<Decision, ClassifyError> {
    let json = extract_json_object(reply);
    let raw: serde_json::Value = serde_json::from_str(json).map_err(|e| {
        logger.error(&format!("Failed to parse LLM response: {}", e));
        ClassifyError::InvalidJson(e.to_string())
    })?;
    if !raw.is_object() {
        return Err(ClassifyError::InvalidJson(format!("expected an object, got {}", raw)));
    }
    Ok(validate_decision(&raw, logger))
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Classifier backed by Ollama's `/api/generate`
pub struct OllamaClassifier {
    client: reqwest::Client,
    host: String,
    model: String,
    logger: SharedLogger,
}

impl OllamaClassifier {
    pub fn new(host: impl Into<String>, model: impl Into<String>, logger: SharedLogger) -> Self {
        Self {
            client: reqwest::Client::new(),
            host: host.into().trim_end_matches('/').to_string(),
            model: model.into(),
            logger,
        }
    }
}

#[async_trait]
impl Classifier for OllamaClassifier {
    async fn classify(&self, email: &EmailSummary) -> Result<Decision, ClassifyError> {
        let url = format!("{}/api/generate", self.host);
        self.logger
            .debug(&format!("LLM: classifying with model {}", self.model));

        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt: build_prompt(email),
                stream: false,
                options: GenerateOptions { temperature: 0.1 },
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            self.logger
                .error(&format!("LLM request failed with status {}", status));
            return Err(ClassifyError::Status(status.as_u16()));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ClassifyError::InvalidJson(e.to_string()))?;

        parse_decision(body.response.as_deref().unwrap_or("{}"), self.logger.as_ref())
    }
}
