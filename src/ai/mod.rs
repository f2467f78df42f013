//! AI-assisted transformation
//!
//! Each eligible file is first offered to a completion service. Only output
//! that reads as a Robot Framework file is kept; every other outcome is a
//! [`AiOutcome::Delegate`] and the deterministic pipeline takes over. Usage
//! is aggregated per run.

pub mod client;
pub mod prompts;

pub use client::OpenAiCompatibleClient;

use crate::model::FileRole;
use crate::validate::section_header;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    pub text: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub latency: Duration,
    /// USD, as reported by the provider; 0 when unknown
    pub cost: f64,
}

#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("completion timed out")]
    Timeout,
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// External completion service
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, CompletionError>;
}

/// Result of offering a file to the AI path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiOutcome {
    /// Well-formed Robot content, ready to use
    Produced(String),
    /// Try the next strategy
    Delegate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiRecordOutcome {
    Produced,
    /// The service answered but the text was not a Robot file
    Rejected,
    Failed,
}

/// One AI attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiFileRecord {
    pub path: String,
    pub role: FileRole,
    pub outcome: AiRecordOutcome,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub cost: f64,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated AI usage for one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiUsageMetrics {
    pub enabled: bool,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_cost: f64,
    pub records: Vec<AiFileRecord>,
}

impl AiUsageMetrics {
    fn record(&mut self, record: AiFileRecord) {
        self.prompt_tokens += u64::from(record.prompt_tokens);
        self.completion_tokens += u64::from(record.completion_tokens);
        self.total_cost += record.cost;
        self.records.push(record);
    }

    pub fn produced(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.outcome == AiRecordOutcome::Produced)
            .count()
    }

    pub fn fallbacks(&self) -> usize {
        self.records.len() - self.produced()
    }
}

#[derive(Debug, Clone)]
pub struct AiOptions {
    pub provider: String,
    pub model: String,
    pub region: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for AiOptions {
    fn default() -> Self {
        Self {
            provider: "openrouter".to_string(),
            model: "anthropic/claude-sonnet-4.5".to_string(),
            region: None,
            temperature: 0.1,
            max_tokens: 8192,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Section names a generated file may open with
const KNOWN_SECTIONS: &[&str] = &["setting", "variable", "test case", "task", "keyword", "comment"];

/// Strip markdown fences and check the text opens with a known section
/// header (comment lines such as a metadata line may precede it).
pub fn well_formed(text: &str) -> Option<String> {
    let mut body = text.trim();
    if body.starts_with("```") {
        let after_fence = body.find('\n').map(|i| &body[i + 1..]).unwrap_or("");
        body = after_fence.trim_end();
        body = body.strip_suffix("```").unwrap_or(body).trim_end();
    }
    let first = body
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))?;
    let section = section_header(first)?;
    if !KNOWN_SECTIONS.contains(&section.as_str()) {
        return None;
    }
    let mut out = body.to_string();
    out.push('\n');
    Some(out)
}

/// Delegates files to a completion service and tracks usage.
pub struct AiTransformer {
    service: Arc<dyn CompletionService>,
    options: AiOptions,
    usage: Mutex<AiUsageMetrics>,
}

impl AiTransformer {
    pub fn new(service: Arc<dyn CompletionService>, options: AiOptions) -> Self {
        let usage = AiUsageMetrics {
            enabled: true,
            provider: options.provider.clone(),
            model: options.model.clone(),
            ..Default::default()
        };
        Self {
            service,
            options,
            usage: Mutex::new(usage),
        }
    }

    /// Offer one file to the service. Any failure becomes `Delegate`.
    pub async fn transform(&self, path: &str, role: FileRole, content: &str, library: &str) -> AiOutcome {
        let request = CompletionRequest {
            messages: vec![
                ChatMessage::system(prompts::MIGRATION_SYSTEM),
                ChatMessage::user(prompts::migration_user_prompt(role, path, library, content)),
            ],
            model: self.options.model.clone(),
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
            timeout: self.options.timeout,
        };

        let result = match tokio::time::timeout(self.options.timeout, self.service.complete(&request)).await {
            Ok(result) => result,
            Err(_) => Err(CompletionError::Timeout),
        };

        let mut record = AiFileRecord {
            path: path.to_string(),
            role,
            outcome: AiRecordOutcome::Failed,
            prompt_tokens: 0,
            completion_tokens: 0,
            cost: 0.0,
            latency_ms: 0,
            error: None,
        };

        let outcome = match result {
            Ok(response) => {
                record.prompt_tokens = response.prompt_tokens;
                record.completion_tokens = response.completion_tokens;
                record.cost = response.cost;
                record.latency_ms = u64::try_from(response.latency.as_millis()).unwrap_or(u64::MAX);
                match well_formed(&response.text) {
                    Some(text) => {
                        record.outcome = AiRecordOutcome::Produced;
                        AiOutcome::Produced(text)
                    }
                    None => {
                        record.outcome = AiRecordOutcome::Rejected;
                        record.error = Some("response is not a Robot Framework file".to_string());
                        AiOutcome::Delegate
                    }
                }
            }
            Err(err) => {
                record.error = Some(err.to_string());
                AiOutcome::Delegate
            }
        };

        if outcome == AiOutcome::Delegate {
            tracing::debug!(path, error = ?record.error, "AI transform fell back");
        }
        self.metrics().record(record);
        outcome
    }

    pub fn usage(&self) -> AiUsageMetrics {
        self.metrics().clone()
    }

    fn metrics(&self) -> MutexGuard<'_, AiUsageMetrics> {
        self.usage.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedService;
    use super::*;

    const ROBOT: &str = "*** Settings ***\nLibrary    SeleniumLibrary\n\n*** Keywords ***\nA\n    Go To    url\n";

    fn transformer(service: ScriptedService) -> AiTransformer {
        AiTransformer::new(Arc::new(service), AiOptions::default())
    }

    #[test]
    fn test_well_formed_strips_fences() {
        let fenced = format!("```robot\n{}```", ROBOT);
        assert_eq!(well_formed(&fenced).as_deref(), Some(ROBOT));
        assert!(well_formed("Here is your file:\n*** Settings ***").is_none());
        assert!(well_formed("").is_none());
        assert!(well_formed("# robomigrate: mode=enhanced tier=1\n*** Keywords ***\nA\n").is_some());
        assert!(well_formed("*** Unknown ***").is_none());
    }

    #[tokio::test]
    async fn test_produced_output_is_recorded() {
        let ai = transformer(ScriptedService::new(vec![ScriptedService::reply(ROBOT)]));
        let outcome = ai.transform("a/Steps.java", FileRole::StepDefinition, "class A {}", "SeleniumLibrary").await;
        assert_eq!(outcome, AiOutcome::Produced(ROBOT.to_string()));
        let usage = ai.usage();
        assert!(usage.enabled);
        assert_eq!(usage.prompt_tokens, 100);
        assert_eq!(usage.produced(), 1);
    }

    #[tokio::test]
    async fn test_errors_and_prose_delegate() {
        let ai = transformer(ScriptedService::new(vec![
            Err(CompletionError::RateLimited("slow down".to_string())),
            ScriptedService::reply("Sorry, I cannot help with that."),
            ScriptedService::reply(""),
        ]));
        for _ in 0..3 {
            let outcome = ai.transform("a/Page.java", FileRole::PageObject, "class A {}", "SeleniumLibrary").await;
            assert_eq!(outcome, AiOutcome::Delegate);
        }
        let usage = ai.usage();
        assert_eq!(usage.fallbacks(), 3);
        assert_eq!(usage.records[0].outcome, AiRecordOutcome::Failed);
        assert_eq!(usage.records[1].outcome, AiRecordOutcome::Rejected);
        assert_eq!(usage.completion_tokens, 100);
    }

    #[tokio::test]
    async fn test_usage_survives_poisoned_lock() {
        let ai = transformer(ScriptedService::new(vec![ScriptedService::reply(ROBOT)]));
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = ai.usage.lock().unwrap();
            panic!("poison the usage lock");
        }));
        assert!(ai.usage.is_poisoned());

        ai.transform("a/Steps.java", FileRole::StepDefinition, "class A {}", "SeleniumLibrary").await;
        let usage = ai.usage();
        assert_eq!(usage.produced(), 1);
        assert_eq!(usage.prompt_tokens, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_delegates() {
        let mut service = ScriptedService::new(vec![ScriptedService::reply(ROBOT)]);
        service.delay = Some(Duration::from_secs(600));
        let ai = AiTransformer::new(
            Arc::new(service),
            AiOptions {
                timeout: Duration::from_secs(5),
                ..Default::default()
            },
        );
        let outcome = ai.transform("a/Steps.java", FileRole::StepDefinition, "x", "SeleniumLibrary").await;
        assert_eq!(outcome, AiOutcome::Delegate);
        assert_eq!(ai.usage().records[0].error.as_deref(), Some("completion timed out"));
    }
}
