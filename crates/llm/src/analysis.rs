//! Analysis Service
//!
//! Builds the prompt, calls the reasoning backend under a deadline and
//! parses the answer. Only transient backend failures are retried; a
//! malformed answer is returned as is.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use site_inspector_config::Settings;
use site_inspector_core::{
    AnalysisError, AnalysisResult, RetrievedDocument, RetryPolicy, ViolationAnalyzer,
};

use crate::backend::{FinishReason, LlmBackend};
use crate::parser::parse_analysis;
use crate::prompt::PromptBuilder;

/// Analysis service configuration
#[derive(Debug, Clone)]
pub struct AnalysisServiceConfig {
    /// Per-attempt deadline
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for AnalysisServiceConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

impl AnalysisServiceConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            timeout: settings.timeouts.analysis(),
            retry: settings.retry.policy(),
        }
    }
}

/// Violation analyzer backed by a chat model
pub struct AnalysisService {
    backend: Arc<dyn LlmBackend>,
    config: AnalysisServiceConfig,
}

impl AnalysisService {
    pub fn new(backend: Arc<dyn LlmBackend>, config: AnalysisServiceConfig) -> Self {
        Self { backend, config }
    }

    async fn attempt(
        &self,
        description: &str,
        context: &[RetrievedDocument],
    ) -> Result<AnalysisResult, AnalysisError> {
        let messages = PromptBuilder::new()
            .system_prompt()
            .violation(description, context)
            .build();

        let generation = tokio::time::timeout(self.config.timeout, self.backend.generate(&messages))
            .await
            .map_err(|_| AnalysisError::Timeout(self.config.timeout))??;

        if generation.finish_reason == FinishReason::Length {
            tracing::warn!(
                model = self.backend.model_name(),
                tokens = generation.tokens,
                "Analysis answer hit the token limit"
            );
        }

        parse_analysis(&generation.text, context).map_err(|e| {
            tracing::warn!(
                model = self.backend.model_name(),
                error = %e,
                answer_chars = generation.text.chars().count(),
                "Unparseable analysis answer"
            );
            e
        })
    }
}

#[async_trait]
impl ViolationAnalyzer for AnalysisService {
    async fn analyze(
        &self,
        description: &str,
        context: &[RetrievedDocument],
    ) -> Result<AnalysisResult, AnalysisError> {
        let result = self
            .config
            .retry
            .run("analysis", |_| self.attempt(description, context))
            .await?;

        tracing::info!(
            model = self.backend.model_name(),
            classification = %result.classification,
            severity = %result.severity,
            citations = result.cited_references.len(),
            "Violation analyzed"
        );

        Ok(result)
    }

    fn model_name(&self) -> &str {
        self.backend.model_name()
    }
}
