use async_trait::async_trait;

use crate::analysis::AnalysisResult;
use crate::document::RetrievedDocument;
use crate::error::AnalysisError;

/// Produces a structured judgment from a description and its context
#[async_trait]
pub trait ViolationAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        description: &str,
        context: &[RetrievedDocument],
    ) -> Result<AnalysisResult, AnalysisError>;

    /// Model identifier written to the log
    fn model_name(&self) -> &str;
}
