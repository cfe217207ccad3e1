use async_trait::async_trait;

use crate::document::RetrievedDocument;
use crate::error::RetrievalError;

/// Regulatory document retrieval
///
/// Returns excerpts ordered most relevant first, at most `top_k` of them.
/// No matches is an empty vector, never an error. For an unchanged index
/// the same query always yields the same order.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError>;
}
