use async_trait::async_trait;

use super::ApiError;
use crate::models::{BatchDeleteResponse, SearchQuery, SearchResponse};

/// The remote asset store as seen by the engine.
///
/// `GatewayClient` is the production implementation; tests substitute an
/// in-memory one.
#[async_trait]
pub trait AssetGateway: Send + Sync {
    /// One page of a listing/search
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, ApiError>;

    /// Delete many remote ids in a single request
    async fn batch_delete(&self, remote_ids: &[String]) -> Result<BatchDeleteResponse, ApiError>;
}
