use crate::core::csv_parser::ParserMode;
use crate::core::policy::RecordPolicy;
use crate::domain::model::{RefreshReport, SourceData, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Durable blob store holding the last computed snapshot.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;
    fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub body: String,
    pub max_age: Duration,
}

/// Edge-style response cache keyed by request path.
pub trait ResponseCache: Send + Sync {
    fn lookup(
        &self,
        url: &str,
    ) -> impl std::future::Future<Output = Result<Option<CachedResponse>>> + Send;
    fn store(
        &self,
        url: &str,
        response: CachedResponse,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn csv_url(&self) -> String;
    fn api_key(&self) -> &str;
    fn table_id(&self) -> &str;
    fn request_timeout(&self) -> Duration;
    fn snapshot_key(&self) -> &str;
    fn archive_raw_csv(&self) -> bool;
    fn parser_mode(&self) -> ParserMode;
    fn policy(&self) -> &RecordPolicy;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<SourceData>;
    async fn transform(&self, data: SourceData) -> Result<TransformResult>;
    async fn load(&self, result: &TransformResult) -> Result<RefreshReport>;
    async fn stored_snapshot(&self) -> Result<Option<String>>;
}
