use crate::core::csv_parser::parse_with_mode;
use crate::core::{ConfigProvider, Pipeline, Storage};
use crate::domain::model::{RefreshReport, SourceData, TransformResult};
use crate::utils::error::{EtlError, Result};
use chrono::Utc;
use reqwest::Client;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Grist CSV export → filtered JSON snapshot in `S`.
pub struct CreditsPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    client: Client,
}

impl<S: Storage, C: ConfigProvider> CreditsPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            storage,
            config,
            client,
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &C {
        &self.config
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for CreditsPipeline<S, C> {
    async fn extract(&self) -> Result<SourceData> {
        let url = self.config.csv_url();
        tracing::debug!("Requesting CSV export from: {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.config.api_key())
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Grist response status: {}", status);

        if !status.is_success() {
            return Err(EtlError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        let csv_text = response.text().await?;
        tracing::debug!("Downloaded {} bytes of CSV", csv_text.len());

        Ok(SourceData {
            csv_text,
            fetched_at: Utc::now(),
        })
    }

    async fn transform(&self, data: SourceData) -> Result<TransformResult> {
        let parsed = parse_with_mode(&data.csv_text, self.config.parser_mode());
        let parsed_count = parsed.len();

        let records = self.config.policy().apply(parsed);
        tracing::debug!(
            "Parsed {} rows, kept {} after release filter and dedup",
            parsed_count,
            records.len()
        );

        let json_output = serde_json::to_string_pretty(&records)?;

        Ok(TransformResult {
            parsed_count,
            records,
            json_output,
            raw_csv: data.csv_text,
            fetched_at: data.fetched_at,
        })
    }

    async fn load(&self, result: &TransformResult) -> Result<RefreshReport> {
        let snapshot_key = self.config.snapshot_key().to_string();

        self.storage
            .put(&snapshot_key, result.json_output.as_bytes(), JSON_CONTENT_TYPE)
            .await?;
        tracing::debug!("Snapshot written to {}", snapshot_key);

        let archive_key = if self.config.archive_raw_csv() {
            let key = format!(
                "{}_{}.csv",
                self.config.table_id(),
                result.fetched_at.timestamp_millis()
            );
            self.storage
                .put(&key, result.raw_csv.as_bytes(), CSV_CONTENT_TYPE)
                .await?;
            tracing::debug!("Raw CSV archived as {} ({} bytes)", key, result.raw_csv.len());
            Some(key)
        } else {
            None
        };

        Ok(RefreshReport {
            snapshot_key,
            archive_key,
            parsed_count: result.parsed_count,
            records_stored: result.records.len(),
            fetched_at: result.fetched_at,
            body: result.json_output.clone(),
        })
    }

    async fn stored_snapshot(&self) -> Result<Option<String>> {
        let Some(bytes) = self.storage.get(self.config.snapshot_key()).await? else {
            return Ok(None);
        };

        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| EtlError::ProcessingError {
                message: format!("Stored snapshot is not valid UTF-8: {}", e),
            })
    }
}
