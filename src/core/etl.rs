use crate::core::Pipeline;
use crate::domain::model::{RefreshReport, Snapshot, SnapshotOrigin, TransformResult};
use crate::utils::error::Result;
use std::time::Instant;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Extract and transform only; nothing is written.
    pub async fn compute(&self) -> Result<TransformResult> {
        tracing::info!("📥 Fetching CSV export...");
        let raw_data = self.pipeline.extract().await?;
        tracing::info!("Downloaded {} bytes", raw_data.csv_text.len());

        let result = self.pipeline.transform(raw_data).await?;
        tracing::info!(
            "🔄 Parsed {} rows, {} left after filtering",
            result.parsed_count,
            result.records.len()
        );

        Ok(result)
    }

    /// Full refresh: extract, transform, load.
    pub async fn run(&self) -> Result<RefreshReport> {
        let started = Instant::now();

        let result = self.compute().await?;
        let report = self.pipeline.load(&result).await?;

        tracing::info!(
            "💾 Stored {} records to {} in {:?}",
            report.records_stored,
            report.snapshot_key,
            started.elapsed()
        );

        Ok(report)
    }

    /// Stored snapshot if there is one, otherwise refresh and return the new body.
    pub async fn snapshot(&self) -> Result<Snapshot> {
        if let Some(body) = self.pipeline.stored_snapshot().await? {
            tracing::debug!("Serving stored snapshot ({} bytes)", body.len());
            return Ok(Snapshot {
                body,
                origin: SnapshotOrigin::Stored,
            });
        }

        tracing::info!("No stored snapshot yet, refreshing from source");
        let report = self.run().await?;

        Ok(Snapshot {
            body: report.body,
            origin: SnapshotOrigin::Refreshed,
        })
    }
}
