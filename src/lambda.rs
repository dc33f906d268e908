use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::Client as S3Client;
use credits_relay::core::pipeline::CreditsPipeline;
use credits_relay::server::scheduler::run_scheduled;
use credits_relay::utils::{logger, validation::Validate};
use credits_relay::{EtlEngine, LambdaConfig, S3Storage};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::Serialize;

#[derive(Serialize)]
pub struct Response {
    pub message: String,
    pub snapshot_key: Option<String>,
    pub records_processed: usize,
}

/// EventBridge schedule target. The event payload is ignored.
async fn function_handler(event: LambdaEvent<serde_json::Value>) -> Result<Response, Error> {
    tracing::info!("Scheduled refresh invoked (request {})", event.context.request_id);

    let lambda_config = LambdaConfig::from_env()?;
    lambda_config.validate()?;

    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let region = Region::new(lambda_config.s3_region.clone());
    let config = aws_sdk_s3::config::Builder::from(&config)
        .region(region)
        .force_path_style(true)
        .build();
    let s3_client = S3Client::from_conf(config);

    let storage = S3Storage::new(s3_client, lambda_config.s3_bucket.clone());
    let engine = EtlEngine::new(CreditsPipeline::new(storage, lambda_config)?);

    // 排程失敗只記錄，不回報給呼叫端
    let response = match run_scheduled(&engine).await {
        Some(report) => Response {
            message: "Scheduled update completed".to_string(),
            snapshot_key: Some(report.snapshot_key),
            records_processed: report.records_stored,
        },
        None => Response {
            message: "Scheduled update failed; see logs".to_string(),
            snapshot_key: None,
            records_processed: 0,
        },
    };

    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();

    run(service_fn(function_handler)).await
}
