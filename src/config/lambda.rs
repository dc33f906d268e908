#[cfg(feature = "lambda")]
use crate::config::ServiceConfig;
#[cfg(feature = "lambda")]
use crate::core::{csv_parser::ParserMode, policy::RecordPolicy};
#[cfg(feature = "lambda")]
use crate::domain::ports::ConfigProvider;
#[cfg(feature = "lambda")]
use crate::utils::error::{EtlError, Result};
#[cfg(feature = "lambda")]
use std::env;
#[cfg(feature = "lambda")]
use std::time::Duration;

#[cfg(feature = "lambda")]
#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub service: ServiceConfig,
    pub s3_bucket: String,
    pub s3_region: String,
}

#[cfg(feature = "lambda")]
impl LambdaConfig {
    /// `CONFIG_PATH` (optional TOML), `GRIST_API_KEY`, `S3_BUCKET` (required), `S3_REGION`.
    pub fn from_env() -> Result<Self> {
        let config_path = env::var("CONFIG_PATH").ok();
        let mut service = ServiceConfig::load(config_path.as_deref().map(std::path::Path::new))?;

        if let Ok(key) = env::var("SNAPSHOT_KEY") {
            service.storage.snapshot_key = key;
        }

        Ok(Self {
            service,
            s3_bucket: env::var("S3_BUCKET").map_err(|_| EtlError::MissingConfigError {
                field: "S3_BUCKET".to_string(),
            })?,
            s3_region: env::var("S3_REGION").unwrap_or_else(|_| "ap-southeast-2".to_string()),
        })
    }
}

#[cfg(feature = "lambda")]
impl ConfigProvider for LambdaConfig {
    fn csv_url(&self) -> String {
        self.service.csv_url()
    }

    fn api_key(&self) -> &str {
        self.service.api_key()
    }

    fn table_id(&self) -> &str {
        self.service.table_id()
    }

    fn request_timeout(&self) -> Duration {
        self.service.request_timeout()
    }

    fn snapshot_key(&self) -> &str {
        self.service.snapshot_key()
    }

    fn archive_raw_csv(&self) -> bool {
        self.service.archive_raw_csv()
    }

    fn parser_mode(&self) -> ParserMode {
        self.service.parser_mode()
    }

    fn policy(&self) -> &RecordPolicy {
        self.service.policy()
    }
}

#[cfg(feature = "lambda")]
impl crate::utils::validation::Validate for LambdaConfig {
    fn validate(&self) -> Result<()> {
        use crate::utils::validation::*;

        self.service.validate()?;
        validate_s3_bucket_name("s3_bucket", &self.s3_bucket)?;
        validate_aws_region("s3_region", &self.s3_region)?;

        tracing::info!("✅ Lambda configuration validation passed");
        Ok(())
    }
}

#[cfg(feature = "lambda")]
fn validate_s3_bucket_name(field_name: &str, bucket_name: &str) -> Result<()> {
    let invalid = |reason: &str| EtlError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: bucket_name.to_string(),
        reason: reason.to_string(),
    };

    if bucket_name.len() < 3 || bucket_name.len() > 63 {
        return Err(invalid("S3 bucket name must be between 3 and 63 characters"));
    }

    if !bucket_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(invalid(
            "S3 bucket name can only contain lowercase letters, numbers, hyphens, and dots",
        ));
    }

    if bucket_name.starts_with('-') || bucket_name.ends_with('-') {
        return Err(invalid("S3 bucket name cannot start or end with a hyphen"));
    }

    Ok(())
}

#[cfg(feature = "lambda")]
fn validate_aws_region(field_name: &str, region: &str) -> Result<()> {
    crate::utils::validation::validate_non_empty_string(field_name, region)?;

    if !region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: region.to_string(),
            reason: "AWS region can only contain lowercase letters, numbers, and hyphens"
                .to_string(),
        });
    }

    Ok(())
}
