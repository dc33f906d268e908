#[cfg(feature = "cli")]
pub mod cli;
pub mod lambda;

use crate::core::csv_parser::ParserMode;
use crate::core::policy::{PolicyPreset, RecordPolicy};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_KEY_ENV: &str = "GRIST_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub source: SourceConfig,
    pub storage: StorageConfig,
    pub parser: ParserConfig,
    #[serde(deserialize_with = "deserialize_policy")]
    pub policy: RecordPolicy,
    pub server: ServerConfig,
    pub schedule: ScheduleConfig,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub doc_id: String,
    pub table_id: String,
    /// 通常由 GRIST_API_KEY 提供，不寫進設定檔
    pub api_key: String,
    pub request_timeout_secs: u64,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_empty() { "" } else { "***" };
        f.debug_struct("SourceConfig")
            .field("base_url", &self.base_url)
            .field("doc_id", &self.doc_id)
            .field("table_id", &self.table_id)
            .field("api_key", &api_key)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://grist.narduli.be".to_string(),
            doc_id: "onJ2bmcLLGRAABCZkuVphP".to_string(),
            table_id: "Field".to_string(),
            api_key: String::new(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_dir: PathBuf,
    pub snapshot_key: String,
    pub archive_raw_csv: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            data_dir: PathBuf::from("./data"),
            snapshot_key: "credits.json".to_string(),
            archive_raw_csv: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub mode: ParserMode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub cache_enabled: bool,
    pub cache_max_age_secs: u64,
    /// Put raw error text in 500 bodies instead of the category message.
    pub expose_error_details: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            cache_enabled: true,
            cache_max_age_secs: 300,
            expose_error_details: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// 0 停用排程
    pub refresh_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 3600,
        }
    }
}

/// `[policy]` table: a preset plus optional per-field overrides.
/// An empty string for `release_field` or `bypass_field` switches that step off.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PolicySection {
    preset: PolicyPreset,
    release_field: Option<String>,
    dedup_fields: Option<Vec<String>>,
    bypass_field: Option<String>,
    separator: Option<String>,
}

impl From<PolicySection> for RecordPolicy {
    fn from(section: PolicySection) -> Self {
        let non_blank = |s: String| (!s.trim().is_empty()).then_some(s);
        let mut policy = section.preset.policy();

        if let Some(field) = section.release_field {
            policy.release_field = non_blank(field);
        }
        if let Some(fields) = section.dedup_fields {
            policy.dedup_fields = fields;
        }
        if let Some(field) = section.bypass_field {
            policy.bypass_field = non_blank(field);
        }
        if let Some(separator) = section.separator {
            policy.separator = separator;
        }
        policy
    }
}

fn deserialize_policy<'de, D>(deserializer: D) -> std::result::Result<RecordPolicy, D::Error>
where
    D: Deserializer<'de>,
{
    PolicySection::deserialize(deserializer).map(RecordPolicy::from)
}

impl ServiceConfig {
    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 環境變數優先於設定檔
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.source.api_key = key;
            }
        }
    }

    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.server.cache_max_age_secs)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        match self.schedule.refresh_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Replaces `${VAR}` with the environment value; unknown variables are left as written.
fn substitute_env_vars(content: &str) -> Result<String> {
    use regex::Regex;

    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
        message: format!("Invalid substitution pattern: {}", e),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.into_owned())
}

impl ConfigProvider for ServiceConfig {
    fn csv_url(&self) -> String {
        let table: String = url::form_urlencoded::byte_serialize(self.source.table_id.as_bytes())
            .collect();
        format!(
            "{}/api/docs/{}/download/csv?tableId={}",
            self.source.base_url.trim_end_matches('/'),
            self.source.doc_id,
            table
        )
    }

    fn api_key(&self) -> &str {
        &self.source.api_key
    }

    fn table_id(&self) -> &str {
        &self.source.table_id
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.source.request_timeout_secs)
    }

    fn snapshot_key(&self) -> &str {
        &self.storage.snapshot_key
    }

    fn archive_raw_csv(&self) -> bool {
        self.storage.archive_raw_csv
    }

    fn parser_mode(&self) -> ParserMode {
        self.parser.mode
    }

    fn policy(&self) -> &RecordPolicy {
        &self.policy
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("source.base_url", &self.source.base_url)?;
        validation::validate_identifier("source.doc_id", &self.source.doc_id)?;
        validation::validate_identifier("source.table_id", &self.source.table_id)?;
        if self.source.api_key.trim().is_empty() {
            return Err(EtlError::MissingConfigError {
                field: API_KEY_ENV.to_string(),
            });
        }
        validation::validate_positive_number(
            "source.request_timeout_secs",
            self.source.request_timeout_secs,
            1,
        )?;

        validation::validate_non_empty_string("storage.snapshot_key", &self.storage.snapshot_key)?;

        validation::validate_socket_addr("server.bind_addr", &self.server.bind_addr)?;
        validation::validate_range(
            "server.cache_max_age_secs",
            self.server.cache_max_age_secs,
            0,
            31_536_000,
        )?;

        if self.policy.dedup_fields.len() > 1 && self.policy.separator.is_empty() {
            return Err(EtlError::InvalidConfigValueError {
                field: "policy.separator".to_string(),
                value: String::new(),
                reason: "A composite dedup key needs a non-empty separator".to_string(),
            });
        }

        tracing::debug!("✅ Service configuration validation passed");
        Ok(())
    }
}
