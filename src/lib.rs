pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

#[cfg(feature = "lambda")]
pub use adapters::s3::S3Storage;
#[cfg(feature = "lambda")]
pub use config::lambda::LambdaConfig;

pub use adapters::{
    cache::{MemoryResponseCache, NoopResponseCache},
    storage::{LocalStorage, MemoryStorage},
};
pub use config::ServiceConfig;
pub use crate::core::{etl::EtlEngine, pipeline::CreditsPipeline, policy::RecordPolicy};
pub use utils::error::{EtlError, Result};
