// Adapters layer: concrete implementations of the domain ports.

pub mod cache;
#[cfg(feature = "lambda")]
pub mod s3;
pub mod storage;
