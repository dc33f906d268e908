use clap::Parser;
use credits_relay::config::cli::{Command, OutputFormat};
use credits_relay::config::StorageBackend;
use credits_relay::core::csv_parser::{headers_of, to_csv};
use credits_relay::domain::ports::Storage;
use credits_relay::server::{self, scheduler, AppState, HttpSettings};
use credits_relay::utils::error::ErrorSeverity;
use credits_relay::utils::validation::{self, Validate};
use credits_relay::utils::logger;
use credits_relay::{
    CliConfig, CreditsPipeline, EtlEngine, EtlError, LocalStorage, MemoryResponseCache,
    MemoryStorage, NoopResponseCache, ServiceConfig,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = CliConfig::parse();

    logger::init_cli_logger(cli.verbose);
    tracing::info!("Starting credits-relay");

    let result = match cli.service_config() {
        Ok(config) => run(&cli, config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        tracing::error!(
            "❌ credits-relay failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(cli: &CliConfig, config: ServiceConfig) -> Result<(), EtlError> {
    config.validate()?;
    tracing::debug!("Service config: {:?}", config);

    match config.storage.backend {
        StorageBackend::Local => {
            let storage = LocalStorage::new(config.storage.data_dir.clone());
            dispatch(cli, storage, config).await
        }
        StorageBackend::Memory => dispatch(cli, MemoryStorage::new(), config).await,
    }
}

async fn dispatch<S>(cli: &CliConfig, storage: S, config: ServiceConfig) -> Result<(), EtlError>
where
    S: Storage + 'static,
{
    let settings = HttpSettings {
        max_age: config.cache_max_age(),
        expose_error_details: config.server.expose_error_details,
    };
    let bind_addr = validation::validate_socket_addr("server.bind_addr", &config.server.bind_addr)?;
    let refresh_interval = config.refresh_interval();
    let cache_enabled = config.server.cache_enabled;

    let engine = Arc::new(EtlEngine::new(CreditsPipeline::new(storage, config)?));

    match &cli.command {
        Command::Serve { .. } => {
            let refresher =
                refresh_interval.map(|period| scheduler::spawn_refresh_loop(engine.clone(), period));

            let app = if cache_enabled {
                server::create_router(Arc::new(AppState::new(
                    engine,
                    MemoryResponseCache::new(),
                    settings,
                )))
            } else {
                server::create_router(Arc::new(AppState::new(engine, NoopResponseCache, settings)))
            };

            let served = server::serve(bind_addr, app).await;
            if let Some(handle) = refresher {
                handle.abort();
            }
            served
        }
        Command::Refresh => {
            let report = engine.run().await?;
            println!(
                "✅ Stored {} of {} records to {}",
                report.records_stored, report.parsed_count, report.snapshot_key
            );
            if let Some(archive) = report.archive_key {
                println!("📁 Raw CSV archived as {}", archive);
            }
            Ok(())
        }
        Command::Fetch { format } => {
            let result = engine.compute().await?;
            match format {
                OutputFormat::Json => println!("{}", result.json_output),
                OutputFormat::Csv => {
                    let headers = headers_of(&result.records);
                    print!("{}", to_csv(&headers, &result.records)?);
                }
            }
            Ok(())
        }
    }
}
