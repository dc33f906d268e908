use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset. Verbose mode also lets the HTTP stack
/// (hyper, axum) through so connection problems show up next to our own logs.
fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "credits_relay=debug,axum=debug,hyper=info,reqwest=info,warn"
    } else {
        "credits_relay=info,warn"
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)))
}

/// `serve` runs the scheduler and request handlers side by side, so the
/// `request` span (method, path) is kept on every line and targets are shown
/// when verbose to tell `server::scheduler` apart from `server::handlers`.
pub fn init_cli_logger(verbose: bool) {
    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(verbose)
                .with_line_number(verbose)
                .with_thread_ids(false)
                .compact(),
        )
        .init();
}

pub fn init_lambda_logger() {
    tracing_subscriber::registry()
        .with(env_filter(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .without_time() // CloudWatch 自帶時間戳
                .json()
                .with_current_span(false),
        )
        .init();
}
