use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use hub_native_host::{config::install_dir, startup_log, Bridge, HostConfig, ProcessSupervisor};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_ENV: &str = "HUB_HOST_LOG";
const LOG_FORMAT_ENV: &str = "HUB_HOST_LOG_FORMAT";

/// Everything goes to stderr. stdout carries frames only.
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var(LOG_FORMAT_ENV).as_deref() == Ok("json") {
        let _ = registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init();
    } else {
        let _ = registry
            .with(fmt::layer().with_ansi(false).with_writer(std::io::stderr))
            .try_init();
    }
}

/// Browsers pass the calling extension's origin as the first plain argument
/// (Windows adds `--parent-window=<hwnd>`).
fn caller_origin() -> Option<String> {
    std::env::args().skip(1).find(|arg| !arg.starts_with("--"))
}

async fn serve() -> ExitCode {
    if let Some(origin) = caller_origin() {
        tracing::info!(origin = %origin, "Host launched");
    }

    let discovered = HostConfig::discover();

    // Fire-and-forget.
    drop(startup_log::announce_start(startup_log::from_discovery(
        &discovered,
        install_dir(),
    )));

    let config = match discovered {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Refusing to start with a broken configuration");
            return ExitCode::FAILURE;
        }
    };

    let supervisor = Arc::new(ProcessSupervisor::new(config.worker_command()));
    let bridge = Bridge::from_config(&config, supervisor);
    match bridge.run_stdio().await {
        Ok(()) => {
            tracing::info!("Browser closed the connection");
            ExitCode::SUCCESS
        }
        Err(e) if e.is_disconnect() => {
            tracing::info!(error = %e, "Browser went away");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Host stopped");
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Could not start the async runtime");
            return ExitCode::FAILURE;
        }
    };
    let code = runtime.block_on(serve());
    // A blocked stdin read must not keep the process alive.
    runtime.shutdown_timeout(Duration::from_millis(250));
    code
}
