use std::net::SocketAddr;
use std::process::ExitCode;

use resource_registry::api::{AppState, router};
use resource_registry::config::RegistryConfig;
use resource_registry::lifecycle::{Environment, Lifecycle};
use resource_registry::provision::StoreProvisioner;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resource_registry=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match RegistryConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        "Loaded configuration: migrations_dir={}, listen_port={}",
        config.migrations_dir.display(),
        config.listen_port
    );

    let listen_port = config.listen_port;
    Lifecycle::new(StoreProvisioner::new(&config)).run(|environment| serve(environment, listen_port))
}

/// Serve the API until Ctrl-C. Store calls block, so the runtime lives here
/// rather than around `main`.
fn serve(environment: &Environment, listen_port: u16) -> ExitCode {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let app = router(AppState::from_environment(environment));
    runtime.block_on(async move {
        let addr = SocketAddr::from(([127, 0, 0, 1], listen_port));
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!("Failed to bind: {e}");
                return ExitCode::FAILURE;
            }
        };
        tracing::info!("listening on {}", addr);

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {e}");
            }
            tracing::info!("shutting down");
        };
        match axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!("Server error: {e}");
                ExitCode::FAILURE
            }
        }
    })
}
