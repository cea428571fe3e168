//! Cardinality Exporter CLI
//!
//! Serves backend cardinality as Prometheus metrics, or prints a single
//! cardinality query as JSON.

use cardinality_exporter::{
    client::CardinalityClient,
    config::{Cli, Command, Settings},
    metrics::{MetricsRegistry, MetricsServer},
};
use clap::Parser;
use serde::Serialize;
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .init();

    let settings = match Settings::load(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let client = match CardinalityClient::from_config(&settings.client) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "failed to create cardinality client");
            return ExitCode::FAILURE;
        }
    };

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(settings, client),
        Command::LabelNames => print_json(
            client.label_names_cardinality(&settings.query.selector, settings.query.timeout),
        ),
        Command::LabelValues => print_json(client.label_values_cardinality(
            &[settings.query.dimension.clone()],
            &settings.query.selector,
            settings.query.timeout,
        )),
    }
}

fn serve(settings: Settings, client: CardinalityClient) -> ExitCode {
    info!(
        "Cardinality Exporter v{} (backend {}, dimension {:?})",
        cardinality_exporter::VERSION,
        settings.client.address,
        settings.query.dimension
    );

    let registry = match MetricsRegistry::new(client, settings.query) {
        Ok(registry) => registry,
        Err(e) => {
            error!(error = %e, "failed to register collector");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    let server = MetricsServer::new(settings.server, registry.clone());
    let result = runtime.block_on(server.run(shutdown_signal()));

    // The blocking HTTP client inside the registry must be dropped outside
    // the async runtime.
    drop(runtime);
    drop(registry);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "failed to start server");
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: Serialize, E: std::fmt::Display>(result: Result<T, E>) -> ExitCode {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "failed to get cardinality");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&response) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "failed to encode response");
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
