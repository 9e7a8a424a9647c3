use actix_web::{web, App, HttpServer};
use clap::Parser;
use std::io;
use tracing::{error, info};

use jobfirst_registry::api::{
    health::health_config,
    registry::{discovery_config, registry_config, services_config},
    validation,
};
use jobfirst_registry::cli::Cli;
use jobfirst_registry::registry::ServiceRegistry;
use jobfirst_registry::shutdown::ShutdownCoordinator;
use jobfirst_registry::worker::{ExpirySweeper, HealthProber};
use jobfirst_registry::{config, logging};

fn startup_error(err: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();

    // Environment first, command line flags on top
    let config = config::Config::from_env()
        .and_then(|config| config.apply_cli(cli))
        .map_err(startup_error)?;

    logging::init(&config.log_dir)?;

    info!("Starting jobfirst-registry");
    info!("Configuration loaded successfully:");
    info!("  - Max payload size: {} bytes", config.max_payload_size);
    info!("  - Service TTL: {}s", config.service_ttl.as_secs());
    info!("  - Check interval: {}s", config.check_interval.as_secs());
    info!("  - Selection policy: {}", config.selection_policy);
    info!("  - Health probing: {}", config.health_probe_enabled);

    let registry = web::Data::new(ServiceRegistry::new(config.registry_config()).map_err(|e| {
        error!("Failed to create registry: {}", e);
        startup_error(e)
    })?);

    // watch channel allows multiple receivers to get the same value
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut worker_handles = Vec::new();

    let sweeper = ExpirySweeper::new(registry.clone().into_inner(), config.check_interval);
    let sweeper_rx = shutdown_rx.clone();
    worker_handles.push((
        "expiry-sweeper",
        tokio::spawn(async move { sweeper.run(sweeper_rx).await }),
    ));

    if config.health_probe_enabled {
        let prober = HealthProber::new(
            registry.clone().into_inner(),
            config.check_interval,
            config.probe_timeout,
            config.max_concurrent_probes,
        )
        .map_err(startup_error)?;
        let prober_rx = shutdown_rx.clone();
        worker_handles.push((
            "health-prober",
            tokio::spawn(async move { prober.run(prober_rx).await }),
        ));
    }

    let server_registry = registry.clone();
    let max_payload_size = config.max_payload_size;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(server_registry.clone())
            .app_data(web::PayloadConfig::default().limit(max_payload_size))
            .app_data(validation::plain_json_config().limit(max_payload_size))
            .app_data(validation::json_config().limit(max_payload_size))
            .configure(health_config)
            .configure(services_config)
            .configure(discovery_config)
            .configure(registry_config)
    });

    info!("Server starting on http://{}:{}", config.host, config.port);

    let server = server.bind((config.host.as_str(), config.port))?.run();

    // Get server handle for graceful shutdown
    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    let coordinator = ShutdownCoordinator::new(
        server_handle,
        server_task,
        worker_handles,
        shutdown_tx,
        registry.into_inner(),
    );

    coordinator.wait_for_shutdown().await
}
