use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::lib::{
    api::types::ControlServer,
    config::config::Config,
    engine::docker::DockerEngine,
    monitor::types::MonitorLoop,
    provisioner::{catalog, types::ServiceProvisioner},
    registry::types::{ContainerRegistry, ServiceTag},
    relay::{hub::BroadcastHub, relay::ProgressRelay},
};

mod lib {
    pub mod api;
    pub mod config;
    pub mod engine;
    pub mod monitor;
    pub mod provisioner;
    pub mod registry;
    pub mod relay;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("dockhand=info,tower_http=warn")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(?config, "configuration loaded");

    let engine = DockerEngine::connect(&config.docker_endpoint)
        .context("failed to connect to the container engine")?;
    if let Err(e) = engine.ping().await {
        warn!(error = %e, "container engine did not answer ping, continuing");
    }

    let hub = BroadcastHub::new(config.hub_capacity);
    let relay = ProgressRelay::new(Arc::new(hub.clone()));
    let registry = ContainerRegistry::new(
        Arc::new(engine),
        relay,
        ServiceTag::new(config.container_tag.clone()),
    )
    .with_timeouts(config.engine_call_timeout, config.pull_timeout);

    for spec in catalog::all() {
        info!(
            service = %spec.service_name,
            image = %spec.image,
            container = %registry.tag().container_name(&spec.service_name),
            "service available"
        );
    }

    let provisioner = Arc::new(ServiceProvisioner::new(registry.clone()));
    let monitor = MonitorLoop::new(registry, config.monitor_interval).start();

    let server = ControlServer::new(provisioner, hub, &config.bind_address, config.port);
    info!(addr = %config.listen_addr(), "starting control server");
    let served = server
        .start_server(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown requested");
        })
        .await;

    monitor.stop().await;
    served.context("control server failed")?;

    info!("stopped");
    Ok(())
}
