use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bollard::{
    API_DEFAULT_VERSION, Docker,
    container::{
        Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
        StartContainerOptions, StopContainerOptions,
    },
    image::{CreateImageOptions, RemoveImageOptions},
    models::{ContainerSummary, CreateImageInfo, HostConfig, PortBinding as BollardPortBinding},
};
use chrono::{DateTime, Utc};
use futures_util::stream::StreamExt;
use tracing::{debug, info};

use super::engine::{EngineClient, ProgressObserver};
use super::types::{
    ContainerState, CreateRequest, EngineError, EngineResult, ImageRef, ManagedContainer,
    ProgressEvent,
};

/// Seconds bollard waits on a single request before giving up.
const CLIENT_TIMEOUT_SECS: u64 = 120;

/// [`EngineClient`] backed by a local Docker daemon through bollard.
#[derive(Debug, Clone)]
pub struct DockerEngine {
    client: Docker,
}

impl DockerEngine {
    /// Connects to `endpoint`, or to the platform defaults when it is empty.
    ///
    /// Accepts bare socket paths as well as `unix://` and `npipe://` URLs.
    pub fn connect(endpoint: &str) -> EngineResult<Self> {
        let client = match socket_path(endpoint) {
            None => Docker::connect_with_local_defaults(),
            Some(path) => {
                Docker::connect_with_socket(&path, CLIENT_TIMEOUT_SECS, API_DEFAULT_VERSION)
            }
        }
        .map_err(classify)?;

        Ok(DockerEngine { client })
    }

    /// Round-trips to the daemon so startup fails fast on a bad endpoint.
    pub async fn ping(&self) -> EngineResult<()> {
        self.client.ping().await.map_err(classify)?;
        Ok(())
    }
}

#[async_trait]
impl EngineClient for DockerEngine {
    async fn list_containers(&self, limit: Option<usize>) -> EngineResult<Vec<ManagedContainer>> {
        let options = ListContainersOptions::<String> {
            all: true,
            limit: limit.map(|l| l.min(isize::MAX as usize) as isize),
            ..Default::default()
        };

        let summaries = self
            .client
            .list_containers(Some(options))
            .await
            .map_err(classify)?;

        Ok(summaries.into_iter().filter_map(to_managed).collect())
    }

    async fn create_container(&self, request: &CreateRequest) -> EngineResult<String> {
        let options = Some(CreateContainerOptions {
            name: request.name.clone(),
            platform: None,
        });

        let response = self
            .client
            .create_container(options, to_bollard_config(request))
            .await
            .map_err(classify)?;

        info!(container = %request.name, container_id = %response.id, "container created");
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> EngineResult<bool> {
        match self
            .client
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
        {
            Ok(()) => Ok(true),
            Err(e) if is_not_modified(&e) => Ok(false),
            Err(e) => Err(classify(e)),
        }
    }

    async fn stop_container(&self, id: &str, grace: Duration) -> EngineResult<bool> {
        let options = StopContainerOptions {
            t: i64::try_from(grace.as_secs()).unwrap_or(i64::MAX),
        };

        match self.client.stop_container(id, Some(options)).await {
            Ok(()) => Ok(true),
            Err(e) if is_not_modified(&e) => Ok(false),
            Err(e) => Err(classify(e)),
        }
    }

    async fn remove_container(&self, id: &str) -> EngineResult<()> {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };

        self.client
            .remove_container(id, Some(options))
            .await
            .map_err(classify)
    }

    async fn pull_image(
        &self,
        image: &ImageRef,
        progress: &dyn ProgressObserver,
    ) -> EngineResult<()> {
        info!(image = %image, "pulling image");

        let mut stream = self.client.create_image(
            Some(CreateImageOptions {
                from_image: image.repository.clone(),
                tag: image.tag.clone(),
                ..Default::default()
            }),
            None,
            None,
        );

        while let Some(msg) = stream.next().await {
            // bollard surfaces in-stream pull errors as `DockerStreamError`.
            let info = msg.map_err(classify)?;
            if let Some(event) = pull_event(&info) {
                debug!(image = %image, ?event, "pull progress");
                progress.report(event);
            }
        }

        info!(image = %image, "image pulled");
        Ok(())
    }

    async fn remove_image(&self, image: &str) -> EngineResult<()> {
        let options = RemoveImageOptions {
            force: true,
            noprune: false,
        };

        self.client
            .remove_image(image, Some(options), None)
            .await
            .map_err(classify)?;
        Ok(())
    }
}

/// `None` means "use the platform defaults".
fn socket_path(endpoint: &str) -> Option<String> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return None;
    }
    if let Some(path) = endpoint.strip_prefix("unix://") {
        return Some(path.to_string());
    }
    if let Some(pipe) = endpoint.strip_prefix("npipe://") {
        return Some(format!("//{}", pipe.trim_start_matches('/')));
    }
    Some(endpoint.to_string())
}

fn is_not_modified(err: &bollard::errors::Error) -> bool {
    matches!(
        err,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 304,
            ..
        }
    )
}

fn classify(err: bollard::errors::Error) -> EngineError {
    match err {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message,
        } => EngineError::NotFound(message),
        bollard::errors::Error::DockerResponseServerError {
            status_code: 409,
            message,
        } => EngineError::Conflict(message),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => EngineError::OperationFailed(format!("{status_code}: {message}")),
        bollard::errors::Error::DockerStreamError { error } => EngineError::OperationFailed(error),
        bollard::errors::Error::RequestTimeoutError => {
            EngineError::Timeout(Duration::from_secs(CLIENT_TIMEOUT_SECS))
        }
        other => EngineError::Unreachable(other.to_string()),
    }
}

fn to_managed(summary: ContainerSummary) -> Option<ManagedContainer> {
    let id = summary.id?;
    let created_at = summary
        .created
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_default();

    Some(ManagedContainer {
        id,
        names: summary.names.unwrap_or_default(),
        image: summary.image.unwrap_or_default(),
        state: summary
            .state
            .as_deref()
            .map(ContainerState::parse)
            .unwrap_or(ContainerState::Unknown),
        status: summary.status.unwrap_or_default(),
        created_at,
    })
}

fn to_bollard_config(request: &CreateRequest) -> Config<String> {
    let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
    let mut port_bindings: HashMap<String, Option<Vec<BollardPortBinding>>> = HashMap::new();

    for binding in &request.port_bindings {
        exposed_ports.insert(binding.container_port.clone(), HashMap::new());
        port_bindings
            .entry(binding.container_port.clone())
            .or_insert_with(|| Some(Vec::new()))
            .get_or_insert_with(Vec::new)
            .push(BollardPortBinding {
                host_ip: binding.host_ip.clone(),
                host_port: Some(binding.host_port.clone()),
            });
    }

    let host_config = HostConfig {
        port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
        publish_all_ports: request.publish_all_ports.then_some(true),
        ..Default::default()
    };

    Config {
        image: Some(request.image.clone()),
        hostname: request.hostname.clone(),
        env: Some(request.env.clone()),
        tty: Some(request.tty),
        exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
        host_config: Some(host_config),
        ..Default::default()
    }
}

fn pull_event(info: &CreateImageInfo) -> Option<ProgressEvent> {
    let status = info.status.clone()?;
    let message = match info.id.as_deref() {
        Some(layer) if !layer.is_empty() => format!("{layer}: {status}"),
        _ => status,
    };

    let detail = info
        .progress_detail
        .as_ref()
        .and_then(|d| Some((d.current?, d.total?)));

    match detail {
        Some((current, total)) if total > 0 => Some(ProgressEvent::Progress {
            current,
            total,
            message: match info.progress.as_deref() {
                Some(bar) => format!("{message} {bar}"),
                None => message,
            },
        }),
        _ => Some(ProgressEvent::Status(message)),
    }
}
