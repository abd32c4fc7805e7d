use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State as AxumState,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use super::types::{ApiError, ContainersQuery, ControlServer, ProvisionQuery, StopQuery};
use crate::lib::engine::types::ManagedContainer;
use crate::lib::provisioner::catalog;
use crate::lib::provisioner::types::{ProvisioningSpec, ServiceProvisioner};
use crate::lib::registry::types::DEFAULT_STOP_GRACE;
use crate::lib::relay::hub::BroadcastHub;
use crate::lib::relay::types::HubMessage;

const ORCHESTRATION_PAGE: &str = include_str!("static/orchestration.html");

impl ControlServer {
    pub fn new(
        provisioner: Arc<ServiceProvisioner>,
        hub: BroadcastHub,
        address: &str,
        port: u16,
    ) -> Self {
        Self {
            provisioner,
            hub,
            address: address.to_string(),
            port,
        }
    }

    async fn get_all_containers(
        AxumState(server): AxumState<Arc<ControlServer>>,
        Query(query): Query<ContainersQuery>,
    ) -> Result<Json<Vec<ManagedContainer>>, ApiError> {
        let containers = server
            .provisioner
            .registry()
            .list_all(query.take, query.service_created)
            .await?;
        Ok(Json(containers))
    }

    async fn create_mysql_database(
        AxumState(server): AxumState<Arc<ControlServer>>,
        Query(query): Query<ProvisionQuery>,
    ) -> Response {
        server.provision(catalog::mysql(), query.detach).await
    }

    async fn create_amazon_dynamodb(
        AxumState(server): AxumState<Arc<ControlServer>>,
        Query(query): Query<ProvisionQuery>,
    ) -> Response {
        server.provision(catalog::dynamodb(), query.detach).await
    }

    async fn provision_service(
        AxumState(server): AxumState<Arc<ControlServer>>,
        Path(service): Path<String>,
        Query(query): Query<ProvisionQuery>,
    ) -> Response {
        match catalog::lookup(&service) {
            Some(spec) => server.provision(spec, query.detach).await,
            None => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("unknown service: {service}") })),
            )
                .into_response(),
        }
    }

    /// `200 true|false` when waited on, `202` with an operation id when detached.
    async fn provision(&self, spec: ProvisioningSpec, detach: bool) -> Response {
        if detach {
            let service = spec.service_name.clone();
            let operation_id = self.provisioner.spawn(spec);
            info!(%operation_id, service = %service, "provisioning accepted");
            return (
                StatusCode::ACCEPTED,
                Json(json!({ "operationId": operation_id, "service": service })),
            )
                .into_response();
        }

        Json(self.provisioner.run(&spec).await).into_response()
    }

    async fn stop_container(
        AxumState(server): AxumState<Arc<ControlServer>>,
        Path(id): Path<String>,
        Query(query): Query<StopQuery>,
    ) -> Result<Json<bool>, ApiError> {
        let grace = query
            .grace
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_STOP_GRACE);
        let stopped = server.provisioner.registry().stop(&id, grace).await?;
        Ok(Json(stopped))
    }

    async fn orchestration() -> Html<&'static str> {
        Html(ORCHESTRATION_PAGE)
    }

    async fn hub(
        AxumState(server): AxumState<Arc<ControlServer>>,
        ws: WebSocketUpgrade,
    ) -> impl IntoResponse {
        let rx = server.hub.subscribe();
        debug!(subscribers = server.hub.subscriber_count(), "hub client upgrading");
        ws.on_upgrade(move |socket| forward_hub(socket, rx))
    }

    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route(
                "/health",
                get(|| async { Json(json!({ "status": "ok" })) }),
            )
            .route("/api/getallcontainers", get(ControlServer::get_all_containers))
            .route(
                "/api/createmysqldatabase",
                get(ControlServer::create_mysql_database),
            )
            .route(
                "/api/createamazondynamodb",
                get(ControlServer::create_amazon_dynamodb),
            )
            .route(
                "/api/provision/{service}",
                get(ControlServer::provision_service),
            )
            .route(
                "/api/containers/{id}/stop",
                post(ControlServer::stop_container),
            )
            .route("/docker/orchestration", get(ControlServer::orchestration))
            .route("/hub", get(ControlServer::hub))
            .layer(TraceLayer::new_for_http())
            .with_state(self)
    }

    pub async fn start_server(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        let addr = format!("{}:{}", self.address, self.port);
        let app = Arc::new(self).router();

        let listener = TcpListener::bind(&addr).await?;
        info!(%addr, "control server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

/// Pushes hub messages to one websocket client until either side goes away.
async fn forward_hub(mut socket: WebSocket, mut rx: broadcast::Receiver<HubMessage>) {
    debug!("hub client connected");
    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Ok(message) => {
                    if socket.send(Message::Text(message.to_frame().into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "hub client lagged");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Clients only listen.
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("hub client disconnected");
}
