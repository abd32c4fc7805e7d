use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::types::{ContainerRegistry, DELETE_STOP_GRACE, MAX_STOP_GRACE, ServiceTag};
use crate::lib::engine::engine::EngineClient;
use crate::lib::engine::types::{
    CreateRequest, EngineError, EngineResult, ImageRef, ManagedContainer,
};
use crate::lib::relay::relay::ProgressRelay;

impl ContainerRegistry {
    pub fn new(engine: Arc<dyn EngineClient>, relay: ProgressRelay, tag: ServiceTag) -> Self {
        ContainerRegistry {
            engine,
            relay,
            tag,
            call_timeout: Duration::from_secs(30),
            pull_timeout: None,
        }
    }

    pub fn with_timeouts(mut self, call_timeout: Duration, pull_timeout: Option<Duration>) -> Self {
        self.call_timeout = call_timeout;
        self.pull_timeout = pull_timeout;
        self
    }

    pub fn tag(&self) -> &ServiceTag {
        &self.tag
    }

    pub fn relay(&self) -> &ProgressRelay {
        &self.relay
    }

    /// Running and stopped containers in engine order, optionally only the
    /// ones carrying the service tag. `limit` bounds the engine query, the
    /// tag filter applies afterwards.
    pub async fn list_all(
        &self,
        limit: Option<usize>,
        managed_only: bool,
    ) -> EngineResult<Vec<ManagedContainer>> {
        // The engine reads a zero limit as "no limit".
        if limit == Some(0) {
            return Ok(Vec::new());
        }

        let containers = with_deadline(
            Some(self.call_timeout),
            self.engine.list_containers(limit),
        )
        .await?;

        if !managed_only {
            return Ok(containers);
        }

        Ok(containers
            .into_iter()
            .filter(|c| self.tag.is_managed(c))
            .collect())
    }

    pub async fn find_by_name(&self, name: &str) -> EngineResult<Option<ManagedContainer>> {
        let containers = self.list_all(None, false).await?;
        Ok(containers.into_iter().find(|c| c.has_name(name)))
    }

    /// Re-reads one container by id.
    pub async fn get(&self, id: &str) -> EngineResult<ManagedContainer> {
        self.list_all(None, false)
            .await?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| EngineError::NotFound(format!("container {id}")))
    }

    pub async fn create(&self, request: &CreateRequest) -> EngineResult<String> {
        with_deadline(
            Some(self.call_timeout),
            self.engine.create_container(request),
        )
        .await
    }

    pub async fn start(&self, id: &str) -> EngineResult<bool> {
        with_deadline(Some(self.call_timeout), self.engine.start_container(id)).await
    }

    /// Graceful stop, killing after `grace` (at most [`MAX_STOP_GRACE`]).
    /// Errors are not swallowed.
    pub async fn stop(&self, id: &str, grace: Duration) -> EngineResult<bool> {
        let grace = grace.min(MAX_STOP_GRACE);
        info!(container_id = %id, grace_secs = grace.as_secs(), "stopping container");
        with_deadline(
            Some(self.call_timeout.saturating_add(grace)),
            self.engine.stop_container(id, grace),
        )
        .await
    }

    /// Pulls `image`, streaming engine progress to the relay.
    pub async fn pull(&self, image: &ImageRef) -> EngineResult<()> {
        with_deadline(
            self.pull_timeout,
            self.engine.pull_image(image, &self.relay),
        )
        .await
    }

    /// Stops, force-removes, then force-removes the image.
    ///
    /// A container that is already gone counts as removed. A failed removal
    /// aborts before the image is touched.
    pub async fn delete_container_and_image(&self, id: &str, image: &str) -> EngineResult<()> {
        self.relay
            .status(format!("Attempting to delete container {id}."));

        match self.stop(id, DELETE_STOP_GRACE).await {
            Ok(stopped) => debug!(container_id = %id, stopped, "container stop requested"),
            Err(e) if e.is_not_found() => {
                debug!(container_id = %id, "container already gone before stop")
            }
            Err(e) => return Err(e),
        }

        match with_deadline(Some(self.call_timeout), self.engine.remove_container(id)).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(container_id = %id, "container already gone before removal")
            }
            Err(e) => return Err(e),
        }

        self.relay
            .status(format!("Stopped and removed container {id}."));
        info!(container_id = %id, "container removed");

        self.relay
            .status(format!("Deleting docker image {image}."));

        match with_deadline(Some(self.call_timeout), self.engine.remove_image(image)).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => debug!(image = %image, "image already gone"),
            Err(e) => return Err(e),
        }

        self.relay
            .status(format!("Existing docker image {image} deleted."));
        info!(image = %image, "image removed");
        Ok(())
    }
}

async fn with_deadline<T>(
    limit: Option<Duration>,
    call: impl Future<Output = EngineResult<T>>,
) -> EngineResult<T> {
    match limit {
        None => call.await,
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| EngineError::Timeout(limit))?,
    }
}
