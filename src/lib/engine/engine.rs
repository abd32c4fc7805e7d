use std::time::Duration;

use async_trait::async_trait;

use super::types::{CreateRequest, EngineResult, ImageRef, ManagedContainer, ProgressEvent};

/// Receives progress from long-running engine operations.
///
/// Implementations must return promptly; the engine calls this inline while
/// it drains a pull stream.
pub trait ProgressObserver: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// The narrow set of container-engine capabilities the orchestration core uses.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// All containers, running and stopped, in engine order.
    async fn list_containers(&self, limit: Option<usize>) -> EngineResult<Vec<ManagedContainer>>;

    /// Returns the id of the new container.
    async fn create_container(&self, request: &CreateRequest) -> EngineResult<String>;

    /// `Ok(false)` when the container was already running.
    async fn start_container(&self, id: &str) -> EngineResult<bool>;

    /// `Ok(false)` when the container was already stopped.
    async fn stop_container(&self, id: &str, grace: Duration) -> EngineResult<bool>;

    /// Force removal, including anonymous volumes.
    async fn remove_container(&self, id: &str) -> EngineResult<()>;

    async fn pull_image(&self, image: &ImageRef, progress: &dyn ProgressObserver)
        -> EngineResult<()>;

    /// Force removal, pruning untagged parents.
    async fn remove_image(&self, image: &str) -> EngineResult<()>;
}
