use thiserror::Error;

use super::lock::KeyedLock;
use crate::lib::engine::types::{CreateRequest, EngineError, ImageRef, PortBinding};
use crate::lib::registry::types::ContainerRegistry;

/// How a service gets to "running".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipe {
    /// Delete any existing container and its image, pull, create, start.
    Recreate,
    /// Pull and create only when absent, then start.
    EnsureRunning,
}

/// Static, per-service container configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisioningSpec {
    pub service_name: String,
    pub image: ImageRef,
    pub hostname: Option<String>,
    pub port_bindings: Vec<PortBinding>,
    /// `KEY=VALUE`, in order.
    pub env: Vec<String>,
    pub publish_all_ports: bool,
    pub remove_if_exists: bool,
    pub recipe: Recipe,
}

impl ProvisioningSpec {
    pub fn create_request(&self, container_name: &str) -> CreateRequest {
        CreateRequest {
            name: container_name.to_string(),
            image: self.image.to_string(),
            hostname: self.hostname.clone(),
            env: self.env.clone(),
            port_bindings: self.port_bindings.clone(),
            publish_all_ports: self.publish_all_ports,
            tty: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("container for service {0} could not be resolved")]
    NotFound(String),

    #[error("container already exists: {0}")]
    Conflict(String),
}

/// Runs provisioning recipes, one at a time per service name.
pub struct ServiceProvisioner {
    pub(super) registry: ContainerRegistry,
    pub(super) locks: KeyedLock,
}
