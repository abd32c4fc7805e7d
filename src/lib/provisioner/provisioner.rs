use std::sync::Arc;

use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use super::lock::KeyedLock;
use super::types::{ProvisionError, ProvisioningSpec, Recipe, ServiceProvisioner};
use crate::lib::engine::types::{EngineError, ManagedContainer};
use crate::lib::registry::types::ContainerRegistry;

impl ServiceProvisioner {
    pub fn new(registry: ContainerRegistry) -> Self {
        ServiceProvisioner {
            registry,
            locks: KeyedLock::new(),
        }
    }

    pub fn registry(&self) -> &ContainerRegistry {
        &self.registry
    }

    /// Runs the spec's recipe. Failures were already published on the relay.
    pub async fn run(&self, spec: &ProvisioningSpec) -> bool {
        match spec.recipe {
            Recipe::Recreate => self.provision(spec).await,
            Recipe::EnsureRunning => self.ensure_running(spec).await.unwrap_or(false),
        }
    }

    /// Starts `spec` in the background and returns the operation id used in
    /// its log span. Progress and the outcome arrive on the relay.
    pub fn spawn(self: &Arc<Self>, spec: ProvisioningSpec) -> Uuid {
        let operation_id = Uuid::new_v4();
        let provisioner = Arc::clone(self);
        let span = info_span!("provision_detached", %operation_id, service = %spec.service_name);

        tokio::spawn(
            async move {
                let started = provisioner.run(&spec).await;
                info!(started, "detached provisioning finished");
            }
            .instrument(span),
        );

        operation_id
    }

    /// Create-or-replace, then start.
    ///
    /// Never fails: errors become an `Error: ...` status event and `false`.
    #[tracing::instrument(skip_all, fields(service = %spec.service_name))]
    pub async fn provision(&self, spec: &ProvisioningSpec) -> bool {
        let _guard = self.locks.lock(&spec.service_name).await;

        match self.recreate(spec).await {
            Ok(started) => started,
            Err(e) => {
                error!(error = %e, "provisioning failed");
                self.registry.relay().status(format!("Error: {e}"));
                false
            }
        }
    }

    /// Create only when absent, then start. `Ok(true)` means the container is
    /// running on return, whether or not this call started it.
    #[tracing::instrument(skip_all, fields(service = %spec.service_name))]
    pub async fn ensure_running(&self, spec: &ProvisioningSpec) -> Result<bool, ProvisionError> {
        let _guard = self.locks.lock(&spec.service_name).await;

        let result = self.create_if_absent_and_start(spec).await;
        if let Err(e) = &result {
            warn!(error = %e, "ensure running failed");
            self.registry.relay().status(format!("Error: {e}"));
        }
        result
    }

    async fn recreate(&self, spec: &ProvisioningSpec) -> Result<bool, ProvisionError> {
        let name = self.registry.tag().container_name(&spec.service_name);
        let mut container = self.registry.find_by_name(&name).await?;

        if spec.remove_if_exists {
            if let Some(existing) = container.take() {
                info!(container_id = %existing.id, "removing existing container");
                self.registry
                    .delete_container_and_image(&existing.id, &spec.image.to_string())
                    .await?;
            }
        }

        let container = match container {
            Some(existing) => existing,
            None => self.create_fresh(spec, &name).await?,
        };

        self.start(&container).await
    }

    async fn create_if_absent_and_start(
        &self,
        spec: &ProvisioningSpec,
    ) -> Result<bool, ProvisionError> {
        let name = self.registry.tag().container_name(&spec.service_name);

        let container = match self.registry.find_by_name(&name).await? {
            Some(existing) => existing,
            None => self.create_fresh(spec, &name).await?,
        };

        let started = self.start(&container).await?;
        Ok(started || self.registry.get(&container.id).await?.state.is_running())
    }

    async fn create_fresh(
        &self,
        spec: &ProvisioningSpec,
        name: &str,
    ) -> Result<ManagedContainer, ProvisionError> {
        let relay = self.registry.relay();

        relay.status(format!("Pulling image {}...", spec.image));
        self.registry.pull(&spec.image).await?;

        relay.status("Create the docker container...");
        let id = self
            .registry
            .create(&spec.create_request(name))
            .await
            .map_err(|e| match e {
                EngineError::Conflict(message) => ProvisionError::Conflict(message),
                other => other.into(),
            })?;

        relay.status(format!(
            "The docker container was successfully created. Id: {id}"
        ));
        info!(container_id = %id, "container created");

        self.registry.get(&id).await.map_err(|e| {
            if e.is_not_found() {
                ProvisionError::NotFound(name.to_string())
            } else {
                e.into()
            }
        })
    }

    async fn start(&self, container: &ManagedContainer) -> Result<bool, ProvisionError> {
        self.registry.relay().status(format!(
            "Starting the docker container. Id: {}",
            container.id
        ));

        let started = self.registry.start(&container.id).await?;
        info!(container_id = %container.id, started, "container start requested");
        Ok(started)
    }
}
