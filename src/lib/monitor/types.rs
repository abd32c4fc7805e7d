use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::lib::engine::types::ManagedContainer;
use crate::lib::registry::types::ContainerRegistry;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);
/// `MM/dd/yyyy hh:mm`, 12-hour clock.
pub const CREATED_ON_FORMAT: &str = "%m/%d/%Y %I:%M";

/// One row of the periodic monitor snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorRecord {
    pub name: String,
    pub id: String,
    pub state: String,
    pub status: String,
    pub created_on: String,
}

impl From<&ManagedContainer> for MonitorRecord {
    fn from(container: &ManagedContainer) -> Self {
        MonitorRecord {
            name: container.primary_name().unwrap_or_default().to_string(),
            id: container.id.clone(),
            state: container.state.to_string(),
            status: container.status.clone(),
            created_on: container.created_at.format(CREATED_ON_FORMAT).to_string(),
        }
    }
}

/// Pushes a snapshot of the managed containers to every subscriber on a fixed period.
pub struct MonitorLoop {
    pub(super) registry: ContainerRegistry,
    pub(super) interval: Duration,
}

/// Owner of a running [`MonitorLoop`].
pub struct MonitorHandle {
    pub(super) shutdown: Option<oneshot::Sender<()>>,
    pub(super) join: JoinHandle<()>,
}
