use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::lib::engine::engine::EngineClient;
use crate::lib::engine::types::ManagedContainer;
use crate::lib::relay::relay::ProgressRelay;

/// Suffix marking containers created by this service.
pub const DEFAULT_TAG: &str = "dockerservice";

/// Ownership tag carried in the name of every container this service creates.
///
/// A container counts as managed when any of its names ends in `_<tag>`.
/// There is no side database: an unrelated container whose name happens to
/// end in the same suffix is treated as managed too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTag {
    tag: String,
    suffix: String,
}

impl ServiceTag {
    pub fn new(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let suffix = format!("_{tag}");
        ServiceTag { tag, suffix }
    }

    /// `<service>_<tag>`
    pub fn container_name(&self, service: &str) -> String {
        format!("{service}{}", self.suffix)
    }

    pub fn is_managed(&self, container: &ManagedContainer) -> bool {
        container.names.iter().any(|n| n.ends_with(&self.suffix))
    }
}

impl Default for ServiceTag {
    fn default() -> Self {
        ServiceTag::new(DEFAULT_TAG)
    }
}

impl fmt::Display for ServiceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)
    }
}

/// Grace period used when a container is stopped ahead of deletion.
pub const DELETE_STOP_GRACE: Duration = Duration::from_secs(1);
/// Grace period for an explicit stop request.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(30);
/// Longer grace requests are clamped to this.
pub const MAX_STOP_GRACE: Duration = Duration::from_secs(24 * 60 * 60);

/// Read and lifecycle operations over the engine's containers.
#[derive(Clone)]
pub struct ContainerRegistry {
    pub(super) engine: Arc<dyn EngineClient>,
    pub(super) relay: ProgressRelay,
    pub(super) tag: ServiceTag,
    /// Deadline for every call except pulls.
    pub(super) call_timeout: Duration,
    /// `None` lets pulls run as long as they need.
    pub(super) pull_timeout: Option<Duration>,
}
