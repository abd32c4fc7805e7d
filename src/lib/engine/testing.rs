//! In-memory engine used by the unit tests of every component.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::engine::{EngineClient, ProgressObserver};
use super::types::{
    ContainerState, CreateRequest, EngineError, EngineResult, ImageRef, ManagedContainer,
    ProgressEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    List,
    Create,
    Start,
    Stop,
    Remove,
    Pull,
    RemoveImage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List(Option<usize>),
    Create(CreateRequest),
    Start(String),
    Stop(String, Duration),
    Remove(String),
    Pull(String),
    RemoveImage(String),
}

impl Call {
    pub fn op(&self) -> Op {
        match self {
            Call::List(_) => Op::List,
            Call::Create(_) => Op::Create,
            Call::Start(_) => Op::Start,
            Call::Stop(..) => Op::Stop,
            Call::Remove(_) => Op::Remove,
            Call::Pull(_) => Op::Pull,
            Call::RemoveImage(_) => Op::RemoveImage,
        }
    }
}

struct Failure {
    error: EngineError,
    remaining: Option<usize>,
}

#[derive(Default)]
struct StubState {
    containers: Vec<ManagedContainer>,
    images: HashSet<String>,
    calls: Vec<Call>,
    failures: HashMap<Op, Failure>,
    next_id: u64,
}

#[derive(Default)]
pub struct StubEngine {
    state: Mutex<StubState>,
    latency: Option<Duration>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every create and pull sleeps for `latency`, widening race windows.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Default::default()
        }
    }

    pub fn seed(&self, id: &str, name: &str, state: ContainerState) {
        let mut guard = self.state.lock().unwrap();
        guard.containers.push(ManagedContainer {
            id: id.to_string(),
            names: vec![name.to_string()],
            image: "seeded:latest".to_string(),
            state,
            status: state.to_string(),
            created_at: Utc::now(),
        });
    }

    pub fn seed_image(&self, image: &str) {
        self.state.lock().unwrap().images.insert(image.to_string());
    }

    pub fn fail(&self, op: Op, error: EngineError) {
        self.state.lock().unwrap().failures.insert(
            op,
            Failure {
                error,
                remaining: None,
            },
        );
    }

    pub fn fail_times(&self, op: Op, error: EngineError, times: usize) {
        self.state.lock().unwrap().failures.insert(
            op,
            Failure {
                error,
                remaining: Some(times),
            },
        );
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.calls().iter().map(Call::op).collect()
    }

    pub fn containers(&self) -> Vec<ManagedContainer> {
        self.state.lock().unwrap().containers.clone()
    }

    pub fn has_image(&self, image: &str) -> bool {
        self.state.lock().unwrap().images.contains(image)
    }

    fn record(&self, call: Call) -> EngineResult<()> {
        let mut guard = self.state.lock().unwrap();
        let op = call.op();
        guard.calls.push(call);

        let Some(failure) = guard.failures.get_mut(&op) else {
            return Ok(());
        };
        let error = failure.error.clone();
        match failure.remaining.as_mut() {
            None => Err(error),
            Some(0) => Ok(()),
            Some(n) => {
                *n -= 1;
                Err(error)
            }
        }
    }

    async fn pause(&self) {
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
    }
}

#[async_trait]
impl EngineClient for StubEngine {
    async fn list_containers(&self, limit: Option<usize>) -> EngineResult<Vec<ManagedContainer>> {
        self.record(Call::List(limit))?;
        let guard = self.state.lock().unwrap();
        let take = limit.unwrap_or(usize::MAX);
        Ok(guard.containers.iter().take(take).cloned().collect())
    }

    async fn create_container(&self, request: &CreateRequest) -> EngineResult<String> {
        self.record(Call::Create(request.clone()))?;
        self.pause().await;

        let mut guard = self.state.lock().unwrap();
        if guard.containers.iter().any(|c| c.has_name(&request.name)) {
            return Err(EngineError::Conflict(format!(
                "container name {} already in use",
                request.name
            )));
        }
        if !guard.images.contains(&request.image) {
            return Err(EngineError::NotFound(format!(
                "No such image: {}",
                request.image
            )));
        }

        guard.next_id += 1;
        let id = format!("stub-{}", guard.next_id);
        guard.containers.push(ManagedContainer {
            id: id.clone(),
            names: vec![format!("/{}", request.name)],
            image: request.image.clone(),
            state: ContainerState::Created,
            status: "Created".to_string(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> EngineResult<bool> {
        self.record(Call::Start(id.to_string()))?;
        let mut guard = self.state.lock().unwrap();
        let container = guard
            .containers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| EngineError::NotFound(format!("No such container: {id}")))?;

        if container.state == ContainerState::Running {
            return Ok(false);
        }
        container.state = ContainerState::Running;
        container.status = "Up Less than a second".to_string();
        Ok(true)
    }

    async fn stop_container(&self, id: &str, grace: Duration) -> EngineResult<bool> {
        self.record(Call::Stop(id.to_string(), grace))?;
        let mut guard = self.state.lock().unwrap();
        let container = guard
            .containers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| EngineError::NotFound(format!("No such container: {id}")))?;

        if container.state != ContainerState::Running {
            return Ok(false);
        }
        container.state = ContainerState::Exited;
        container.status = "Exited (0) Less than a second ago".to_string();
        Ok(true)
    }

    async fn remove_container(&self, id: &str) -> EngineResult<()> {
        self.record(Call::Remove(id.to_string()))?;
        let mut guard = self.state.lock().unwrap();
        let before = guard.containers.len();
        guard.containers.retain(|c| c.id != id);
        if guard.containers.len() == before {
            return Err(EngineError::NotFound(format!("No such container: {id}")));
        }
        Ok(())
    }

    async fn pull_image(
        &self,
        image: &ImageRef,
        progress: &dyn ProgressObserver,
    ) -> EngineResult<()> {
        self.record(Call::Pull(image.to_string()))?;
        progress.report(ProgressEvent::status(format!(
            "Pulling from {}",
            image.repository
        )));
        self.pause().await;
        progress.report(ProgressEvent::Progress {
            current: 100,
            total: 100,
            message: "Download complete".to_string(),
        });

        self.state.lock().unwrap().images.insert(image.to_string());
        Ok(())
    }

    async fn remove_image(&self, image: &str) -> EngineResult<()> {
        self.record(Call::RemoveImage(image.to_string()))?;
        let mut guard = self.state.lock().unwrap();
        if !guard.images.remove(image) {
            return Err(EngineError::NotFound(format!("No such image: {image}")));
        }
        Ok(())
    }
}
