use async_trait::async_trait;
use jobservitor_core::{JobservitorError, Result};

/// What the worker asks the container runtime to run: an image plus a full
/// argv (the job's `command` followed by its `arguments`).
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub image: String,
    pub argv: Vec<String>,
}

/// Opaque handle to a dispatched container.
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    pub id: String,
}

/// Current observed state of a dispatched container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Running,
    Exited { exit_code: i64 },
}

/// The container runtime capability the executor worker consumes, modeled
/// as an `Executor`-like trait: `run`/`status`/`kill`/`logs`. `status`
/// collapses the source interface's separate `reload()` + `status` + final
/// `wait()` into a single call that returns the terminal exit code once the
/// container has exited, since the supervision loop only ever needs "is it
/// still running, and if not, what did it exit with" on each poll.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Dispatch a new container, detached. Fails with
    /// `JobservitorError::Runtime` on image-not-found (after an attempted
    /// pull) or any other runtime API error.
    async fn run(&self, spec: ContainerSpec) -> Result<ContainerHandle>;

    /// Refresh and report the container's current state.
    async fn status(&self, handle: &ContainerHandle) -> Result<ContainerState>;

    /// Forcibly stop a running container (used when an abort is observed).
    async fn kill(&self, handle: &ContainerHandle) -> Result<()>;

    /// Captured stdout+stderr, whatever is currently available.
    async fn logs(&self, handle: &ContainerHandle) -> Result<Vec<u8>>;
}

pub(crate) fn runtime_err(e: impl std::fmt::Display) -> JobservitorError {
    JobservitorError::Runtime(e.to_string())
}
