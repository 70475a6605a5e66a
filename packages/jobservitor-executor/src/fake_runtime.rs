use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use jobservitor_core::Result;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::runtime::{ContainerHandle, ContainerRuntime, ContainerSpec, ContainerState};

#[derive(Debug, Clone, Copy)]
enum FakeState {
    Running,
    Exited(i64),
}

/// In-memory double for `ContainerRuntime`, used by the executor's own test
/// suite to drive the supervision loop without a Docker daemon.
///
/// By default a dispatched container "exits" immediately with code 0 (exit
/// code overridable per image via `set_exit_code`), which is enough to
/// cover the common succeed/fail scenarios. Images registered via
/// `mark_long_running` instead start `Running` and stay that way until the
/// test calls `finish` (container exits on its own) or the worker calls
/// `kill` (abort observed mid-poll). Images registered via
/// `mark_image_missing` make `run` fail outright, simulating an
/// image-not-found dispatch failure.
#[derive(Clone, Default)]
pub struct FakeContainerRuntime {
    missing_images: Arc<Mutex<Vec<String>>>,
    long_running_images: Arc<Mutex<Vec<String>>>,
    exit_codes: Arc<Mutex<HashMap<String, i64>>>,
    containers: Arc<Mutex<HashMap<String, FakeState>>>,
}

impl FakeContainerRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn mark_image_missing(&self, image: impl Into<String>) {
        self.missing_images.lock().await.push(image.into());
    }

    pub async fn mark_long_running(&self, image: impl Into<String>) {
        self.long_running_images.lock().await.push(image.into());
    }

    pub async fn set_exit_code(&self, image: impl Into<String>, code: i64) {
        self.exit_codes.lock().await.insert(image.into(), code);
    }

    /// Simulates the container exiting on its own with `exit_code`.
    pub async fn finish(&self, handle: &ContainerHandle, exit_code: i64) {
        self.containers
            .lock()
            .await
            .insert(handle.id.clone(), FakeState::Exited(exit_code));
    }
}

#[async_trait]
impl ContainerRuntime for FakeContainerRuntime {
    async fn run(&self, spec: ContainerSpec) -> Result<ContainerHandle> {
        if self.missing_images.lock().await.contains(&spec.image) {
            return Err(jobservitor_core::JobservitorError::Runtime(format!(
                "image not found: {}",
                spec.image
            )));
        }

        let id = Uuid::new_v4().to_string();
        let state = if self.long_running_images.lock().await.contains(&spec.image) {
            FakeState::Running
        } else {
            let code = self
                .exit_codes
                .lock()
                .await
                .get(&spec.image)
                .copied()
                .unwrap_or(0);
            FakeState::Exited(code)
        };
        self.containers.lock().await.insert(id.clone(), state);
        Ok(ContainerHandle { id })
    }

    async fn status(&self, handle: &ContainerHandle) -> Result<ContainerState> {
        let state = self
            .containers
            .lock()
            .await
            .get(&handle.id)
            .copied()
            .unwrap_or(FakeState::Exited(0));
        Ok(match state {
            FakeState::Running => ContainerState::Running,
            FakeState::Exited(code) => ContainerState::Exited { exit_code: code },
        })
    }

    async fn kill(&self, handle: &ContainerHandle) -> Result<()> {
        self.containers
            .lock()
            .await
            .insert(handle.id.clone(), FakeState::Exited(137));
        Ok(())
    }

    async fn logs(&self, _handle: &ContainerHandle) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}
