use async_trait::async_trait;
use bollard::container::{
    Config as BollardContainerConfig, CreateContainerOptions, InspectContainerOptions,
    KillContainerOptions, LogsOptions, StartContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures::StreamExt;
use jobservitor_core::Result;
use uuid::Uuid;

use crate::runtime::{runtime_err, ContainerHandle, ContainerRuntime, ContainerSpec, ContainerState};

/// Talks to the Docker Engine API via `bollard`. Each dispatched job gets
/// its own uniquely-named, non-restarting container; nothing is reused
/// across jobs.
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(runtime_err)?;
        Ok(Self { docker })
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        let options = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };
        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            progress.map_err(runtime_err)?;
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn run(&self, spec: ContainerSpec) -> Result<ContainerHandle> {
        let name = format!("jobservitor-{}", Uuid::new_v4());
        let options = CreateContainerOptions {
            name: name.clone(),
            platform: None,
        };
        let config = BollardContainerConfig {
            image: Some(spec.image.clone()),
            cmd: Some(spec.argv.clone()),
            ..Default::default()
        };

        let created = match self
            .docker
            .create_container(Some(options.clone()), config.clone())
            .await
        {
            Ok(created) => created,
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                self.pull_image(&spec.image).await?;
                self.docker
                    .create_container(Some(options), config)
                    .await
                    .map_err(runtime_err)?
            }
            Err(e) => return Err(runtime_err(e)),
        };

        self.docker
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(runtime_err)?;

        Ok(ContainerHandle { id: created.id })
    }

    async fn status(&self, handle: &ContainerHandle) -> Result<ContainerState> {
        let inspect = self
            .docker
            .inspect_container(&handle.id, None::<InspectContainerOptions>)
            .await
            .map_err(runtime_err)?;

        let state = inspect.state.unwrap_or_default();
        if state.running.unwrap_or(false) {
            Ok(ContainerState::Running)
        } else {
            Ok(ContainerState::Exited {
                exit_code: state.exit_code.unwrap_or(-1),
            })
        }
    }

    async fn kill(&self, handle: &ContainerHandle) -> Result<()> {
        match self
            .docker
            .kill_container(&handle.id, None::<KillContainerOptions<String>>)
            .await
        {
            Ok(()) => Ok(()),
            // already stopped by the time we got around to killing it -- fine.
            Err(BollardError::DockerResponseServerError {
                status_code: 409, ..
            }) => Ok(()),
            Err(e) => Err(runtime_err(e)),
        }
    }

    async fn logs(&self, handle: &ContainerHandle) -> Result<Vec<u8>> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        let mut stream = self.docker.logs(&handle.id, Some(options));
        let mut buf = Vec::new();
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk.map_err(runtime_err)?.into_bytes());
        }
        Ok(buf)
    }
}
