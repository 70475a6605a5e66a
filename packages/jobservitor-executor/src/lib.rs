//! The Executor Worker: locality-cascaded dequeue, claim-check, container
//! dispatch, abort-polling supervision, and finalize -- the long-running
//! process half of jobservitor.

pub mod config;
pub mod docker_runtime;
pub mod fake_runtime;
pub mod runtime;
pub mod service;
pub mod worker;

pub use config::Config;
pub use docker_runtime::DockerRuntime;
pub use fake_runtime::FakeContainerRuntime;
pub use runtime::{ContainerHandle, ContainerRuntime, ContainerSpec, ContainerState};
pub use service::Service;
pub use worker::JobWorker;
