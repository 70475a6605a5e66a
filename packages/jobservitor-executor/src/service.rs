use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A long-running unit of work that can be told to stop. Mirrors the
/// `Service` trait used for the kernel's own background workers: the binary
/// constructs one, boxes it, and drives it to completion while wiring
/// `SIGTERM`/`SIGINT` to `shutdown`.
#[async_trait]
pub trait Service: Send {
    fn name(&self) -> &'static str;

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> anyhow::Result<()>;
}
