//! Contract for reaching instances and nested VMs.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use gantry_observe::JobTrace;

use crate::{ConnectInfo, FleetResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DialOptions {
    pub use_external_addr: bool,
    pub timeout: Option<Duration>,
}

/// A command to run on the far side of a [`Client`], script fed on stdin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub stdin: String,
}

/// Byte stream tunneled through a [`Client`].
pub trait Tunnel: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Tunnel for T {}

#[async_trait]
pub trait Client: Send + Sync {
    /// Open a stream to `addr` as seen from the far side.
    async fn dial(&self, network: &str, addr: &str) -> FleetResult<Box<dyn Tunnel>>;

    /// Run a command and return its exit code.
    ///
    /// Output is streamed into `trace`. Cancellation terminates the remote
    /// command and returns [`FleetError::Canceled`](crate::FleetError::Canceled).
    async fn run(
        &self,
        opts: RunOptions,
        trace: &Arc<dyn JobTrace>,
        cancel: &CancellationToken,
    ) -> FleetResult<i32>;

    async fn close(&self) -> FleetResult<()>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn dial(&self, info: &ConnectInfo, opts: DialOptions) -> FleetResult<Box<dyn Client>>;
}

/// VM created inside an instance by the nesting daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NestedVm {
    pub id: String,
    pub addr: String,
}

#[async_trait]
pub trait Nesting: Send + Sync {
    async fn create(&self, image: &str, slot: u32) -> FleetResult<NestedVm>;

    async fn delete(&self, id: &str) -> FleetResult<()>;

    async fn close(&self);
}

/// Reaches the nesting daemon through an instance connection.
#[async_trait]
pub trait NestingConnector: Send + Sync {
    async fn connect(
        &self,
        client: &dyn Client,
        host: &str,
        config: &serde_json::Value,
    ) -> FleetResult<Box<dyn Nesting>>;
}
