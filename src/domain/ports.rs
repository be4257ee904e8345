use crate::utils::error::Result;
use async_trait::async_trait;
use serde::Serialize;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Creates a new file only the owner can read; fails if `path` exists.
    fn write_private_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// What to spawn on the host and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOptions {
    pub argv: Vec<String>,
    pub environ: Vec<(String, String)>,
    pub pty: bool,
    /// Send the child's stderr through the same stream as stdout.
    pub merge_stderr: bool,
    pub superuser: bool,
}

/// Delivered once when a spawned job's channel closes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CloseEvent {
    pub exit_status: Option<i32>,
    pub exit_signal: Option<i32>,
    pub problem: Option<String>,
}

impl CloseEvent {
    pub fn exited(code: i32) -> Self {
        Self {
            exit_status: Some(code),
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.exit_status == Some(0)
    }
}

#[async_trait]
pub trait JobChannel: Send {
    /// Resolves once the process has gone away.
    async fn closed(&mut self) -> Result<CloseEvent>;
    async fn kill(&mut self) -> Result<()>;
}

/// Transport that can start a process on the target host.
#[async_trait]
pub trait HostSession: Send + Sync {
    async fn spawn(&self, options: ChannelOptions) -> Result<Box<dyn JobChannel>>;
}
