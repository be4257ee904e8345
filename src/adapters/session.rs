use crate::config::toml_config::SessionConfig;
use crate::domain::ports::{ChannelOptions, CloseEvent, HostSession, JobChannel};
use crate::utils::error::{DiscoveryError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

const OUTPUT_DRAIN: Duration = Duration::from_millis(500);

/// Runs jobs as child processes of this one.
#[derive(Debug, Clone, Default)]
pub struct LocalSession {
    escalate_with: Vec<String>,
}

impl LocalSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix prepended to the command when the job asks for superuser.
    pub fn with_escalation(mut self, prefix: Vec<String>) -> Self {
        self.escalate_with = prefix;
        self
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new().with_escalation(config.escalate_with.clone())
    }

    /// Escalation helpers such as sudo reset the environment, so an escalated
    /// job gets its variables again through `env K=V` behind the prefix.
    fn command_line(&self, options: &ChannelOptions) -> Vec<String> {
        let escalate = options.superuser && !self.escalate_with.is_empty();
        let mut argv = Vec::with_capacity(
            self.escalate_with.len() + options.environ.len() + options.argv.len() + 1,
        );
        if escalate {
            argv.extend(self.escalate_with.iter().cloned());
            argv.push("env".to_string());
            argv.extend(options.environ.iter().map(|(k, v)| format!("{}={}", k, v)));
        }
        argv.extend(options.argv.iter().cloned());
        argv
    }
}

#[async_trait]
impl HostSession for LocalSession {
    async fn spawn(&self, options: ChannelOptions) -> Result<Box<dyn JobChannel>> {
        let argv = self.command_line(&options);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| DiscoveryError::SessionError {
                message: "empty command line".to_string(),
            })?;

        if options.pty {
            tracing::debug!("No PTY for local sessions, output is read from pipes");
        }

        let stderr = if options.merge_stderr {
            Stdio::piped()
        } else {
            Stdio::inherit()
        };

        let mut child = Command::new(program)
            .args(args)
            .envs(options.environ.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DiscoveryError::SessionError {
                message: format!("failed to spawn {}: {}", program, e),
            })?;

        tracing::debug!("Spawned {} (pid {:?})", program, child.id());

        let mut forwarders = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            forwarders.push(forward_output(stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            forwarders.push(forward_output(stderr));
        }

        Ok(Box::new(LocalChannel { child, forwarders }))
    }
}

/// Both pipes end up in the same log stream.
fn forward_output<R>(reader: R) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => tracing::debug!(target: "iscsi_discovery::job_output", "{}", line),
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Stopped reading job output: {}", e);
                    break;
                }
            }
        }
    })
}

struct LocalChannel {
    child: Child,
    forwarders: Vec<JoinHandle<()>>,
}

#[async_trait]
impl JobChannel for LocalChannel {
    async fn closed(&mut self) -> Result<CloseEvent> {
        let status = self.child.wait().await?;

        // Grandchildren (ssh control masters) may keep the pipes open long
        // after the job itself has exited.
        for mut forwarder in self.forwarders.drain(..) {
            match tokio::time::timeout(OUTPUT_DRAIN, &mut forwarder).await {
                Ok(Err(e)) => tracing::warn!("Output forwarder ended abnormally: {}", e),
                Ok(Ok(())) => {}
                Err(_) => forwarder.abort(),
            }
        }

        Ok(CloseEvent {
            exit_status: status.code(),
            exit_signal: exit_signal(&status),
            problem: None,
        })
    }

    async fn kill(&mut self) -> Result<()> {
        if let Err(e) = self.child.start_kill() {
            tracing::warn!("Could not kill job: {}", e);
        }
        Ok(())
    }
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}
