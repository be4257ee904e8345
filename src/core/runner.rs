use crate::core::job::{JobSpec, Phase};
use crate::domain::ports::{ChannelOptions, CloseEvent, HostSession, JobChannel};
use crate::utils::error::{DiscoveryError, Result};
use tokio_util::sync::CancellationToken;

/// How a job that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    /// Closed after the caller asked for it; the exit status is not inspected.
    Cancelled,
}

/// Cancellation handle for one spawned job. Clones refer to the same job.
#[derive(Debug, Clone, Default)]
pub struct JobHandle {
    token: CancellationToken,
}

impl JobHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the job as manually closed and asks the runner to kill it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

pub struct JobRunner<H: HostSession> {
    session: H,
    pty: bool,
    superuser: bool,
}

impl<H: HostSession> JobRunner<H> {
    pub fn new(session: H) -> Self {
        Self {
            session,
            pty: true,
            superuser: true,
        }
    }

    pub fn with_pty(mut self, pty: bool) -> Self {
        self.pty = pty;
        self
    }

    pub fn with_superuser(mut self, superuser: bool) -> Self {
        self.superuser = superuser;
        self
    }

    pub fn channel_options(&self, spec: &JobSpec, var_file_path: &str) -> ChannelOptions {
        ChannelOptions {
            argv: spec.command_line(var_file_path),
            environ: spec.environ(),
            pty: self.pty,
            merge_stderr: true,
            superuser: self.superuser,
        }
    }

    /// Starts the job under a fresh handle.
    pub async fn spawn(&self, spec: &JobSpec, var_file_path: &str) -> Result<RunningJob> {
        self.spawn_with(spec, var_file_path, JobHandle::new()).await
    }

    /// Starts the job under a handle the caller already holds, so it can be
    /// cancelled from elsewhere while the job runs.
    pub async fn spawn_with(
        &self,
        spec: &JobSpec,
        var_file_path: &str,
        handle: JobHandle,
    ) -> Result<RunningJob> {
        tracing::info!("{}", spec.phase.started_message());
        let options = self.channel_options(spec, var_file_path);
        tracing::debug!("Spawning {:?}", options.argv);

        let channel = self.session.spawn(options).await?;
        Ok(RunningJob {
            phase: spec.phase,
            handle,
            channel,
        })
    }

    pub async fn run(
        &self,
        spec: &JobSpec,
        var_file_path: &str,
        handle: &JobHandle,
    ) -> Result<JobOutcome> {
        self.spawn_with(spec, var_file_path, handle.clone())
            .await?
            .wait()
            .await
    }
}

pub struct RunningJob {
    phase: Phase,
    handle: JobHandle,
    channel: Box<dyn JobChannel>,
}

impl std::fmt::Debug for RunningJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningJob")
            .field("phase", &self.phase)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl RunningJob {
    pub fn handle(&self) -> JobHandle {
        self.handle.clone()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Waits for the channel to close. There is no timeout.
    pub async fn wait(mut self) -> Result<JobOutcome> {
        let event = tokio::select! {
            event = self.channel.closed() => Some(event?),
            _ = self.handle.cancelled() => None,
        };

        let event = match event {
            Some(event) => event,
            None => {
                tracing::debug!("Cancel requested for {}, killing job", self.phase);
                self.channel.kill().await?;
                self.channel.closed().await?
            }
        };

        self.settle(event)
    }

    fn settle(&self, event: CloseEvent) -> Result<JobOutcome> {
        if self.handle.is_cancelled() {
            tracing::info!("Channel closed.");
            tracing::info!("{:?}", event);
            return Ok(JobOutcome::Cancelled);
        }

        if event.success() {
            tracing::info!("{}", self.phase.completed_message());
            Ok(JobOutcome::Completed)
        } else {
            tracing::error!("{:?}", event);
            Err(DiscoveryError::JobExecutionError {
                phase: self.phase.to_string(),
                message: self.phase.failure_message().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::toml_config::DiscoveryConfig;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tokio_test::{assert_err, assert_ok};

    /// Closes with `exit` straight away, or only after being killed when `hang` is set.
    struct FakeChannel {
        exit: i32,
        hang: bool,
        killed: bool,
    }

    #[async_trait]
    impl JobChannel for FakeChannel {
        async fn closed(&mut self) -> Result<CloseEvent> {
            if self.hang && !self.killed {
                std::future::pending::<()>().await;
            }
            Ok(CloseEvent::exited(self.exit))
        }

        async fn kill(&mut self) -> Result<()> {
            self.killed = true;
            Ok(())
        }
    }

    struct FakeSession {
        exit: i32,
        hang: bool,
        spawned: Arc<Mutex<Vec<ChannelOptions>>>,
    }

    impl FakeSession {
        fn new(exit: i32, hang: bool) -> Self {
            Self {
                exit,
                hang,
                spawned: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl HostSession for FakeSession {
        async fn spawn(&self, options: ChannelOptions) -> Result<Box<dyn JobChannel>> {
            self.spawned.lock().unwrap().push(options);
            Ok(Box::new(FakeChannel {
                exit: self.exit,
                hang: self.hang,
                killed: false,
            }))
        }
    }

    fn spec() -> JobSpec {
        JobSpec::discover(&DiscoveryConfig::default())
    }

    #[tokio::test]
    async fn test_exit_zero_completes() {
        let runner = JobRunner::new(FakeSession::new(0, false));
        let outcome = assert_ok!(runner.run(&spec(), "/tmp/v.var", &JobHandle::new()).await);
        assert_eq!(outcome, JobOutcome::Completed);
    }

    #[tokio::test]
    async fn test_non_zero_exit_fails_with_phase_message() {
        let runner = JobRunner::new(FakeSession::new(2, false));
        let err = assert_err!(runner.run(&spec(), "/tmp/v.var", &JobHandle::new()).await);
        assert_eq!(err.to_string(), "iSCSI discovery failed to complete.");
    }

    #[tokio::test]
    async fn test_cancel_before_close_resolves_regardless_of_status() {
        let runner = JobRunner::new(FakeSession::new(137, true));
        let job = runner.spawn(&spec(), "/tmp/v.var").await.unwrap();
        let handle = job.handle();

        let waiter = tokio::spawn(job.wait());
        handle.cancel();

        let outcome = waiter.await.unwrap().unwrap();
        assert_eq!(outcome, JobOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_marker_set_before_failed_close_still_resolves() {
        let runner = JobRunner::new(FakeSession::new(1, false));
        let handle = JobHandle::new();
        handle.cancel();

        let outcome = assert_ok!(runner.run(&spec(), "/tmp/v.var", &handle).await);
        assert_eq!(outcome, JobOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_handles_are_per_job() {
        let runner = JobRunner::new(FakeSession::new(0, true));
        let first = runner.spawn(&spec(), "/tmp/a.var").await.unwrap();
        let second = runner.spawn(&spec(), "/tmp/b.var").await.unwrap();

        first.handle().cancel();
        assert!(!second.handle().is_cancelled());
        assert_eq!(first.wait().await.unwrap(), JobOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_channel_options() {
        let session = FakeSession::new(0, false);
        let spawned = session.spawned.clone();
        let runner = JobRunner::new(session).with_pty(false);

        runner
            .run(&spec(), "/tmp/v.var", &JobHandle::new())
            .await
            .unwrap();

        let options = spawned.lock().unwrap()[0].clone();
        assert_eq!(options.argv[0], "ansible-playbook");
        assert_eq!(options.argv[2], "@/tmp/v.var");
        assert!(options.merge_stderr);
        assert!(options.superuser);
        assert!(!options.pty);
    }
}
