use crate::config::toml_config::DiscoveryConfig;
use crate::core::job::JobSpec;
use crate::core::normalize::{normalize_luns, normalize_targets};
use crate::core::params::{build_parameter_payload, VarFileWriter};
use crate::core::results::read_terminal_result;
use crate::core::runner::{JobHandle, JobOutcome, JobRunner};
use crate::domain::model::{ConfigurationModel, Lun, TargetMap, TerminalResult};
use crate::domain::ports::{HostSession, Storage};
use crate::utils::error::{DiscoveryError, Result};

/// Runs the discovery and device playbooks and hands back normalized results.
pub struct IscsiDiscovery<S: Storage, H: HostSession> {
    model: ConfigurationModel,
    writer: VarFileWriter<S>,
    runner: JobRunner<H>,
    discover: JobSpec,
    get_devices: JobSpec,
}

impl<S: Storage, H: HostSession> IscsiDiscovery<S, H> {
    pub fn new(model: ConfigurationModel, config: &DiscoveryConfig, storage: S, session: H) -> Self {
        Self {
            model,
            writer: VarFileWriter::new(storage, config.paths.var_file_dir.clone()),
            runner: JobRunner::new(session)
                .with_pty(config.session.pty)
                .with_superuser(config.session.superuser),
            discover: JobSpec::discover(config),
            get_devices: JobSpec::get_devices(config),
        }
    }

    pub fn discover_spec(&self) -> &JobSpec {
        &self.discover
    }

    pub fn get_devices_spec(&self) -> &JobSpec {
        &self.get_devices
    }

    pub async fn discover_targets(&self, handle: &JobHandle) -> Result<TargetMap> {
        match self.run_pipeline(&self.discover, handle).await? {
            TerminalResult::Targets(body) => normalize_targets(body),
            TerminalResult::Devices(_) => Err(unexpected_variant(&self.discover)),
        }
    }

    pub async fn enumerate_luns(&self, handle: &JobHandle) -> Result<Vec<Lun>> {
        match self.run_pipeline(&self.get_devices, handle).await? {
            TerminalResult::Devices(facts) => Ok(normalize_luns(facts)),
            TerminalResult::Targets(_) => Err(unexpected_variant(&self.get_devices)),
        }
    }

    /// For callers that treat a failed enumeration like an empty one: the
    /// error is logged and `None` comes back.
    pub async fn enumerate_luns_or_log(&self, handle: &JobHandle) -> Option<Vec<Lun>> {
        match self.enumerate_luns(handle).await {
            Ok(luns) => Some(luns),
            Err(e) => {
                tracing::error!("{}", e);
                None
            }
        }
    }

    async fn run_pipeline(&self, spec: &JobSpec, handle: &JobHandle) -> Result<TerminalResult> {
        let payload = build_parameter_payload(spec, &self.model)?;
        let var_file = self.writer.write_var_file(&payload, spec).await?;

        match self.runner.run(spec, &var_file, handle).await? {
            JobOutcome::Completed => {}
            JobOutcome::Cancelled => {
                return Err(DiscoveryError::CancelledError {
                    phase: spec.phase.to_string(),
                })
            }
        }

        read_terminal_result(self.writer.storage(), &spec.output_path, spec).await
    }
}

fn unexpected_variant(spec: &JobSpec) -> DiscoveryError {
    DiscoveryError::ParseError {
        message: format!("{} produced a result of the wrong kind", spec.phase),
    }
}
