use crate::config::toml_config::{DiscoveryConfig, JobOverride};
use crate::domain::model::PropertyKey;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    IscsiDiscover,
    IscsiGetDevices,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::IscsiDiscover => "ISCSI_DISCOVER",
            Phase::IscsiGetDevices => "ISCSI_GET_DEVICES",
        }
    }

    /// Answers each job needs, in the order they are written to the parameter file.
    pub fn required_properties(&self) -> Vec<PropertyKey> {
        let keys: &[(&str, &str)] = match self {
            Phase::IscsiDiscover => &[
                ("storage", "iSCSIPortalIPAddress"),
                ("storage", "iSCSIPortalPort"),
                ("storage", "iSCSIDiscoverUser"),
                ("storage", "iSCSIDiscoverPassword"),
                ("engine", "adminPassword"),
                ("network", "fqdn"),
                ("vm", "appHostName"),
            ],
            Phase::IscsiGetDevices => &[
                ("storage", "iSCSIPortalUser"),
                ("storage", "iSCSIPortalPassword"),
                ("storage", "iSCSITargetName"),
                ("storage", "iSCSIPortalIPAddress"),
                ("storage", "iSCSIPortalPort"),
            ],
        };
        keys.iter()
            .map(|(section, name)| PropertyKey::new(*section, *name))
            .collect()
    }

    fn playbook_file(&self) -> &'static str {
        match self {
            Phase::IscsiDiscover => "iscsi_discover.yml",
            Phase::IscsiGetDevices => "iscsi_getdevices.yml",
        }
    }

    fn output_file(&self) -> &'static str {
        match self {
            Phase::IscsiDiscover => "iscsi_discover.json",
            Phase::IscsiGetDevices => "iscsi_getdevices.json",
        }
    }

    /// Key the playbook registers its terminal result under.
    pub fn result_key(&self) -> &'static str {
        match self {
            Phase::IscsiDiscover => "otopi_iscsi_targets",
            Phase::IscsiGetDevices => "otopi_iscsi_devices",
        }
    }

    pub fn started_message(&self) -> &'static str {
        match self {
            Phase::IscsiDiscover => "iSCSI target discovery started.",
            Phase::IscsiGetDevices => "iSCSI LUN retrieval started.",
        }
    }

    pub fn completed_message(&self) -> &'static str {
        match self {
            Phase::IscsiDiscover => "iSCSI discovery completed successfully.",
            Phase::IscsiGetDevices => "iSCSI LUN retrieval completed successfully.",
        }
    }

    pub fn failure_message(&self) -> &'static str {
        match self {
            Phase::IscsiDiscover => "iSCSI discovery failed to complete.",
            Phase::IscsiGetDevices => "iSCSI LUN retrieval failed to complete.",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to launch one provisioning job and find its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub phase: Phase,
    pub required: Vec<PropertyKey>,
    pub executable: String,
    pub playbooks: Vec<String>,
    pub module_path: String,
    pub inventory: String,
    pub callback: String,
    pub output_path: String,
    pub environment: Vec<(String, String)>,
}

impl JobSpec {
    pub fn for_phase(phase: Phase, config: &DiscoveryConfig) -> Self {
        let overrides: &JobOverride = match phase {
            Phase::IscsiDiscover => &config.discover,
            Phase::IscsiGetDevices => &config.get_devices,
        };

        let playbooks = overrides
            .playbooks
            .clone()
            .unwrap_or_else(|| vec![config.playbook_path(phase.playbook_file())]);
        let output_path = overrides
            .output_path
            .clone()
            .unwrap_or_else(|| config.output_path(phase.output_file()));

        Self {
            phase,
            required: phase.required_properties(),
            executable: config.ansible.executable.clone(),
            playbooks,
            module_path: config.ansible.module_path.clone(),
            inventory: config.ansible.inventory.clone(),
            callback: config.ansible.callback.clone(),
            output_path,
            environment: config
                .environment
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn discover(config: &DiscoveryConfig) -> Self {
        Self::for_phase(Phase::IscsiDiscover, config)
    }

    pub fn get_devices(config: &DiscoveryConfig) -> Self {
        Self::for_phase(Phase::IscsiGetDevices, config)
    }

    /// `<executable> -e @<var file> <playbook>... --module-path=<dir> --inventory=<inv>`
    pub fn command_line(&self, var_file_path: &str) -> Vec<String> {
        let mut argv = vec![
            self.executable.clone(),
            "-e".to_string(),
            format!("@{}", var_file_path),
        ];
        argv.extend(self.playbooks.iter().cloned());
        argv.push(format!("--module-path={}", self.module_path));
        argv.push(format!("--inventory={}", self.inventory));
        argv
    }

    /// Base environment plus the variables that switch the job to the JSON callback.
    pub fn environ(&self) -> Vec<(String, String)> {
        let mut env = vec![
            ("TERM".to_string(), "xterm-256color".to_string()),
            ("PATH".to_string(), "/sbin:/bin:/usr/sbin:/usr/bin".to_string()),
            ("ANSIBLE_CALLBACK_WHITELIST".to_string(), self.callback.clone()),
            ("ANSIBLE_STDOUT_CALLBACK".to_string(), self.callback.clone()),
            ("OTOPI_CALLBACK_OF".to_string(), self.output_path.clone()),
        ];
        env.extend(self.environment.iter().cloned());
        env
    }
}
