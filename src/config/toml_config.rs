use crate::utils::error::{DiscoveryError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

pub const DEFAULT_EXECUTABLE: &str = "ansible-playbook";
pub const DEFAULT_ANSIBLE_DIR: &str = "/usr/share/ovirt-hosted-engine-setup/ansible";
pub const DEFAULT_INVENTORY: &str = "localhost";
pub const DEFAULT_CALLBACK: &str = "1_otopi_json";
pub const DEFAULT_WORK_DIR: &str = "/var/lib/ovirt-hosted-engine-setup/cockpit";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub ansible: AnsibleConfig,
    pub paths: PathsConfig,
    pub session: SessionConfig,
    pub discover: JobOverride,
    pub get_devices: JobOverride,
    /// Extra variables exported to every job.
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnsibleConfig {
    pub executable: String,
    pub module_path: String,
    pub inventory: String,
    pub callback: String,
    pub playbook_dir: String,
}

impl Default for AnsibleConfig {
    fn default() -> Self {
        Self {
            executable: DEFAULT_EXECUTABLE.to_string(),
            module_path: DEFAULT_ANSIBLE_DIR.to_string(),
            inventory: DEFAULT_INVENTORY.to_string(),
            callback: DEFAULT_CALLBACK.to_string(),
            playbook_dir: DEFAULT_ANSIBLE_DIR.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Where parameter files are written.
    pub var_file_dir: String,
    /// Where the callback plugin writes each job's output.
    pub output_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            var_file_dir: DEFAULT_WORK_DIR.to_string(),
            output_dir: DEFAULT_WORK_DIR.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub pty: bool,
    pub superuser: bool,
    /// Command prefix used to gain root when `superuser` is set and we are
    /// not root already, e.g. `["sudo", "-n"]`.
    pub escalate_with: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pty: true,
            superuser: true,
            escalate_with: vec!["sudo".to_string(), "-n".to_string()],
        }
    }
}

/// Per-job overrides; anything left unset falls back to the built-in layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOverride {
    pub playbooks: Option<Vec<String>>,
    pub output_path: Option<String>,
}

impl DiscoveryConfig {
    /// Loads the config from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(DiscoveryError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Parses the config from a TOML string after `${VAR}` substitution.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| DiscoveryError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn playbook_path(&self, file_name: &str) -> String {
        Path::new(&self.ansible.playbook_dir)
            .join(file_name)
            .to_string_lossy()
            .into_owned()
    }

    pub fn output_path(&self, file_name: &str) -> String {
        Path::new(&self.paths.output_dir)
            .join(file_name)
            .to_string_lossy()
            .into_owned()
    }

    /// Checks paths, playbook lists and environment names.
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("ansible.executable", &self.ansible.executable)?;
        validation::validate_absolute_path("ansible.module_path", &self.ansible.module_path)?;
        validation::validate_non_empty_string("ansible.inventory", &self.ansible.inventory)?;
        validation::validate_non_empty_string("ansible.callback", &self.ansible.callback)?;
        validation::validate_path("ansible.playbook_dir", &self.ansible.playbook_dir)?;
        validation::validate_path("paths.var_file_dir", &self.paths.var_file_dir)?;
        validation::validate_path("paths.output_dir", &self.paths.output_dir)?;

        for (field, job) in [("discover", &self.discover), ("get_devices", &self.get_devices)] {
            if let Some(playbooks) = &job.playbooks {
                if playbooks.is_empty() {
                    return Err(DiscoveryError::InvalidConfigValueError {
                        field: format!("{}.playbooks", field),
                        value: "[]".to_string(),
                        reason: "At least one playbook is required".to_string(),
                    });
                }
                for playbook in playbooks {
                    validation::validate_path(&format!("{}.playbooks", field), playbook)?;
                }
            }
            if let Some(output) = &job.output_path {
                validation::validate_path(&format!("{}.output_path", field), output)?;
            }
        }

        for name in self.environment.keys() {
            validation::validate_env_name("environment", name)?;
        }

        Ok(())
    }
}

impl Validate for DiscoveryConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

/// Replaces `${VAR}` references with the environment value; unknown names are left as written.
pub(crate) fn substitute_env_vars(content: &str) -> String {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let re = PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
    });

    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    })
    .into_owned()
}
