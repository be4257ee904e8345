use crate::core::job::JobSpec;
use crate::domain::model::{ConfigurationModel, Property, PropertyKey};
use crate::domain::ports::Storage;
use crate::utils::error::{DiscoveryError, Result};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

const SEPARATOR: &str = ": ";

static VAR_FILE_SEQ: AtomicU64 = AtomicU64::new(0);

const STORAGE_SECTION: &str = "storage";
const DOMAIN_TYPE: &str = "domainType";
const LUN_ID: &str = "LunID";
const NFS_VERSION: &str = "nfsVersion";
const CONNECTION_FIELDS: [&str; 2] = ["storageDomainConnection", "storage"];

/// Render the `name: value` parameter file for `spec` from the answers in `model`.
pub fn build_parameter_payload(spec: &JobSpec, model: &ConfigurationModel) -> Result<String> {
    let mut payload = String::new();

    for key in &spec.required {
        let prop = lookup(model, key)?;
        let value = format_value(model, key, &prop.value)?;
        payload.push_str(&prop.external_name);
        payload.push_str(SEPARATOR);
        payload.push_str(&value);
        payload.push('\n');
    }

    Ok(payload)
}

fn lookup<'a>(model: &'a ConfigurationModel, key: &PropertyKey) -> Result<&'a Property> {
    model
        .get(key)
        .ok_or_else(|| DiscoveryError::ParameterLookupError {
            section: key.section.clone(),
            property: key.name.clone(),
        })
}

fn storage_value<'a>(model: &'a ConfigurationModel, name: &str) -> Result<&'a str> {
    lookup(model, &PropertyKey::new(STORAGE_SECTION, name)).map(|p| p.value.as_str())
}

fn format_value(model: &ConfigurationModel, key: &PropertyKey, value: &str) -> Result<String> {
    let mut ret = value.to_string();

    if CONNECTION_FIELDS.contains(&key.name.as_str()) {
        match storage_value(model, DOMAIN_TYPE)?.to_lowercase().as_str() {
            "iscsi" => ret = storage_value(model, LUN_ID)?.to_string(),
            "fc" => ret.clear(),
            _ => {}
        }
    }

    if key.name == DOMAIN_TYPE && value.to_lowercase().contains("nfs") {
        ret = "nfs".to_string();
    }

    if key.name == NFS_VERSION && !storage_value(model, DOMAIN_TYPE)?.to_lowercase().contains("nfs")
    {
        ret.clear();
    }

    Ok(coerce(ret))
}

/// Empty answers become YAML null; bare yes/no would parse as booleans, so quote them.
fn coerce(value: String) -> String {
    match value.as_str() {
        "" => "null".to_string(),
        "yes" | "no" => format!("\"{}\"", value),
        _ => value,
    }
}

/// Writes owner-only parameter files, each under a name no other write in
/// this process or any other shares.
#[derive(Debug, Clone)]
pub struct VarFileWriter<S: Storage> {
    storage: S,
    dir: String,
}

impl<S: Storage> VarFileWriter<S> {
    pub fn new(storage: S, dir: impl Into<String>) -> Self {
        Self {
            storage,
            dir: dir.into(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Returns the path the job should be pointed at with `-e @path`.
    pub async fn write_var_file(&self, contents: &str, spec: &JobSpec) -> Result<String> {
        let file_name = format!(
            "ansibleVarFile_{}_{}_{}_{}.var",
            spec.phase.as_str().to_lowercase(),
            chrono::Local::now().format("%Y%m%d%H%M%S"),
            std::process::id(),
            VAR_FILE_SEQ.fetch_add(1, Ordering::Relaxed)
        );
        let path = Path::new(&self.dir)
            .join(file_name)
            .to_string_lossy()
            .into_owned();

        tracing::debug!("Writing {} parameter file to {}", spec.phase, path);
        self.storage
            .write_private_file(&path, contents.as_bytes())
            .await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::toml_config::DiscoveryConfig;
    use crate::core::job::Phase;

    fn model(entries: &[(&str, &str, &str, &str)]) -> ConfigurationModel {
        let mut model = ConfigurationModel::default();
        for (section, name, external, value) in entries {
            model.insert(
                PropertyKey::new(*section, *name),
                Property::new(*external, *value),
            );
        }
        model
    }

    fn spec_with(required: &[(&str, &str)]) -> JobSpec {
        let mut spec = JobSpec::for_phase(Phase::IscsiDiscover, &DiscoveryConfig::default());
        spec.required = required
            .iter()
            .map(|(s, n)| PropertyKey::new(*s, *n))
            .collect();
        spec
    }

    #[test]
    fn test_coerce() {
        assert_eq!(coerce(String::new()), "null");
        assert_eq!(coerce("yes".to_string()), "\"yes\"");
        assert_eq!(coerce("no".to_string()), "\"no\"");
        assert_eq!(coerce("Yes".to_string()), "Yes");
        assert_eq!(coerce("3260".to_string()), "3260");
    }

    #[test]
    fn test_connection_field_follows_domain_type() {
        let spec = spec_with(&[("storage", "storageDomainConnection")]);

        let iscsi = model(&[
            ("storage", "storageDomainConnection", "he_storage_domain_path", "host:/x"),
            ("storage", "domainType", "he_domain_type", "ISCSI"),
            ("storage", "LunID", "he_lun_id", "36001405abc"),
        ]);
        assert_eq!(
            build_parameter_payload(&spec, &iscsi).unwrap(),
            "he_storage_domain_path: 36001405abc\n"
        );

        let fc = model(&[
            ("storage", "storageDomainConnection", "he_storage_domain_path", "host:/x"),
            ("storage", "domainType", "he_domain_type", "fc"),
        ]);
        assert_eq!(
            build_parameter_payload(&spec, &fc).unwrap(),
            "he_storage_domain_path: null\n"
        );

        let nfs = model(&[
            ("storage", "storageDomainConnection", "he_storage_domain_path", "host:/x"),
            ("storage", "domainType", "he_domain_type", "nfs3"),
        ]);
        assert_eq!(
            build_parameter_payload(&spec, &nfs).unwrap(),
            "he_storage_domain_path: host:/x\n"
        );
    }

    #[test]
    fn test_domain_type_containing_nfs_becomes_nfs() {
        let spec = spec_with(&[("storage", "domainType")]);
        for raw in ["nfs3", "NFS4", "glusterfs-nfs", "nfs"] {
            let m = model(&[("storage", "domainType", "he_domain_type", raw)]);
            assert_eq!(
                build_parameter_payload(&spec, &m).unwrap(),
                "he_domain_type: nfs\n",
                "raw value {}",
                raw
            );
        }
    }

    #[test]
    fn test_nfs_version_blanked_for_other_domains() {
        let spec = spec_with(&[("storage", "nfsVersion")]);

        let iscsi = model(&[
            ("storage", "nfsVersion", "he_nfs_version", "v4"),
            ("storage", "domainType", "he_domain_type", "iscsi"),
        ]);
        assert_eq!(
            build_parameter_payload(&spec, &iscsi).unwrap(),
            "he_nfs_version: null\n"
        );

        let nfs = model(&[
            ("storage", "nfsVersion", "he_nfs_version", "v4"),
            ("storage", "domainType", "he_domain_type", "nfs4"),
        ]);
        assert_eq!(
            build_parameter_payload(&spec, &nfs).unwrap(),
            "he_nfs_version: v4\n"
        );
    }

    #[test]
    fn test_missing_domain_type_is_reported() {
        let spec = spec_with(&[("storage", "storage")]);
        let m = model(&[("storage", "storage", "he_storage", "x")]);

        let err = build_parameter_payload(&spec, &m).unwrap_err();
        match err {
            DiscoveryError::ParameterLookupError { section, property } => {
                assert_eq!(section, "storage");
                assert_eq!(property, "domainType");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_var_files_are_private_and_never_share_a_path() {
        use crate::config::cli::LocalStorage;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let root = dir.path().to_string_lossy().into_owned();
        let writer = VarFileWriter::new(LocalStorage::new(root.clone()), root);
        let spec = spec_with(&[]);

        let first = writer.write_var_file("he_admin_password: a\n", &spec).await.unwrap();
        let second = writer.write_var_file("he_admin_password: b\n", &spec).await.unwrap();

        assert_ne!(first, second);
        assert!(first.contains("ansibleVarFile_iscsi_discover_"));
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "he_admin_password: a\n");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "he_admin_password: b\n");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&first).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_lookup_uses_section() {
        let spec = spec_with(&[("network", "fqdn")]);
        let m = model(&[("vm", "fqdn", "he_vm_fqdn", "engine.local")]);

        assert!(matches!(
            build_parameter_payload(&spec, &m),
            Err(DiscoveryError::ParameterLookupError { .. })
        ));
    }
}
