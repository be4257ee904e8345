//! Loads the setup answers (the configuration model) from a TOML file:
//!
//! ```toml
//! [storage.iSCSIPortalIPAddress]
//! external_name = "he_iscsi_portal_addr"
//! value = "10.0.0.1"
//! ```

use crate::config::toml_config::substitute_env_vars;
use crate::domain::model::{ConfigurationModel, ModelSections};
use crate::utils::error::{DiscoveryError, Result};
use std::path::Path;

pub fn load_answers<P: AsRef<Path>>(path: P) -> Result<ConfigurationModel> {
    let content = std::fs::read_to_string(&path).map_err(DiscoveryError::IoError)?;
    parse_answers(&content)
}

pub fn parse_answers(content: &str) -> Result<ConfigurationModel> {
    let processed = substitute_env_vars(content);
    let sections: ModelSections =
        toml::from_str(&processed).map_err(|e| DiscoveryError::ConfigValidationError {
            field: "answers".to_string(),
            message: format!("TOML parsing error: {}", e),
        })?;

    let model = ConfigurationModel::from_sections(sections);
    tracing::debug!("Loaded {} answers", model.len());
    Ok(model)
}
