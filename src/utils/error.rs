use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Required property '{section}.{property}' is missing from the configuration model")]
    ParameterLookupError { section: String, property: String },

    #[error("{message}")]
    JobExecutionError { phase: String, message: String },

    #[error("Job {phase} was cancelled before completion")]
    CancelledError { phase: String },

    #[error("Failed to read output for {phase} from {path}: {source}")]
    OutputReadError {
        phase: String,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {message}")]
    ParseError { message: String },

    #[error("Lookup error: {message}")]
    LookupError { message: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Host session error: {message}")]
    SessionError { message: String },

    #[error("Configuration validation error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Execution,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl DiscoveryError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DiscoveryError::ParameterLookupError { .. }
            | DiscoveryError::ConfigValidationError { .. }
            | DiscoveryError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            DiscoveryError::JobExecutionError { .. }
            | DiscoveryError::CancelledError { .. }
            | DiscoveryError::SessionError { .. } => ErrorCategory::Execution,
            DiscoveryError::ParseError { .. }
            | DiscoveryError::LookupError { .. }
            | DiscoveryError::SerializationError(_) => ErrorCategory::Data,
            DiscoveryError::OutputReadError { .. } | DiscoveryError::IoError(_) => {
                ErrorCategory::System
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DiscoveryError::CancelledError { .. } => ErrorSeverity::Low,
            DiscoveryError::JobExecutionError { .. } | DiscoveryError::SessionError { .. } => {
                ErrorSeverity::Medium
            }
            DiscoveryError::OutputReadError { .. } | DiscoveryError::IoError(_) => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the answers file and discovery config for missing or invalid entries"
            }
            ErrorCategory::Execution => {
                "Inspect the job output in the log, fix the portal settings and run the job again"
            }
            ErrorCategory::Data => {
                "The job produced unexpected output; check the callback plugin and playbook versions"
            }
            ErrorCategory::System => "Verify the output directory exists and is readable",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            DiscoveryError::ParameterLookupError { section, property } => {
                format!("Missing setting {}.{}", section, property)
            }
            DiscoveryError::JobExecutionError { message, .. } => message.clone(),
            DiscoveryError::CancelledError { phase } => format!("{} was cancelled", phase),
            DiscoveryError::OutputReadError { phase, path, .. } => {
                format!("Could not read the {} results at {}", phase, path)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_failure_message_is_passed_through() {
        let err = DiscoveryError::JobExecutionError {
            phase: "ISCSI_DISCOVER".to_string(),
            message: "iSCSI discovery failed to complete.".to_string(),
        };
        assert_eq!(err.to_string(), "iSCSI discovery failed to complete.");
        assert_eq!(err.category(), ErrorCategory::Execution);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
    }

    #[test]
    fn test_lookup_errors_are_configuration_errors() {
        let err = DiscoveryError::ParameterLookupError {
            section: "storage".to_string(),
            property: "iSCSIPortalPort".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.user_friendly_message(), "Missing setting storage.iSCSIPortalPort");
    }
}
