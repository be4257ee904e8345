pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::LocalSession;
pub use config::cli::LocalStorage;
pub use config::toml_config::DiscoveryConfig;
pub use core::discovery::IscsiDiscovery;
pub use core::runner::{JobHandle, JobOutcome, JobRunner};
pub use utils::error::{DiscoveryError, Result};
