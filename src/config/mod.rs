pub mod answers;
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "iscsi-discovery")]
#[command(about = "Discover iSCSI targets and LUNs through the hosted-engine setup playbooks")]
pub struct CliConfig {
    /// Path to the TOML discovery configuration; built-in defaults when omitted
    #[arg(short, long)]
    pub config: Option<String>,

    /// Path to the TOML answers file (section.property -> external_name/value)
    #[arg(short, long)]
    pub answers: String,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run target discovery and print targets grouped by portal group
    Targets,
    /// List the LUNs visible through the configured target
    Luns,
}
