use anyhow::Context;
use clap::Parser;
use iscsi_discovery::config::answers::load_answers;
use iscsi_discovery::config::Command;
use iscsi_discovery::utils::error::ErrorSeverity;
use iscsi_discovery::utils::{logger, validation::Validate};
use iscsi_discovery::{
    CliConfig, DiscoveryConfig, DiscoveryError, IscsiDiscovery, JobHandle, LocalSession,
    LocalStorage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting iscsi-discovery");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = match &cli.config {
        Some(path) => DiscoveryConfig::from_file(path)
            .with_context(|| format!("failed to load config file '{}'", path))?,
        None => DiscoveryConfig::default(),
    };

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        tracing::error!("Suggestion: {}", e.recovery_suggestion());
        eprintln!("{}", e.user_friendly_message());
        std::process::exit(1);
    }

    let model = load_answers(&cli.answers)
        .with_context(|| format!("failed to load answers file '{}'", cli.answers))?;

    let storage = LocalStorage::new(".".to_string());
    let session = LocalSession::from_config(&config.session);
    let discovery = IscsiDiscovery::new(model, &config, storage, session);

    // Ctrl-C closes the running job through its handle.
    let handle = JobHandle::new();
    let on_interrupt = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, closing job");
            on_interrupt.cancel();
        }
    });

    let output = match cli.command {
        Command::Targets => discovery
            .discover_targets(&handle)
            .await
            .and_then(|targets| Ok(serde_json::to_string_pretty(&targets)?)),
        Command::Luns => discovery
            .enumerate_luns(&handle)
            .await
            .and_then(|luns| Ok(serde_json::to_string_pretty(&luns)?)),
    };

    match output {
        Ok(json) => {
            println!("{}", json);
            Ok(())
        }
        Err(e) => {
            report(&e);
            std::process::exit(exit_code(&e));
        }
    }
}

fn report(e: &DiscoveryError) {
    tracing::error!(
        "Discovery failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("{}", e.user_friendly_message());
}

fn exit_code(e: &DiscoveryError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 130,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}
