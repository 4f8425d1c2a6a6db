mod cli;

use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::Result;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use driftwatch::config::Config;
use driftwatch::{
    DetectionSettings, DriftOrchestrator, InMemoryDriftRepository, Origin, Scheduler, output,
    providers,
};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Detect(args) => {
            args.common.apply(&mut config);
            config.validate()?;

            let orchestrator = build_orchestrator(&config)?;
            let cancel = CancellationToken::new();

            match args.resource_id {
                Some(resource_id) => {
                    let result = orchestrator
                        .detect_and_report_drift_by_id(&cancel, &resource_id, &[])
                        .await?;
                    tracing::info!(
                        resource_id = %resource_id,
                        has_drift = result.has_drift(),
                        "detection complete"
                    );
                }
                None => {
                    let results = orchestrator
                        .detect_and_report_drift_for_all(&cancel, &[])
                        .await?;
                    tracing::info!(count = results.len(), "detection complete");
                }
            }
        }
        Command::Watch(args) => {
            args.apply(&mut config);
            config.validate()?;

            let orchestrator = Arc::new(build_orchestrator(&config)?);
            let scheduler = Scheduler::new(orchestrator);
            scheduler.start()?;

            tokio::signal::ctrl_c().await?;
            tracing::info!("interrupt received, shutting down");
            scheduler.stop();
        }
    }

    Ok(())
}

fn build_orchestrator(config: &Config) -> Result<DriftOrchestrator> {
    let aws = providers::get_provider(Origin::Aws, config)?;
    let terraform = providers::get_provider(Origin::Terraform, config)?;
    let repository = Arc::new(InMemoryDriftRepository::new());

    let orchestrator = DriftOrchestrator::new(
        aws,
        terraform,
        repository,
        DetectionSettings::from(&config.detection),
    )
    .with_reporter(output::reporter_for(config.output.format));

    Ok(orchestrator)
}
