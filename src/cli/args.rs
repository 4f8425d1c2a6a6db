use std::path::PathBuf;

use clap::{Parser, Subcommand};

use driftwatch::config::Config;
use driftwatch::{Origin, OutputFormat, OverlapPolicy};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Config file; defaults to the user config dir, then ./driftwatch.json
    #[arg(long, global = true, env = "DRIFTWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run drift detection once
    Detect(DetectArgs),
    /// Run drift detection on a schedule until interrupted
    Watch(WatchArgs),
}

#[derive(clap::Args, Debug)]
pub struct DetectArgs {
    /// Check a single instance instead of every known instance
    #[arg(long)]
    pub resource_id: Option<String>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(clap::Args, Debug)]
pub struct WatchArgs {
    /// Cron expression, cron macro, or `@every <n><ms|s|m|h>`
    #[arg(long, env = "DRIFTWATCH_SCHEDULE")]
    pub schedule: Option<String>,

    #[arg(long, value_enum)]
    pub overlap: Option<OverlapPolicy>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(clap::Args, Debug)]
pub struct CommonArgs {
    #[arg(long, env = "DRIFTWATCH_AWS_SNAPSHOT")]
    pub aws_snapshot: Option<PathBuf>,

    #[arg(long, env = "DRIFTWATCH_STATE_FILE")]
    pub state: Option<PathBuf>,

    #[arg(long, env = "DRIFTWATCH_STATE_URL")]
    pub state_url: Option<String>,

    #[arg(long, env = "DRIFTWATCH_STATE_TOKEN", hide_env_values = true)]
    pub state_token: Option<String>,

    /// Attribute paths to compare (dot notation, comma separated or repeated)
    #[arg(long = "attribute", value_delimiter = ',')]
    pub attributes: Vec<String>,

    #[arg(long, value_enum)]
    pub source_of_truth: Option<Origin>,

    #[arg(long)]
    pub parallelism: Option<usize>,

    /// Per-run timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

impl CommonArgs {
    /// Overrides file configuration with flags that were given.
    pub fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.aws_snapshot {
            config.aws.snapshot_path = Some(path.clone());
        }
        if let Some(path) = &self.state {
            config.terraform.state_path = Some(path.clone());
        }
        if let Some(url) = &self.state_url {
            config.terraform.state_url = Some(url.clone());
        }
        if let Some(token) = &self.state_token {
            config.terraform.state_token = Some(token.clone());
        }
        if !self.attributes.is_empty() {
            config.detection.attribute_paths = self.attributes.clone();
        }
        if let Some(origin) = self.source_of_truth {
            config.detection.source_of_truth = origin;
        }
        if let Some(parallelism) = self.parallelism {
            config.detection.parallelism = parallelism;
        }
        if let Some(timeout) = self.timeout {
            config.detection.timeout_secs = timeout;
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
    }
}

impl WatchArgs {
    pub fn apply(&self, config: &mut Config) {
        self.common.apply(config);
        if let Some(schedule) = &self.schedule {
            config.detection.schedule = Some(schedule.clone());
        }
        if let Some(overlap) = self.overlap {
            config.detection.overlap = overlap;
        }
    }
}
