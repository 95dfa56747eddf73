use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use std::path::PathBuf;

use crate::config::overrides::Override;

#[derive(Debug, Parser)]
#[clap(about = "Render and apply Kubernetes CronJobs from declarative configuration")]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub(crate) subcommand: SubCommands,

    #[clap(
        short,
        long,
        default_value = "/etc/cronjob-manifest/config.yaml",
        global = true
    )]
    pub(crate) config: PathBuf,

    /// Override a cronjob option: `[<cronjob>.]<key>=<value>`, e.g. `nightly.suspend=true`
    #[clap(long = "set", value_name = "KEY=VALUE", global = true)]
    pub(crate) overrides: Vec<Override>,
}

#[derive(Debug, Clone, Subcommand)]
pub(crate) enum SubCommands {
    /// Print the rendered CronJob manifests
    Render {
        #[clap(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,

        /// Write to this file instead of stdout
        #[clap(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate the configuration and show upcoming runs
    Validate {
        /// Number of upcoming runs to show per cronjob
        #[clap(long, default_value_t = 3)]
        upcoming: usize,
    },

    /// Server-side apply the rendered CronJobs to the cluster
    Apply {
        #[clap(long)]
        dry_run: bool,

        #[clap(long, default_value_t = 4)]
        concurrency: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Yaml,
    Json,
}
