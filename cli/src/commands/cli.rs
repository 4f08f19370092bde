use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Jsonl,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Jsonl => "jsonl",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "rollout", about = "Release orchestration: staged, approved, rolled back")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to ~/.rollout/config.toml, then ./rollout.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging; `validate` also prints every job
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Plan file (YAML)
    pub plan: PathBuf,

    /// Roll back when a stage fails
    #[arg(long)]
    pub auto_rollback: bool,

    /// Run stages that require approval without asking
    #[arg(long)]
    pub skip_approval: bool,

    /// Simulate jobs instead of running handlers
    #[arg(long)]
    pub dry_run: bool,

    /// Override the configured plugin directory
    #[arg(long)]
    pub plugin_dir: Option<String>,

    /// Progress output; defaults to `execution.output_format`
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ValidateArgs {
    /// Plan file (YAML)
    pub plan: PathBuf,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PluginsArgs {
    /// Override the configured plugin directory
    #[arg(long)]
    pub plugin_dir: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a release plan
    Run(RunArgs),
    /// Check a plan without executing it
    Validate(ValidateArgs),
    /// List available job handlers
    Plugins(PluginsArgs),
    /// Print version information
    Version,
}
