//! The CLI surface (§6): persistent flags plus one sub-command per recognized package
//! manager, each of which disables flag parsing for its own tail so `pmg npm install
//! --save-dev x` reaches npm unaltered.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "pmg",
    about = "Intercepts npm/pnpm/yarn/bun/pip/uv/poetry installs and blocks malicious packages",
    version
)]
pub struct Cli {
    /// Verbose debug logging.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Suppress all non-error output.
    #[arg(long, global = true)]
    pub silent: bool,

    /// Verbose progress output.
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Write logs to this file in addition to stderr.
    #[arg(long, global = true)]
    pub log: Option<PathBuf>,

    /// Analyze and report but never execute or block the underlying command.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Resolve and analyze the transitive dependency closure (default: on).
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true")]
    pub transitive: Option<bool>,

    /// Maximum depth of the transitive closure.
    #[arg(long, global = true)]
    pub transitive_depth: Option<u32>,

    /// Include dev/extra dependencies in the closure.
    #[arg(long, global = true)]
    pub include_dev_dependencies: bool,

    /// Treat UNKNOWN verdicts as SUSPICIOUS (opt-in active scanning).
    #[arg(long, global = true)]
    pub paranoid: bool,

    /// Run as a local HTTPS MITM proxy instead of the optimistic guard.
    #[arg(long, global = true)]
    pub proxy_mode: bool,

    /// Path to a YAML config file (defaults to `.pmg.yaml` in the working directory).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: PackageManagerCommand,
}

/// One variant per package manager recognized by C1 (§4.1).
#[derive(Debug, Subcommand)]
pub enum PackageManagerCommand {
    Npm(PmArgs),
    Pnpm(PmArgs),
    Yarn(PmArgs),
    Bun(PmArgs),
    Npx(PmArgs),
    Pnpx(PmArgs),
    Pip(PmArgs),
    Pip3(PmArgs),
    Uv(PmArgs),
    Poetry(PmArgs),
}

impl PackageManagerCommand {
    pub fn exe_name(&self) -> &'static str {
        match self {
            PackageManagerCommand::Npm(_) => "npm",
            PackageManagerCommand::Pnpm(_) => "pnpm",
            PackageManagerCommand::Yarn(_) => "yarn",
            PackageManagerCommand::Bun(_) => "bun",
            PackageManagerCommand::Npx(_) => "npx",
            PackageManagerCommand::Pnpx(_) => "pnpx",
            PackageManagerCommand::Pip(_) => "pip",
            PackageManagerCommand::Pip3(_) => "pip3",
            PackageManagerCommand::Uv(_) => "uv",
            PackageManagerCommand::Poetry(_) => "poetry",
        }
    }

    pub fn tail(&self) -> &[String] {
        match self {
            PackageManagerCommand::Npm(a)
            | PackageManagerCommand::Pnpm(a)
            | PackageManagerCommand::Yarn(a)
            | PackageManagerCommand::Bun(a)
            | PackageManagerCommand::Npx(a)
            | PackageManagerCommand::Pnpx(a)
            | PackageManagerCommand::Pip(a)
            | PackageManagerCommand::Pip3(a)
            | PackageManagerCommand::Uv(a)
            | PackageManagerCommand::Poetry(a) => &a.args,
        }
    }
}

#[derive(Debug, Args)]
pub struct PmArgs {
    /// Everything after the package-manager name, passed through unparsed.
    #[arg(allow_hyphen_values = true, trailing_var_arg = true)]
    pub args: Vec<String>,
}
