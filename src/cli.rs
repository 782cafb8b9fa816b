//! CLI command definitions and handling
//!
//! Uses `clap` derive API for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// layr - layered shell script runner
#[derive(Parser, Debug)]
#[command(name = "layr")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the base config file (layr.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Placeholder value overriding the configuration (NAME=VALUE)
    #[arg(short, long = "param", global = true, value_name = "NAME=VALUE")]
    pub params: Vec<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Working directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Scripts to run (shorthand for `layr run <script>`)
    #[arg(trailing_var_arg = true)]
    pub scripts: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one or more scripts in order
    Run {
        /// Scripts to run, `namespace:name` for named environments
        #[arg(required = true)]
        scripts: Vec<String>,
    },

    /// List available scripts
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: ListFormat,

        /// Include hidden scripts
        #[arg(short, long)]
        all: bool,
    },

    /// Validate the merged configuration
    Check,
}

#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ListFormat {
    #[default]
    Table,
    Json,
    Plain,
}

impl Cli {
    /// Get the effective command, treating bare script names as `run <script>`
    pub fn effective_command(&self) -> EffectiveCommand<'_> {
        if let Some(cmd) = &self.command {
            EffectiveCommand::Subcommand(cmd)
        } else if !self.scripts.is_empty() {
            EffectiveCommand::RunScripts(&self.scripts)
        } else {
            EffectiveCommand::None
        }
    }
}

pub enum EffectiveCommand<'a> {
    Subcommand(&'a Commands),
    RunScripts(&'a [String]),
    None,
}

/// Split `a,b c` into `["a", "b", "c"]`
pub fn split_script_names(raw: &[String]) -> Vec<String> {
    raw.iter()
        .flat_map(|entry| entry.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
