//! layr - A layered shell script runner
//!
//! This crate provides both a CLI tool and a library for running namespaced
//! shell scripts against a layered configuration.
//!
//! # Features
//!
//! - **Layered TOML configuration** - `layr.toml.dist`, `layr.toml` and a local override
//! - **Environments** - Named script directories with their own placeholders
//! - **Placeholders** - `%NAME%` from constants, `.env` files or command output
//! - **Templates** - Render files before a script runs
//! - **Ignorable failures** - Prefix a line with `-` to keep going
//!
//! # Example
//!
//! ```toml
//! # layr.toml
//! header = "My project"
//! paths = ["dev-ops/actions"]
//!
//! [const]
//! APP_ENV = "dev"
//!
//! [dynamic]
//! USER_ID = "id -u"
//!
//! [environments.docker]
//! paths = ["dev-ops/docker/actions"]
//! ```
//!
//! # Library Usage
//!
//! ```rust,ignore
//! use layr::{ConfigLayers, Runtime, TerminalLogger};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let layers = ConfigLayers::discover(&std::env::current_dir()?, None)?;
//!     let runtime = Runtime::new(layers.load()?, layers.root)?;
//!
//!     runtime.run(&["docker:up".to_string()], TerminalLogger::new()).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod command;
pub mod config;
pub mod error;
pub mod executor;
pub mod loader;
pub mod logger;
pub mod merge;
pub mod placeholder;
pub mod runtime;
pub mod shell;
pub mod template;

// Re-export main types
pub use catalog::{Script, ScriptCatalog, ScriptFinder};
pub use command::{Command, CommandCompiler};
pub use config::{Config, ConfigBuilder, Environment, PlaceholderSet, Template};
pub use error::{LayrError, Result};
pub use executor::{Executor, ExecutorConfig, RunState, RunSummary};
pub use loader::ConfigLayers;
pub use logger::{LogEntry, LogMessage, Logger, RecordingLogger, TerminalLogger};
pub use merge::ConfigMerger;
pub use placeholder::{PlaceholderResolver, PlaceholderValue};
pub use runtime::{parse_params, Runtime};
pub use template::TemplateRenderer;
