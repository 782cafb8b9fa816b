//! Error types for layr
//!
//! Uses `miette` for pretty error reporting with help text.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for layr operations
#[derive(Error, Diagnostic, Debug)]
pub enum LayrError {
    #[error("Configuration file not found")]
    #[diagnostic(
        code(layr::config::not_found),
        help("Create a layr.toml (or layr.toml.dist) in your project root, or specify one with --config")
    )]
    ConfigNotFound { searched: Vec<PathBuf> },

    #[error("Failed to parse configuration file {}", path.display())]
    #[diagnostic(code(layr::config::parse))]
    ConfigParse {
        #[source]
        source: toml::de::Error,
        path: PathBuf,
    },

    #[error("Configuration layers could not be merged: {reason}")]
    #[diagnostic(code(layr::config::merge))]
    ConfigMerge { reason: String },

    #[error("Environment '{name}' is not configured")]
    #[diagnostic(code(layr::config::environment))]
    UnknownEnvironment { name: String },

    #[error("Script '{name}' not found")]
    #[diagnostic(code(layr::script::not_found))]
    ScriptNotFound {
        name: String,
        #[help]
        suggestion: Option<String>,
    },

    #[error("Script path {} is not a directory", path.display())]
    #[diagnostic(
        code(layr::script::path),
        help("Check the 'paths' entries of your configuration")
    )]
    ScriptPathNotValid { path: PathBuf },

    #[error("Unknown placeholder '%{name}%'")]
    #[diagnostic(
        code(layr::placeholder::unknown),
        help("Define it under [const] or [dynamic], in a dotenv file, or pass it with --param")
    )]
    UnknownPlaceholder { name: String },

    #[error("Dynamic placeholder '{name}' failed: `{command}` exited with code {code}")]
    #[diagnostic(code(layr::placeholder::resolution))]
    PlaceholderResolution {
        name: String,
        command: String,
        code: i32,
        #[help]
        stderr: Option<String>,
    },

    #[error("Dotenv file {} could not be read", path.display())]
    #[diagnostic(code(layr::placeholder::dotenv))]
    DotenvNotReadable {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("Template {} is not valid: {reason}", path.display())]
    #[diagnostic(code(layr::template::invalid))]
    TemplateNotValid { path: PathBuf, reason: String },

    #[error("Execution of '{script}' aborted at line {line}")]
    #[diagnostic(code(layr::exec::failed))]
    ExecutionFailed {
        script: String,
        line: usize,
        /// Exit code of the failing command, `None` for template steps
        code: Option<i32>,
        #[source]
        source: Option<Box<LayrError>>,
    },

    #[error("Invalid parameter '{raw}'")]
    #[diagnostic(code(layr::cli::param), help("Parameters use the form NAME=VALUE"))]
    InvalidParam { raw: String },

    #[error("I/O error")]
    #[diagnostic(code(layr::io))]
    Io(#[from] std::io::Error),
}

/// Result type alias for layr operations
pub type Result<T> = std::result::Result<T, LayrError>;
