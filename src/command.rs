//! Script compilation
//!
//! Turns the lines of a script file into [`Command`]s. All placeholders are
//! substituted here, so a script that references an unknown placeholder is
//! rejected before any of its commands run.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::catalog::Script;
use crate::error::{LayrError, Result};
use crate::placeholder::PlaceholderResolver;

/// Prefix marking a line whose failure must not abort the script
pub const IGNORE_ERROR_MARKER: char = '-';

/// Directive rendering a template: `#!template <source> <destination>`
pub const TEMPLATE_DIRECTIVE: &str = "#!template";

/// One compiled step of a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Execute {
        line: usize,
        command: String,
        ignore_error: bool,
    },
    Template {
        line: usize,
        source: PathBuf,
        destination: PathBuf,
    },
}

impl Command {
    /// 1-based line in the script file; 0 for steps from the configuration
    pub fn line(&self) -> usize {
        match self {
            Command::Execute { line, .. } | Command::Template { line, .. } => *line,
        }
    }
}

/// Raw step before placeholder substitution
#[derive(Debug)]
enum Draft {
    Execute {
        line: usize,
        text: String,
        ignore_error: bool,
    },
    Template {
        line: usize,
        source: String,
        destination: String,
    },
}

/// Compiles script files into commands
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandCompiler;

impl CommandCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Check that every placeholder `script` references is defined, running nothing
    pub async fn verify(&self, script: &Script, resolver: &PlaceholderResolver) -> Result<()> {
        let content = tokio::fs::read_to_string(script.path()).await?;
        verify_drafts(&parse(&content)?, resolver)
    }

    /// Read and compile `script`
    pub async fn compile(
        &self,
        script: &Script,
        resolver: &mut PlaceholderResolver,
    ) -> Result<Vec<Command>> {
        let content = tokio::fs::read_to_string(script.path()).await?;
        self.compile_source(&content, script.directory(), resolver)
            .await
    }

    /// Compile script text whose relative template paths resolve against `base_dir`
    pub async fn compile_source(
        &self,
        content: &str,
        base_dir: &Path,
        resolver: &mut PlaceholderResolver,
    ) -> Result<Vec<Command>> {
        let drafts = parse(content)?;
        // Unknown names fail before any dynamic placeholder runs
        verify_drafts(&drafts, resolver)?;

        let mut commands = Vec::with_capacity(drafts.len());

        for draft in drafts {
            let command = match draft {
                Draft::Execute {
                    line,
                    text,
                    ignore_error,
                } => Command::Execute {
                    line,
                    command: resolver.substitute(&text).await?,
                    ignore_error,
                },
                Draft::Template {
                    line,
                    source,
                    destination,
                } => Command::Template {
                    line,
                    source: absolute(base_dir, &resolver.substitute(&source).await?),
                    destination: absolute(base_dir, &resolver.substitute(&destination).await?),
                },
            };
            commands.push(command);
        }

        debug!(commands = commands.len(), "compiled script");
        Ok(commands)
    }
}

fn verify_drafts(drafts: &[Draft], resolver: &PlaceholderResolver) -> Result<()> {
    drafts.iter().try_for_each(|draft| match draft {
        Draft::Execute { text, .. } => resolver.ensure_known(text),
        Draft::Template {
            source,
            destination,
            ..
        } => {
            resolver.ensure_known(source)?;
            resolver.ensure_known(destination)
        }
    })
}

fn parse(content: &str) -> Result<Vec<Draft>> {
    let mut drafts: Vec<Draft> = Vec::new();

    for (index, raw) in content.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            continue;
        }

        if let Some(arguments) = trimmed.strip_prefix(TEMPLATE_DIRECTIVE) {
            drafts.push(parse_template(line, arguments)?);
            continue;
        }

        if trimmed.starts_with('#') {
            continue;
        }

        // Indented lines continue the previous command
        if raw.starts_with([' ', '\t']) {
            if let Some(Draft::Execute { text, .. }) = drafts.last_mut() {
                text.push(' ');
                text.push_str(trimmed);
                continue;
            }
        }

        let (text, ignore_error) = match trimmed.strip_prefix(IGNORE_ERROR_MARKER) {
            Some(rest) => (rest.trim_start(), true),
            None => (trimmed, false),
        };

        if text.is_empty() {
            continue;
        }

        drafts.push(Draft::Execute {
            line,
            text: text.to_string(),
            ignore_error,
        });
    }

    Ok(drafts)
}

fn parse_template(line: usize, arguments: &str) -> Result<Draft> {
    let mut parts = arguments.split_whitespace();

    match (parts.next(), parts.next(), parts.next()) {
        (Some(source), Some(destination), None) => Ok(Draft::Template {
            line,
            source: source.to_string(),
            destination: destination.to_string(),
        }),
        _ => Err(LayrError::TemplateNotValid {
            path: PathBuf::from(arguments.trim()),
            reason: format!(
                "line {}: expected `{} <source> <destination>`",
                line, TEMPLATE_DIRECTIVE
            ),
        }),
    }
}

fn absolute(base_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
