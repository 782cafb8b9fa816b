//! Script discovery
//!
//! Scripts are `*.sh` / `*.psh` files found directly inside the command paths
//! of each environment. Scripts of named environments are namespaced as
//! `environment:script`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{LayrError, Result};

/// File extensions recognised as scripts
pub const SCRIPT_EXTENSIONS: &[&str] = &["sh", "psh"];

/// Separator between namespace and script name
pub const NAMESPACE_SEPARATOR: char = ':';

/// A runnable script file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    name: String,
    namespace: Option<String>,
    environment: String,
    path: PathBuf,
    description: Option<String>,
    hidden: bool,
}

impl Script {
    pub fn new(
        name: impl Into<String>,
        namespace: Option<String>,
        environment: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace,
            environment: environment.into(),
            path: path.into(),
            description: None,
            hidden: false,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Name including the namespace prefix
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}{}{}", namespace, NAMESPACE_SEPARATOR, self.name),
            None => self.name.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the script file
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }
}

/// Lookup of known scripts
pub trait ScriptCatalog {
    /// Every script in discovery order
    fn all(&self) -> Vec<Script>;

    /// Script by its full (namespaced) name
    fn find_by_name(&self, name: &str) -> Result<Script>;
}

/// Catalog backed by the command paths of a [`Config`]
#[derive(Debug, Clone)]
pub struct ScriptFinder {
    scripts: Vec<Script>,
}

impl ScriptFinder {
    /// Scan every environment of `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut scripts: Vec<Script> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for env_name in config.environment_names() {
            let environment = config.environment(env_name)?;
            let namespace = config.namespace_of(env_name);

            for dir in environment.command_paths() {
                for script in scan_directory(dir, env_name, namespace.as_deref(), environment.is_hidden())? {
                    let full_name = script.full_name();
                    match positions.get(&full_name) {
                        Some(&index) => {
                            warn!(script = %full_name, path = %script.path.display(), "duplicate script replaces earlier definition");
                            scripts[index] = script;
                        }
                        None => {
                            positions.insert(full_name, scripts.len());
                            scripts.push(script);
                        }
                    }
                }
            }
        }

        debug!(count = scripts.len(), "discovered scripts");
        Ok(Self { scripts })
    }

    /// Catalog over an explicit list of scripts
    pub fn from_scripts(scripts: Vec<Script>) -> Self {
        Self { scripts }
    }

    /// Scripts whose full name contains `fragment`
    pub fn find_by_partial_name(&self, fragment: &str) -> Vec<&Script> {
        self.scripts
            .iter()
            .filter(|script| script.full_name().contains(fragment))
            .collect()
    }

    /// Scripts not marked hidden
    pub fn visible(&self) -> impl Iterator<Item = &Script> {
        self.scripts.iter().filter(|script| !script.hidden)
    }
}

impl ScriptCatalog for ScriptFinder {
    fn all(&self) -> Vec<Script> {
        self.scripts.clone()
    }

    fn find_by_name(&self, name: &str) -> Result<Script> {
        if let Some(script) = self.scripts.iter().find(|s| s.full_name() == name) {
            return Ok(script.clone());
        }

        let suggestions: Vec<String> = self
            .find_by_partial_name(name)
            .into_iter()
            .filter(|s| !s.hidden)
            .map(Script::full_name)
            .collect();

        Err(LayrError::ScriptNotFound {
            name: name.to_string(),
            suggestion: if suggestions.is_empty() {
                Some("Run `layr list` to see available scripts".to_string())
            } else {
                Some(format!("Did you mean: {}?", suggestions.join(", ")))
            },
        })
    }
}

fn scan_directory(
    dir: &Path,
    environment: &str,
    namespace: Option<&str>,
    hidden: bool,
) -> Result<Vec<Script>> {
    if !dir.is_dir() {
        return Err(LayrError::ScriptPathNotValid {
            path: dir.to_path_buf(),
        });
    }

    let mut scripts = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| {
            LayrError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "directory walk failed")
            }))
        })?;

        if !entry.file_type().is_file() || !is_script_file(entry.path()) {
            continue;
        }

        let path = entry.path();
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
            continue;
        };

        let description = read_description(path);
        let script = Script::new(stem.clone(), namespace.map(str::to_string), environment, path)
            .with_description(description)
            .with_hidden(hidden || stem.starts_with('.'));
        scripts.push(script);
    }

    Ok(scripts)
}

fn is_script_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SCRIPT_EXTENSIONS.contains(&ext))
}

/// Description from the leading comment block of a script
///
/// Bytes that are not UTF-8 are replaced; an unreadable file has no description
/// and only fails once the script itself is compiled.
pub fn read_description(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(bytes) => parse_description(&String::from_utf8_lossy(&bytes)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read script description");
            None
        }
    }
}

fn parse_description(content: &str) -> Option<String> {
    let mut parts = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("#!") {
            continue;
        }
        let Some(comment) = trimmed.strip_prefix('#') else {
            break;
        };
        let comment = comment.trim();
        let comment = comment
            .strip_prefix("DESCRIPTION:")
            .map(str::trim)
            .unwrap_or(comment);
        if !comment.is_empty() {
            parts.push(comment);
        }
    }

    (!parts.is_empty()).then(|| parts.join(" "))
}
