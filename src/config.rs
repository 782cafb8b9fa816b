//! Effective configuration model
//!
//! A [`Config`] is the fully merged view over every configuration layer. It is
//! assembled once through [`ConfigBuilder`] and only read afterwards.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::{LayrError, Result};

/// Name of the environment described by the top level of a config file
pub const DEFAULT_ENVIRONMENT: &str = "default";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub(crate) header: String,
    pub(crate) default_environment: String,
    pub(crate) environments: HashMap<String, Environment>,
    pub(crate) dotenv_paths: IndexMap<String, PathBuf>,
}

/// A named group of script paths, placeholders and templates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    pub(crate) hidden: bool,
    pub(crate) command_paths: Vec<PathBuf>,
    pub(crate) dynamic: HashMap<String, String>,
    pub(crate) constants: HashMap<String, String>,
    pub(crate) templates: Vec<Template>,
}

/// A file rendered with placeholder substitution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Template {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl Template {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

/// Placeholder definitions visible from one environment, default environment included
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceholderSet {
    pub constants: HashMap<String, String>,
    pub dynamic: HashMap<String, String>,
    pub dotenv_paths: Vec<PathBuf>,
}

impl Config {
    pub fn header(&self) -> &str {
        &self.header
    }

    /// The environment whose scripts carry no namespace
    pub fn default_environment(&self) -> &str {
        if self.default_environment.is_empty() {
            DEFAULT_ENVIRONMENT
        } else {
            &self.default_environment
        }
    }

    pub fn environments(&self) -> &HashMap<String, Environment> {
        &self.environments
    }

    pub fn environment(&self, name: &str) -> Result<&Environment> {
        self.environments
            .get(name)
            .ok_or_else(|| LayrError::UnknownEnvironment {
                name: name.to_string(),
            })
    }

    /// Dotenv files in declaration order
    pub fn dotenv_paths(&self) -> &IndexMap<String, PathBuf> {
        &self.dotenv_paths
    }

    /// Environment names with the default environment first, the rest sorted
    pub fn environment_names(&self) -> Vec<&str> {
        let default = self.default_environment();
        let mut names: Vec<&str> = self
            .environments
            .keys()
            .map(String::as_str)
            .filter(|name| *name != default)
            .collect();
        names.sort_unstable();
        if self.environments.contains_key(default) {
            names.insert(0, default);
        }
        names
    }

    /// Namespace prefix for scripts of an environment
    pub fn namespace_of(&self, environment: &str) -> Option<String> {
        (environment != self.default_environment()).then(|| environment.to_string())
    }

    /// Placeholders of `environment` layered over those of the default environment
    pub fn placeholders(&self, environment: &str) -> Result<PlaceholderSet> {
        let mut set = PlaceholderSet::default();
        for env in self.inheritance_chain(environment)? {
            set.constants.extend(env.constants.clone());
            set.dynamic.extend(env.dynamic.clone());
        }

        // Declaration order; later files win
        set.dotenv_paths = self.dotenv_paths.values().cloned().collect();

        Ok(set)
    }

    /// Templates rendered before every script of `environment`
    pub fn templates(&self, environment: &str) -> Result<Vec<Template>> {
        Ok(self
            .inheritance_chain(environment)?
            .into_iter()
            .flat_map(|env| env.templates.iter().cloned())
            .collect())
    }

    fn inheritance_chain(&self, environment: &str) -> Result<Vec<&Environment>> {
        let target = self.environment(environment)?;
        let default = self.default_environment();

        match self.environments.get(default) {
            Some(base) if environment != default => Ok(vec![base, target]),
            _ => Ok(vec![target]),
        }
    }
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn command_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.command_paths.push(path.into());
        self
    }

    pub fn dynamic(mut self, name: impl Into<String>, command: impl Into<String>) -> Self {
        self.dynamic.insert(name.into(), command.into());
        self
    }

    pub fn constant(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.constants.insert(name.into(), value.into());
        self
    }

    pub fn template(mut self, template: Template) -> Self {
        self.templates.push(template);
        self
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn command_paths(&self) -> &[PathBuf] {
        &self.command_paths
    }

    pub fn dynamic_variables(&self) -> &HashMap<String, String> {
        &self.dynamic
    }

    pub fn constants(&self) -> &HashMap<String, String> {
        &self.constants
    }

    pub fn template_list(&self) -> &[Template] {
        &self.templates
    }
}

/// Assembles a [`Config`] from one parsed source
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.config.header = header.into();
        self
    }

    pub fn default_environment(mut self, name: impl Into<String>) -> Self {
        self.config.default_environment = name.into();
        self
    }

    /// Add an environment; a repeated name replaces the earlier definition
    pub fn environment(mut self, name: impl Into<String>, environment: Environment) -> Self {
        self.config.environments.insert(name.into(), environment);
        self
    }

    /// Add a dotenv file; a repeated key keeps its position and takes the new path
    pub fn dotenv(mut self, key: impl Into<String>, path: impl AsRef<Path>) -> Self {
        self.config
            .dotenv_paths
            .insert(key.into(), path.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
