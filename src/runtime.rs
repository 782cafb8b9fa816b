//! Script runtime
//!
//! Ties the pieces together for one invocation: looks scripts up in the
//! catalog, compiles them against the placeholders of their environment and
//! hands the commands to the executor.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::catalog::{Script, ScriptCatalog, ScriptFinder};
use crate::command::{Command, CommandCompiler};
use crate::config::Config;
use crate::error::{LayrError, Result};
use crate::executor::{Executor, ExecutorConfig, RunSummary};
use crate::logger::Logger;
use crate::placeholder::PlaceholderResolver;

/// Effective configuration plus the scripts it exposes
#[derive(Debug)]
pub struct Runtime {
    config: Config,
    root: PathBuf,
    catalog: ScriptFinder,
    params: HashMap<String, String>,
    compiler: CommandCompiler,
}

impl Runtime {
    /// Discover the scripts of `config`; commands run in `root`
    pub fn new(config: Config, root: impl Into<PathBuf>) -> Result<Self> {
        let catalog = ScriptFinder::from_config(&config)?;
        Ok(Self::with_catalog(config, root, catalog))
    }

    pub fn with_catalog(config: Config, root: impl Into<PathBuf>, catalog: ScriptFinder) -> Self {
        Self {
            config,
            root: root.into(),
            catalog,
            params: HashMap::new(),
            compiler: CommandCompiler::new(),
        }
    }

    /// Placeholder values given on the command line
    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &ScriptFinder {
        &self.catalog
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run the named scripts in order, stopping at the first failure.
    ///
    /// Every script is looked up, checked for unknown placeholders and compiled
    /// before the first one executes, so a typo in any of them runs nothing.
    pub async fn run<L: Logger>(&self, names: &[String], logger: L) -> Result<Vec<RunSummary>> {
        let scripts = names
            .iter()
            .map(|name| self.catalog.find_by_name(name))
            .collect::<Result<Vec<Script>>>()?;

        let mut resolvers: HashMap<String, PlaceholderResolver> = HashMap::new();
        for script in &scripts {
            if let Entry::Vacant(entry) = resolvers.entry(script.environment().to_string()) {
                entry.insert(self.resolver_for(script.environment())?);
            }
        }

        for script in &scripts {
            self.compiler
                .verify(script, resolver_of(&resolvers, script)?)
                .await?;
        }

        let mut compiled = Vec::with_capacity(scripts.len());
        for script in &scripts {
            let resolver = resolver_of_mut(&mut resolvers, script)?;
            compiled.push(self.compile(script, resolver).await?);
        }

        let mut executor = Executor::new(
            logger,
            ExecutorConfig {
                cwd: self.root.clone(),
                env: HashMap::new(),
            },
        );
        let mut summaries = Vec::with_capacity(scripts.len());

        for (script, commands) in scripts.iter().zip(&compiled) {
            let resolver = resolver_of_mut(&mut resolvers, script)?;
            summaries.push(executor.execute(script, commands, resolver).await?);
        }

        Ok(summaries)
    }

    /// Placeholder resolver for scripts of `environment`
    pub fn resolver_for(&self, environment: &str) -> Result<PlaceholderResolver> {
        let set = self.config.placeholders(environment)?;
        Ok(PlaceholderResolver::new(set, &self.root)?.with_params(&self.params))
    }

    /// Environment templates followed by the script's own commands
    pub async fn compile(
        &self,
        script: &Script,
        resolver: &mut PlaceholderResolver,
    ) -> Result<Vec<Command>> {
        let mut commands: Vec<Command> = self
            .config
            .templates(script.environment())?
            .into_iter()
            .map(|template| Command::Template {
                line: 0,
                source: template.source,
                destination: template.destination,
            })
            .collect();

        commands.extend(self.compiler.compile(script, resolver).await?);
        debug!(script = %script.full_name(), commands = commands.len(), "prepared script");
        Ok(commands)
    }
}

fn resolver_of<'a>(
    resolvers: &'a HashMap<String, PlaceholderResolver>,
    script: &Script,
) -> Result<&'a PlaceholderResolver> {
    resolvers
        .get(script.environment())
        .ok_or_else(|| LayrError::UnknownEnvironment {
            name: script.environment().to_string(),
        })
}

fn resolver_of_mut<'a>(
    resolvers: &'a mut HashMap<String, PlaceholderResolver>,
    script: &Script,
) -> Result<&'a mut PlaceholderResolver> {
    resolvers
        .get_mut(script.environment())
        .ok_or_else(|| LayrError::UnknownEnvironment {
            name: script.environment().to_string(),
        })
}

/// Parse `NAME=VALUE` command line parameters
pub fn parse_params(raw: &[String]) -> Result<HashMap<String, String>> {
    raw.iter()
        .map(|entry| match entry.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                Ok((name.trim().to_string(), value.to_string()))
            }
            _ => Err(LayrError::InvalidParam { raw: entry.clone() }),
        })
        .collect()
}
