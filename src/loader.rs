//! Configuration file loading
//!
//! Finds the configuration layers of a project and parses each of them into a
//! [`Config`]. The layers are then folded together by [`ConfigMerger`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{Config, ConfigBuilder, Environment, Template, DEFAULT_ENVIRONMENT};
use crate::error::{LayrError, Result};
use crate::merge::ConfigMerger;

/// Distributed base configuration, usually committed
pub const DIST_FILE: &str = "layr.toml.dist";

/// Project configuration, merged over the dist file
pub const CONFIG_FILE: &str = "layr.toml";

/// Suffix of the local override layer, merged last
pub const OVERRIDE_SUFFIX: &str = ".override";

/// Configuration files of one project, in merge order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayers {
    /// Directory of the base file; commands run here
    pub root: PathBuf,
    pub files: Vec<PathBuf>,
}

/// File format of a configuration layer
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    header: Option<String>,

    #[serde(default)]
    default_environment: Option<String>,

    #[serde(default)]
    hidden: bool,

    #[serde(default)]
    paths: Vec<String>,

    #[serde(default)]
    dotenv: Vec<String>,

    #[serde(default, rename = "const")]
    constants: HashMap<String, String>,

    #[serde(default)]
    dynamic: HashMap<String, String>,

    #[serde(default)]
    templates: Vec<RawTemplate>,

    #[serde(default)]
    environments: HashMap<String, RawEnvironment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEnvironment {
    #[serde(default)]
    hidden: bool,

    #[serde(default)]
    paths: Vec<String>,

    #[serde(default, rename = "const")]
    constants: HashMap<String, String>,

    #[serde(default)]
    dynamic: HashMap<String, String>,

    #[serde(default)]
    templates: Vec<RawTemplate>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTemplate {
    source: String,
    destination: String,
}

impl ConfigLayers {
    /// Locate the layers, starting from `explicit` or searching upwards from `start`
    pub fn discover(start: &Path, explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_explicit(path),
            None => Self::search(start),
        }
    }

    fn from_explicit(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(LayrError::ConfigNotFound {
                searched: vec![path.to_path_buf()],
            });
        }

        let root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut files = vec![path.to_path_buf()];
        let override_file = with_override_suffix(path);
        if override_file.is_file() {
            files.push(override_file);
        }

        Ok(Self { root, files })
    }

    fn search(start: &Path) -> Result<Self> {
        let mut current = start.to_path_buf();
        let mut searched = Vec::new();

        loop {
            let candidates = [current.join(DIST_FILE), current.join(CONFIG_FILE)];
            searched.extend(candidates.iter().cloned());

            let mut files: Vec<PathBuf> = candidates.into_iter().filter(|c| c.is_file()).collect();
            if !files.is_empty() {
                let override_file = current.join(format!("{}{}", CONFIG_FILE, OVERRIDE_SUFFIX));
                if override_file.is_file() {
                    files.push(override_file);
                }
                return Ok(Self {
                    root: current,
                    files,
                });
            }

            if !current.pop() {
                break;
            }
        }

        Err(LayrError::ConfigNotFound { searched })
    }

    /// Parse and merge every layer
    pub fn load(&self) -> Result<Config> {
        let mut configs = self
            .files
            .iter()
            .map(|file| load_file(file))
            .collect::<Result<Vec<_>>>()?;

        if configs.is_empty() {
            return Err(LayrError::ConfigNotFound {
                searched: self.files.clone(),
            });
        }

        let base = configs.remove(0);
        ConfigMerger::new().merge(&base, &configs)
    }
}

/// Parse a single configuration file
pub fn load_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let base_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    debug!(file = %path.display(), "loading configuration layer");
    parse_config(&content, base_dir).map_err(|source| LayrError::ConfigParse {
        source,
        path: path.to_path_buf(),
    })
}

/// Parse configuration text whose relative paths resolve against `base_dir`
pub fn parse_config(content: &str, base_dir: &Path) -> std::result::Result<Config, toml::de::Error> {
    let raw: RawConfig = toml::from_str(content)?;

    let mut builder = ConfigBuilder::new();
    if let Some(header) = raw.header {
        builder = builder.header(header);
    }
    if let Some(default_environment) = raw.default_environment {
        builder = builder.default_environment(default_environment);
    }
    for entry in &raw.dotenv {
        builder = builder.dotenv(entry.clone(), resolve_path(base_dir, entry));
    }

    let root = RawEnvironment {
        hidden: raw.hidden,
        paths: raw.paths,
        constants: raw.constants,
        dynamic: raw.dynamic,
        templates: raw.templates,
    };
    if !root.is_empty() {
        builder = builder.environment(DEFAULT_ENVIRONMENT, root.into_environment(base_dir));
    }

    for (name, environment) in raw.environments {
        builder = builder.environment(name, environment.into_environment(base_dir));
    }

    Ok(builder.build())
}

impl RawEnvironment {
    fn is_empty(&self) -> bool {
        !self.hidden
            && self.paths.is_empty()
            && self.constants.is_empty()
            && self.dynamic.is_empty()
            && self.templates.is_empty()
    }

    fn into_environment(self, base_dir: &Path) -> Environment {
        let mut environment = Environment::new().hidden(self.hidden);

        for path in &self.paths {
            environment = environment.command_path(resolve_path(base_dir, path));
        }
        for (name, value) in self.constants {
            environment = environment.constant(name, value);
        }
        for (name, command) in self.dynamic {
            environment = environment.dynamic(name, command);
        }
        for template in &self.templates {
            environment = environment.template(Template::new(
                resolve_path(base_dir, &template.source),
                resolve_path(base_dir, &template.destination),
            ));
        }

        environment
    }
}

/// Expand `~` and `$VAR`, then anchor relative paths at `base_dir`
fn resolve_path(base_dir: &Path, raw: &str) -> PathBuf {
    let expanded = match shellexpand::full(raw) {
        Ok(expanded) => expanded.into_owned(),
        Err(e) => {
            warn!(path = raw, error = %e, "could not expand path variables");
            shellexpand::tilde(raw).into_owned()
        }
    };

    let path = PathBuf::from(expanded);
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

fn with_override_suffix(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(OVERRIDE_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_simple_config() {
        let toml = r#"
            header = "My project"
            paths = ["actions"]
            dotenv = [".env"]

            [const]
            APP_ENV = "dev"

            [dynamic]
            USER_ID = "id -u"

            [[templates]]
            source = "templates/app.tpl"
            destination = "app.ini"

            [environments.docker]
            hidden = true
            paths = ["docker/actions"]

            [environments.docker.const]
            DB_HOST = "mysql"
        "#;

        let base = Path::new("/project");
        let config = parse_config(toml, base).unwrap();

        assert_eq!(config.header(), "My project");
        assert_eq!(config.dotenv_paths()[".env"], PathBuf::from("/project/.env"));

        let default = config.environment(DEFAULT_ENVIRONMENT).unwrap();
        assert_eq!(default.command_paths(), &[PathBuf::from("/project/actions")]);
        assert_eq!(default.constants()["APP_ENV"], "dev");
        assert_eq!(default.dynamic_variables()["USER_ID"], "id -u");
        assert_eq!(
            default.template_list(),
            &[Template::new("/project/templates/app.tpl", "/project/app.ini")]
        );

        let docker = config.environment("docker").unwrap();
        assert!(docker.is_hidden());
        assert_eq!(docker.constants()["DB_HOST"], "mysql");
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result = parse_config("colour = \"red\"\n", Path::new("/project"));
        assert!(result.is_err());
    }

    #[test]
    fn test_override_only_layer_has_no_default_environment() {
        let config = parse_config("header = \"local\"\n", Path::new("/project")).unwrap();
        assert!(config.environments().is_empty());
    }

    #[test]
    fn test_discover_walks_up_and_orders_layers() {
        let temp = tempfile::tempdir().unwrap();
        let nested = temp.path().join("src/deep");
        fs::create_dir_all(&nested).unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "header = \"main\"\n").unwrap();
        fs::write(temp.path().join(DIST_FILE), "header = \"dist\"\n").unwrap();
        fs::write(temp.path().join("layr.toml.override"), "header = \"local\"\n").unwrap();

        let layers = ConfigLayers::discover(&nested, None).unwrap();
        assert_eq!(layers.root, temp.path());
        assert_eq!(
            layers.files,
            vec![
                temp.path().join(DIST_FILE),
                temp.path().join(CONFIG_FILE),
                temp.path().join("layr.toml.override"),
            ]
        );
        assert_eq!(layers.load().unwrap().header(), "local");
    }

    #[test]
    fn test_discover_explicit_file() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("custom.toml");
        fs::write(&file, "header = \"custom\"\n").unwrap();
        fs::write(temp.path().join("custom.toml.override"), "header = \"mine\"\n").unwrap();

        let layers = ConfigLayers::discover(Path::new("/"), Some(&file)).unwrap();
        assert_eq!(layers.files.len(), 2);
        assert_eq!(layers.load().unwrap().header(), "mine");
    }

    #[test]
    fn test_missing_config() {
        let temp = tempfile::tempdir().unwrap();
        let result = ConfigLayers::discover(Path::new("/"), Some(&temp.path().join("nope.toml")));
        assert!(matches!(result, Err(LayrError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_parse_error_names_file() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join(CONFIG_FILE);
        fs::write(&file, "paths = [").unwrap();

        match load_file(&file) {
            Err(LayrError::ConfigParse { path, .. }) => assert_eq!(path, file),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
