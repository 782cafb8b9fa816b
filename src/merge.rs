//! Layered configuration merging
//!
//! Overrides are folded onto the base from left to right. Scalars and lists
//! are replaced when the override supplies a value, maps are unioned with the
//! override winning on conflicts, and `hidden` can only ever be switched on.

use std::collections::HashMap;
use std::hash::Hash;

use indexmap::IndexMap;

use crate::config::{Config, Environment};
use crate::error::{LayrError, Result};

/// Combines configuration layers into one effective [`Config`]
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigMerger;

impl ConfigMerger {
    pub fn new() -> Self {
        Self
    }

    /// Merge `overrides` onto `base` in order. Inputs are left untouched.
    pub fn merge(&self, base: &Config, overrides: &[Config]) -> Result<Config> {
        let merged = overrides
            .iter()
            .fold(base.clone(), |acc, layer| Self::merge_pair(&acc, layer));

        Self::validate(&merged)?;
        Ok(merged)
    }

    fn merge_pair(base: &Config, layer: &Config) -> Config {
        let mut environments = base.environments.clone();
        for (name, env) in &layer.environments {
            let merged = match base.environments.get(name) {
                Some(existing) => Self::merge_environment(existing, env),
                None => env.clone(),
            };
            environments.insert(name.clone(), merged);
        }

        Config {
            header: non_empty_or(&layer.header, &base.header),
            default_environment: non_empty_or(
                &layer.default_environment,
                &base.default_environment,
            ),
            environments,
            dotenv_paths: union_ordered(&base.dotenv_paths, &layer.dotenv_paths),
        }
    }

    fn merge_environment(base: &Environment, layer: &Environment) -> Environment {
        Environment {
            hidden: base.hidden || layer.hidden,
            command_paths: replace_if_present(&base.command_paths, &layer.command_paths),
            dynamic: union(&base.dynamic, &layer.dynamic),
            constants: union(&base.constants, &layer.constants),
            templates: replace_if_present(&base.templates, &layer.templates),
        }
    }

    fn validate(config: &Config) -> Result<()> {
        let explicit = &config.default_environment;
        if !explicit.is_empty() && !config.environments.contains_key(explicit) {
            return Err(LayrError::ConfigMerge {
                reason: format!(
                    "default environment '{}' is not defined by any layer",
                    explicit
                ),
            });
        }
        Ok(())
    }
}

fn non_empty_or(preferred: &str, fallback: &str) -> String {
    if preferred.is_empty() {
        fallback.to_string()
    } else {
        preferred.to_string()
    }
}

fn replace_if_present<T: Clone>(base: &[T], layer: &[T]) -> Vec<T> {
    if layer.is_empty() {
        base.to_vec()
    } else {
        layer.to_vec()
    }
}

fn union<K, V>(base: &HashMap<K, V>, layer: &HashMap<K, V>) -> HashMap<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    let mut merged = base.clone();
    merged.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Like [`union`], keeping base keys in place and appending new ones
fn union_ordered<K, V>(base: &IndexMap<K, V>, layer: &IndexMap<K, V>) -> IndexMap<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    let mut merged = base.clone();
    merged.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigBuilder, Template};
    use std::path::PathBuf;

    const ENV: &str = "env";

    fn config_with(env: Environment) -> Config {
        ConfigBuilder::new()
            .default_environment(ENV)
            .environment(ENV, env)
            .build()
    }

    fn merge(base: Config, layer: Config) -> Config {
        ConfigMerger::new().merge(&base, &[layer]).unwrap()
    }

    #[test]
    fn test_merge_without_overrides_returns_base() {
        let base = ConfigBuilder::new().header("my header").build();
        let merged = ConfigMerger::new().merge(&base, &[]).unwrap();
        assert_eq!(merged, base);
    }

    #[test]
    fn test_header_override_rule() {
        let cases = [("base", "", "base"), ("base", "override", "override"), ("", "", "")];

        for (base, layer, expected) in cases {
            let merged = merge(
                ConfigBuilder::new().header(base).build(),
                ConfigBuilder::new().header(layer).build(),
            );
            assert_eq!(merged.header(), expected);
        }
    }

    #[test]
    fn test_default_environment_override() {
        let base = ConfigBuilder::new()
            .default_environment("a")
            .environment("a", Environment::new())
            .environment("b", Environment::new())
            .build();

        let kept = merge(base.clone(), ConfigBuilder::new().build());
        assert_eq!(kept.default_environment(), "a");

        let replaced = merge(base, ConfigBuilder::new().default_environment("b").build());
        assert_eq!(replaced.default_environment(), "b");
    }

    #[test]
    fn test_unknown_default_environment_is_rejected() {
        let base = config_with(Environment::new());
        let layer = ConfigBuilder::new().default_environment("nowhere").build();

        let result = ConfigMerger::new().merge(&base, &[layer]);
        assert!(matches!(result, Err(LayrError::ConfigMerge { .. })));
    }

    #[test]
    fn test_environments_are_unioned() {
        let base = config_with(Environment::new().command_path("actions").constant("foo", "bar"));
        let layer = ConfigBuilder::new()
            .environment("newEnv", Environment::new().command_path("actions"))
            .build();

        let merged = merge(base, layer);
        assert!(merged.environments().contains_key(ENV));
        assert!(merged.environments().contains_key("newEnv"));
        assert_eq!(merged.environment(ENV).unwrap().constants()["foo"], "bar");
    }

    #[test]
    fn test_command_paths_replaced_wholesale() {
        let base = config_with(Environment::new().command_path("actions").command_path("more"));

        let kept = merge(base.clone(), config_with(Environment::new()));
        assert_eq!(
            kept.environment(ENV).unwrap().command_paths(),
            &[PathBuf::from("actions"), PathBuf::from("more")]
        );

        let replaced = merge(base, config_with(Environment::new().command_path("override/actions")));
        assert_eq!(
            replaced.environment(ENV).unwrap().command_paths(),
            &[PathBuf::from("override/actions")]
        );
    }

    #[test]
    fn test_dynamic_variables_additive_with_override_precedence() {
        let base = config_with(
            Environment::new()
                .dynamic("A", "echo base-a")
                .dynamic("B", "echo base-b"),
        );
        let layer = config_with(
            Environment::new()
                .dynamic("A", "echo override-a")
                .dynamic("C", "echo override-c"),
        );

        let merged = merge(base, layer);
        let dynamic = merged.environment(ENV).unwrap().dynamic_variables();

        assert_eq!(dynamic.len(), 3);
        assert_eq!(dynamic["A"], "echo override-a");
        assert_eq!(dynamic["B"], "echo base-b");
        assert_eq!(dynamic["C"], "echo override-c");
    }

    #[test]
    fn test_constants_additive_with_override_precedence() {
        let base = config_with(
            Environment::new()
                .constant("CONST", "constant value")
                .constant("ORIGINAL_CONST", "original constant value"),
        );
        let layer = config_with(
            Environment::new()
                .constant("CONST", "override constant value")
                .constant("ADDED_CONST", "override constant"),
        );

        let merged = merge(base, layer);
        let constants = merged.environment(ENV).unwrap().constants();

        assert_eq!(constants.len(), 3);
        assert_eq!(constants["CONST"], "override constant value");
        assert_eq!(constants["ORIGINAL_CONST"], "original constant value");
        assert_eq!(constants["ADDED_CONST"], "override constant");
    }

    #[test]
    fn test_templates_replaced_wholesale() {
        let base = config_with(
            Environment::new()
                .template(Template::new("/tmp/template.tpl", "/tmp/template.php"))
                .template(Template::new("/tmp/second.tpl", "/tmp/second.php")),
        );
        let layer = config_with(
            Environment::new().template(Template::new("/tmp/override.tpl", "/tmp/override.php")),
        );

        let merged = merge(base, layer);
        assert_eq!(
            merged.environment(ENV).unwrap().template_list(),
            &[Template::new("/tmp/override.tpl", "/tmp/override.php")]
        );
    }

    #[test]
    fn test_dotenv_paths_additive() {
        let base = ConfigBuilder::new()
            .dotenv(".a", "first/.a")
            .dotenv(".b", "first/.b")
            .build();
        let layer = ConfigBuilder::new()
            .dotenv(".a", "overwrite/.a")
            .dotenv(".c", "overwrite/.c")
            .build();

        let merged = merge(base, layer);
        let paths = merged.dotenv_paths();

        assert_eq!(paths.len(), 3);
        assert_eq!(paths[".a"], PathBuf::from("overwrite/.a"));
        assert_eq!(paths[".b"], PathBuf::from("first/.b"));
        assert_eq!(paths[".c"], PathBuf::from("overwrite/.c"));
    }

    #[test]
    fn test_dotenv_paths_keep_declaration_order() {
        let base = ConfigBuilder::new()
            .dotenv("z.env", "first/z.env")
            .dotenv("a.env", "first/a.env")
            .build();
        let layer = ConfigBuilder::new()
            .dotenv("m.env", "overwrite/m.env")
            .dotenv("z.env", "overwrite/z.env")
            .build();

        let merged = merge(base, layer);
        let keys: Vec<&str> = merged.dotenv_paths().keys().map(String::as_str).collect();

        assert_eq!(keys, vec!["z.env", "a.env", "m.env"]);
        assert_eq!(merged.dotenv_paths()["z.env"], PathBuf::from("overwrite/z.env"));
    }

    #[test]
    fn test_hidden_is_or() {
        let cases = [(false, false, false), (true, false, true), (false, true, true), (true, true, true)];

        for (base, layer, expected) in cases {
            let merged = merge(
                config_with(Environment::new().hidden(base)),
                config_with(Environment::new().hidden(layer)),
            );
            assert_eq!(merged.environment(ENV).unwrap().is_hidden(), expected);
        }
    }

    #[test]
    fn test_inputs_are_not_mutated() {
        let base = config_with(Environment::new().constant("A", "1"));
        let layer = config_with(Environment::new().constant("A", "2"));
        let base_copy = base.clone();

        let _ = ConfigMerger::new().merge(&base, &[layer]).unwrap();
        assert_eq!(base, base_copy);
    }

    #[test]
    fn test_fold_is_left_to_right() {
        let base = ConfigBuilder::new().header("base").build();
        let first = ConfigBuilder::new().header("first").build();
        let second = ConfigBuilder::new().header("second").build();
        let untitled = ConfigBuilder::new().build();

        let merged = ConfigMerger::new()
            .merge(&base, &[first, second, untitled])
            .unwrap();
        assert_eq!(merged.header(), "second");
    }
}
