//! Placeholder resolution
//!
//! Script lines and template files reference values as `%NAME%`. Values come
//! from constants, dotenv files or the output of a shell command. Shell
//! commands run lazily, at most once per resolver, and their output is cached
//! for every later reference.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::PlaceholderSet;
use crate::error::{LayrError, Result};
use crate::shell;

/// Delimiter around placeholder names
pub const DELIMITER: char = '%';

/// Where a placeholder value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderValue {
    /// Literal from the configuration or the command line
    Const(String),
    /// Entry of a dotenv file
    Dotenv { value: String, source: PathBuf },
    /// Standard output of a shell command, computed on first use
    Dynamic { command: String },
}

impl PlaceholderValue {
    /// Known value; `None` for dynamic values, which only the resolver computes
    pub fn value(&self) -> Option<&str> {
        match self {
            PlaceholderValue::Const(value) | PlaceholderValue::Dotenv { value, .. } => {
                Some(value.as_str())
            }
            PlaceholderValue::Dynamic { .. } => None,
        }
    }
}

/// Resolves placeholder names for one invocation
#[derive(Debug)]
pub struct PlaceholderResolver {
    values: HashMap<String, PlaceholderValue>,
    cache: HashMap<String, String>,
    cwd: PathBuf,
}

impl PlaceholderResolver {
    /// Build a resolver, reading every dotenv file of `set`.
    ///
    /// Precedence from low to high: constants, dynamic commands, dotenv
    /// entries (later files win).
    pub fn new(set: PlaceholderSet, cwd: impl Into<PathBuf>) -> Result<Self> {
        let mut values = HashMap::new();

        for (name, value) in set.constants {
            values.insert(name, PlaceholderValue::Const(value));
        }
        for (name, command) in set.dynamic {
            values.insert(name, PlaceholderValue::Dynamic { command });
        }
        for path in &set.dotenv_paths {
            for (name, value) in read_dotenv(path)? {
                values.insert(
                    name,
                    PlaceholderValue::Dotenv {
                        value,
                        source: path.clone(),
                    },
                );
            }
        }

        Ok(Self {
            values,
            cache: HashMap::new(),
            cwd: cwd.into(),
        })
    }

    /// Constants that take precedence over every configured source
    pub fn with_params(mut self, params: &HashMap<String, String>) -> Self {
        for (name, value) in params {
            self.values
                .insert(name.clone(), PlaceholderValue::Const(value.clone()));
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Value of `name`, running its command on first use if it is dynamic
    pub async fn resolve(&mut self, name: &str) -> Result<String> {
        let command = match self.values.get(name) {
            None => {
                return Err(LayrError::UnknownPlaceholder {
                    name: name.to_string(),
                })
            }
            Some(PlaceholderValue::Dynamic { command }) => command.clone(),
            Some(known) => return Ok(known.value().unwrap_or_default().to_string()),
        };

        if let Some(cached) = self.cache.get(name) {
            return Ok(cached.clone());
        }

        debug!(placeholder = name, %command, "evaluating dynamic placeholder");
        let value = evaluate(name, &command, &self.cwd).await?;
        self.cache.insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Replace every `%NAME%` token in `text`; `%%` yields a literal `%`
    pub async fn substitute(&mut self, text: &str) -> Result<String> {
        let mut output = String::with_capacity(text.len());

        for segment in segments(text) {
            match segment {
                Segment::Literal(literal) => output.push_str(literal),
                Segment::Placeholder(name) => output.push_str(&self.resolve(name).await?),
            }
        }

        Ok(output)
    }

    /// Fail on the first name in `text` that has no definition, running nothing
    pub fn ensure_known(&self, text: &str) -> Result<()> {
        match references(text).into_iter().find(|name| !self.contains(name)) {
            Some(name) => Err(LayrError::UnknownPlaceholder {
                name: name.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Placeholder names referenced by `text`, in order of appearance
pub fn references(text: &str) -> Vec<&str> {
    segments(text)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name),
            Segment::Literal(_) => None,
        })
        .collect()
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(DELIMITER) {
        if start > 0 {
            segments.push(Segment::Literal(&rest[..start]));
        }
        let after = &rest[start + 1..];

        // `%%` keeps one delimiter
        if let Some(escaped) = after.strip_prefix(DELIMITER) {
            segments.push(Segment::Literal(&rest[start..start + 1]));
            rest = escaped;
            continue;
        }

        match after.find(DELIMITER) {
            Some(end) if is_placeholder_name(&after[..end]) => {
                segments.push(Segment::Placeholder(&after[..end]));
                rest = &after[end + 1..];
            }
            _ => {
                segments.push(Segment::Literal(&rest[start..start + 1]));
                rest = after;
            }
        }
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    segments
}

fn is_placeholder_name(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

async fn evaluate(name: &str, command: &str, cwd: &Path) -> Result<String> {
    let output = shell::capture(command, cwd).await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(LayrError::PlaceholderResolution {
            name: name.to_string(),
            command: command.to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr: (!stderr.is_empty()).then_some(stderr),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.trim_end_matches(['\n', '\r']).to_string())
}

fn read_dotenv(path: &Path) -> Result<Vec<(String, String)>> {
    let not_readable = |source| LayrError::DotenvNotReadable {
        path: path.to_path_buf(),
        source,
    };

    dotenvy::from_path_iter(path)
        .map_err(not_readable)?
        .map(|entry| entry.map_err(not_readable))
        .collect()
}
