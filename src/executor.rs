//! Script execution engine
//!
//! Runs compiled commands strictly in order, one subprocess at a time,
//! forwarding output to the [`Logger`] line by line as it is produced. The
//! first failing command that is not marked with the ignore-error prefix
//! aborts the run.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::catalog::Script;
use crate::command::Command;
use crate::error::{LayrError, Result};
use crate::logger::{LogMessage, Logger};
use crate::placeholder::PlaceholderResolver;
use crate::shell;
use crate::template::TemplateRenderer;

/// Variable holding the full name of the running script
pub const SCRIPT_ENV_VAR: &str = "LAYR_SCRIPT";

/// Variable holding the environment of the running script
pub const ENVIRONMENT_ENV_VAR: &str = "LAYR_ENVIRONMENT";

/// Lifecycle of one script run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub script: String,
    pub executed: usize,
    /// Failed commands that carried the ignore-error marker
    pub ignored_failures: usize,
    pub duration: Duration,
}

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Working directory of every command
    pub cwd: PathBuf,
    /// Variables added to the inherited OS environment
    pub env: HashMap<String, String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_default(),
            env: HashMap::new(),
        }
    }
}

/// Script executor
pub struct Executor<L: Logger> {
    logger: L,
    exec_config: ExecutorConfig,
    renderer: TemplateRenderer,
    state: RunState,
}

impl<L: Logger> Executor<L> {
    /// Create a new executor reporting to `logger`
    pub fn new(logger: L, exec_config: ExecutorConfig) -> Self {
        Self {
            logger,
            exec_config,
            renderer: TemplateRenderer::new(),
            state: RunState::Pending,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn logger(&self) -> &L {
        &self.logger
    }

    pub fn into_logger(self) -> L {
        self.logger
    }

    /// Run `commands` of `script` in order
    pub async fn execute(
        &mut self,
        script: &Script,
        commands: &[Command],
        resolver: &mut PlaceholderResolver,
    ) -> Result<RunSummary> {
        let start = Instant::now();
        let total = commands.len();
        let mut ignored_failures = 0;

        self.transition(RunState::Running);
        self.logger.start_script(script);

        for (index, command) in commands.iter().enumerate() {
            let outcome = match command {
                Command::Execute {
                    line,
                    command,
                    ignore_error,
                } => {
                    self.logger
                        .log_start("Starting", command, *line, *ignore_error, index, total);
                    self.execute_line(script, *line, command, *ignore_error).await
                }
                Command::Template {
                    line,
                    source,
                    destination,
                } => {
                    let subject = format!("{} → {}", source.display(), destination.display());
                    self.logger
                        .log_start("Template", &subject, *line, false, index, total);
                    match self.renderer.render(source, destination, resolver).await {
                        Ok(()) => {
                            self.logger.log_success();
                            Ok(false)
                        }
                        Err(e) => {
                            self.logger.log_failure();
                            Err(failure(script, *line, None, Some(e)))
                        }
                    }
                }
            };

            match outcome {
                Ok(true) => ignored_failures += 1,
                Ok(false) => {}
                Err(e) => {
                    self.transition(RunState::Failed);
                    return Err(e);
                }
            }
        }

        self.transition(RunState::Succeeded);
        self.logger.finish_script(script);

        Ok(RunSummary {
            script: script.full_name(),
            executed: total,
            ignored_failures,
            duration: start.elapsed(),
        })
    }

    /// Returns whether an ignorable failure occurred
    async fn execute_line(
        &mut self,
        script: &Script,
        line: usize,
        command: &str,
        ignore_error: bool,
    ) -> Result<bool> {
        let status = match self.run_shell(script, command).await {
            Ok(status) => status,
            Err(e) => {
                self.logger.log_failure();
                return Err(failure(script, line, None, Some(e)));
            }
        };

        if status.success() {
            self.logger.log_success();
            return Ok(false);
        }

        let code = status.code();
        if ignore_error {
            self.logger.warn(&format!(
                "Line {} exited with {}, continuing because errors are ignored",
                line,
                describe_code(code)
            ));
            return Ok(true);
        }

        self.logger.log_failure();
        Err(failure(script, line, code, None))
    }

    async fn run_shell(&mut self, script: &Script, command: &str) -> Result<ExitStatus> {
        let mut env = self.exec_config.env.clone();
        env.insert(SCRIPT_ENV_VAR.to_string(), script.full_name());
        env.insert(
            ENVIRONMENT_ENV_VAR.to_string(),
            script.environment().to_string(),
        );

        let mut child = shell::shell_command(command, &self.exec_config.cwd, &env).spawn()?;
        self.logger.log_wait();

        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;
        let mut stdout = BufReader::new(stdout).split(b'\n');
        let mut stderr = BufReader::new(stderr).split(b'\n');
        let (mut stdout_open, mut stderr_open) = (true, true);

        while stdout_open || stderr_open {
            tokio::select! {
                segment = stdout.next_segment(), if stdout_open => match segment? {
                    Some(bytes) => self.logger.log(LogMessage::output(decode(&bytes))),
                    None => stdout_open = false,
                },
                segment = stderr.next_segment(), if stderr_open => match segment? {
                    Some(bytes) => self.logger.log(LogMessage::error(decode(&bytes))),
                    None => stderr_open = false,
                },
            }
        }

        Ok(child.wait().await?)
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "run state");
        self.state = next;
    }
}

fn failure(script: &Script, line: usize, code: Option<i32>, source: Option<LayrError>) -> LayrError {
    LayrError::ExecutionFailed {
        script: script.full_name(),
        line,
        code,
        source: source.map(Box::new),
    }
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\r')
        .to_string()
}

fn missing_pipe(name: &str) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        format!("{} of child process was not captured", name),
    )
}
