//! Shell process construction shared by the executor and dynamic placeholders

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

/// Build a command that hands `line` to the platform shell
pub fn shell_command(line: &str, cwd: &Path, env: &HashMap<String, String>) -> Command {
    let (shell, flag) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };

    let mut command = Command::new(shell);
    command
        .arg(flag)
        .arg(line)
        .current_dir(cwd)
        .envs(env)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

/// Run `line` to completion and capture its output
pub async fn capture(line: &str, cwd: &Path) -> std::io::Result<std::process::Output> {
    let mut command = shell_command(line, cwd, &HashMap::new());
    command.stdin(Stdio::null());
    command.output().await
}
