// src/source/process.rs

//! External command execution

use crate::error::Result;
use std::ffi::OsStr;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into a failure message carrying stderr
    pub fn check(self, what: &str) -> std::result::Result<Self, String> {
        if self.success() {
            return Ok(self);
        }

        let status = match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            Err(format!("{} failed ({})", what, status))
        } else {
            Err(format!("{} failed ({})\n{}", what, status, stderr))
        }
    }
}

/// Run a program to completion, capturing its output
///
/// Only failure to start the program is an error; a non-zero exit is
/// reported through [`CommandOutput`].
pub async fn run<I, S>(
    program: &str,
    args: I,
    cwd: Option<&Path>,
    envs: &[(&str, String)],
) -> Result<CommandOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command.args(args).kill_on_drop(true);
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }
    for (key, value) in envs {
        command.env(key, value);
    }

    debug!("Running {:?}", command.as_std());
    let output = command.output().await?;

    Ok(CommandOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_output() {
        let output = run("sh", ["-c", "echo out; echo err >&2"], None, &[]).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn test_failure_message() {
        let output = run("sh", ["-c", "echo broken >&2; exit 3"], None, &[]).await.unwrap();
        let message = output.check("build step").unwrap_err();
        assert!(message.contains("exit code 3"));
        assert!(message.contains("broken"));
    }

    #[tokio::test]
    async fn test_env_and_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let output = run(
            "sh",
            ["-c", "echo $FOAMPM_TEST_VAR; pwd"],
            Some(dir.path()),
            &[("FOAMPM_TEST_VAR", "value".to_string())],
        )
        .await
        .unwrap();
        assert!(output.stdout.starts_with("value\n"));
        assert!(output.stdout.trim_end().ends_with(
            dir.path().canonicalize().unwrap().file_name().unwrap().to_str().unwrap()
        ));
    }

    #[tokio::test]
    async fn test_missing_program() {
        assert!(run("foampm-no-such-program", Vec::<&str>::new(), None, &[]).await.is_err());
    }
}
