use crate::config::Config;
use crate::error::{GitError, GitResult};
use crate::git::command::GitCommand;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Result of executing a git command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turn a nonzero exit into a `CommandFailed` error
    pub fn into_result(self, command: &GitCommand) -> GitResult<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(GitError::CommandFailed {
                command: command.to_command_line(),
                exit_code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Runs git subprocesses
///
/// A nonzero exit code is not an error at this level: the output is
/// returned and callers decide. Only failing to start the process is.
#[async_trait]
pub trait CommandRunner: Send + Sync + Debug {
    async fn run(&self, working_dir: &Path, command: &GitCommand) -> GitResult<CommandOutput>;
}

/// Executes git commands as real subprocesses
#[derive(Debug, Clone)]
pub struct GitExecutor {
    executable: PathBuf,
    env: BTreeMap<String, String>,
}

impl GitExecutor {
    /// Create an executor for the `git` found on `PATH`
    pub fn new() -> Self {
        Self {
            executable: PathBuf::from("git"),
            env: BTreeMap::new(),
        }
    }

    /// Create an executor from configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            executable: PathBuf::from(&config.git.executable),
            env: config.git.env.clone(),
        }
    }

    pub fn with_executable<P: AsRef<Path>>(mut self, executable: P) -> Self {
        self.executable = executable.as_ref().to_path_buf();
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Process command output into CommandOutput struct
    fn process_output(output: Output) -> CommandOutput {
        CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        }
    }
}

impl Default for GitExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for GitExecutor {
    #[instrument(skip_all, fields(cwd = %working_dir.display(), command = %command))]
    async fn run(&self, working_dir: &Path, command: &GitCommand) -> GitResult<CommandOutput> {
        let mut cmd = Command::new(&self.executable);
        cmd.args(command.args())
            .current_dir(working_dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("spawning git");

        let output = cmd.output().await.map_err(|e| {
            warn!(error = %e, "failed to launch git");
            GitError::launch(&e)
        })?;

        let output = Self::process_output(output);
        debug!(exit_code = output.exit_code, "git exited");

        Ok(output)
    }
}
