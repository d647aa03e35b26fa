use crate::audit::AuditLogger;
use crate::cache::{QueryKind, QueryValue};
use crate::error::GitResult;
use crate::git::command::GitCommand;
use crate::git::executor::{CommandOutput, CommandRunner};
use crate::git::handle::TaskHandle;
use crate::git::parser;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Spawns runner work onto a tokio runtime and hands back task handles
///
/// The caller never waits: every method returns immediately.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    runner: Arc<dyn CommandRunner>,
    runtime: Handle,
    audit: Option<Arc<AuditLogger>>,
}

impl Dispatcher {
    pub fn new(runner: Arc<dyn CommandRunner>, runtime: Handle) -> Self {
        Self {
            runner,
            runtime,
            audit: None,
        }
    }

    /// Record commands of every module sharing this dispatcher
    pub fn with_audit(mut self, logger: AuditLogger) -> Self {
        self.audit = Some(Arc::new(logger));
        self
    }

    pub fn audit(&self) -> Option<&AuditLogger> {
        self.audit.as_deref()
    }

    /// Run one command in `working_dir`
    pub fn run(&self, working_dir: &Path, command: GitCommand) -> TaskHandle<CommandOutput> {
        let runner = Arc::clone(&self.runner);
        let working_dir = working_dir.to_path_buf();
        TaskHandle::spawn(&self.runtime, async move {
            runner.run(&working_dir, &command).await
        })
    }

    /// Run the commands behind `kind` and parse their output
    pub fn query(&self, working_dir: &Path, kind: QueryKind) -> TaskHandle<QueryValue> {
        let runner = Arc::clone(&self.runner);
        let working_dir = working_dir.to_path_buf();
        TaskHandle::spawn(&self.runtime, async move {
            let result = run_query(runner.as_ref(), &working_dir, kind).await;
            match &result {
                Ok(_) => debug!(?kind, cwd = %working_dir.display(), "query finished"),
                Err(e) => warn!(?kind, cwd = %working_dir.display(), error = %e, "query failed"),
            }
            result
        })
    }
}

async fn run_checked(
    runner: &dyn CommandRunner,
    working_dir: &Path,
    args: &[&str],
) -> GitResult<String> {
    let command = GitCommand::from_args(args.iter().copied());
    let output = runner.run(working_dir, &command).await?;
    Ok(output.into_result(&command)?.stdout)
}

async fn run_query(
    runner: &dyn CommandRunner,
    working_dir: &Path,
    kind: QueryKind,
) -> GitResult<QueryValue> {
    let value = match kind {
        QueryKind::Status => {
            let out = run_checked(runner, working_dir, &["status", "--porcelain=v1"]).await?;
            QueryValue::Status(Arc::new(parser::parse_status_porcelain(&out)))
        }
        QueryKind::References => {
            let branches =
                run_checked(runner, working_dir, &["branch", "-a", "--no-color"]).await?;
            let tags = run_checked(runner, working_dir, &["tag"]).await?;
            let stashes = run_checked(runner, working_dir, &["stash", "list"]).await?;

            let mut references = parser::parse_branches(&branches);
            references.extend(parser::parse_tags(&tags));
            references.extend(parser::parse_stash_list(&stashes));
            QueryValue::References(Arc::new(references))
        }
        QueryKind::Remotes => {
            let out = run_checked(runner, working_dir, &["remote", "-v"]).await?;
            QueryValue::Remotes(Arc::new(parser::parse_remotes(&out)))
        }
        QueryKind::CurrentBranch => {
            let out = run_checked(runner, working_dir, &["branch", "--show-current"]).await?;
            QueryValue::CurrentBranch(parser::parse_current_branch(&out))
        }
        QueryKind::RepoRoot => {
            let out = run_checked(runner, working_dir, &["rev-parse", "--show-toplevel"]).await?;
            // Unparseable output falls back to the working directory
            let root = parser::parse_repo_root(&out).unwrap_or_else(|| working_dir.to_path_buf());
            QueryValue::RepoRoot(root)
        }
    };
    Ok(value)
}
