use crate::audit::{AuditRecord, Outcome};
use crate::cache::{CacheEntry, EntryState, QueryKind, QueryValue, ResultCache, TaskRegistry};
use crate::error::{GitError, GitResult};
use crate::git::command::GitCommand;
use crate::git::dispatch::Dispatcher;
use crate::git::executor::CommandOutput;
use crate::git::handle::{TaskHandle, TaskId};
use crate::git::parser::Reference;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SHORT_NAME_LIMIT: usize = 20;

/// A failed command waiting to be shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandError {
    pub task: TaskId,
    pub command: String,
    pub error: GitError,
}

#[derive(Debug)]
struct TrackedCommand {
    command: GitCommand,
    mutating: bool,
    handle: TaskHandle<CommandOutput>,
}

/// One git working tree and everything cached about it
///
/// Owned by the UI thread. Queries never block: they return whatever is
/// cached and dispatch work in the background when nothing is. Finished
/// background work is folded in at the start of the next call.
#[derive(Debug)]
pub struct Module {
    path: PathBuf,
    name: String,
    dispatcher: Dispatcher,
    cache: ResultCache,
    queries: TaskRegistry<QueryKind, QueryValue>,
    commands: Vec<TrackedCommand>,
    token: u64,
    errors: Vec<CommandError>,
}

impl Module {
    /// Create a Module for a known working tree
    ///
    /// Relative paths are made absolute against the current directory so
    /// that a module's path identifies it.
    pub fn new<P: AsRef<Path>>(path: P, dispatcher: Dispatcher) -> Self {
        let path = path.as_ref();
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Self {
            path,
            name,
            dispatcher,
            cache: ResultCache::new(),
            queries: TaskRegistry::new(),
            commands: Vec::new(),
            token: 0,
            errors: Vec::new(),
        }
    }

    /// Find the working tree containing `start_path`
    ///
    /// `.git` may be a directory or, for submodules and worktrees, a file.
    pub fn discover_from<P: AsRef<Path>>(start_path: P, dispatcher: Dispatcher) -> GitResult<Self> {
        let mut current = start_path.as_ref().canonicalize().map_err(|e| {
            debug!(path = %start_path.as_ref().display(), error = %e, "cannot resolve start path");
            GitError::NotARepository
        })?;

        loop {
            if current.join(".git").exists() {
                return Ok(Self::new(current, dispatcher));
            }

            if !current.pop() {
                return Err(GitError::NotARepository);
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name abbreviated for tabs: first character, `..`, last 17 characters
    pub fn short_name(&self) -> String {
        let chars: Vec<char> = self.name.chars().collect();
        if chars.len() <= SHORT_NAME_LIMIT {
            return self.name.clone();
        }
        let tail: String = chars[chars.len() - (SHORT_NAME_LIMIT - 3)..].iter().collect();
        format!("{}..{}", chars[0], tail)
    }

    /// Current invalidation token
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Cached state of `kind`, dispatching the query when absent
    pub fn get(&mut self, kind: QueryKind) -> CacheEntry {
        self.settle();

        if let Some(entry) = self.cache.get(kind) {
            return entry.clone();
        }

        let dispatcher = &self.dispatcher;
        let path = &self.path;
        let handle = self
            .queries
            .dedupe(kind, || dispatcher.query(path, kind));
        debug!(module = %self.name, ?kind, task = %handle.id(), token = self.token, "query dispatched");

        self.cache.mark_pending(kind, self.token).clone()
    }

    pub fn status(&mut self) -> CacheEntry {
        self.get(QueryKind::Status)
    }

    pub fn references(&mut self) -> CacheEntry {
        self.get(QueryKind::References)
    }

    pub fn remotes(&mut self) -> CacheEntry {
        self.get(QueryKind::Remotes)
    }

    pub fn current_branch(&mut self) -> CacheEntry {
        self.get(QueryKind::CurrentBranch)
    }

    pub fn repo_root_path(&mut self) -> CacheEntry {
        self.get(QueryKind::RepoRoot)
    }

    /// Cached state of `kind` without settling or dispatching
    pub fn peek(&self, kind: QueryKind) -> Option<&CacheEntry> {
        self.cache.get(kind)
    }

    /// Drop a settled entry so the next read queries again
    pub fn refresh(&mut self, kind: QueryKind) -> bool {
        self.settle();
        self.cache.evict(kind)
    }

    /// Run an argument string, invalidating the cache on completion when
    /// its subcommand mutates the repository
    pub fn run(&mut self, args: &str) -> TaskHandle<CommandOutput> {
        match GitCommand::parse(args) {
            Ok(command) => {
                let mutating = command.is_mutating();
                self.run_command(command, mutating)
            }
            Err(e) => self.reject(args, e),
        }
    }

    /// Run an argument string that always invalidates the cache on completion
    pub fn run_mutating(&mut self, args: &str) -> TaskHandle<CommandOutput> {
        match GitCommand::parse(args) {
            Ok(command) => self.run_command(command, true),
            Err(e) => self.reject(args, e),
        }
    }

    /// Run a pre-tokenized command
    pub fn run_command(&mut self, command: GitCommand, mutating: bool) -> TaskHandle<CommandOutput> {
        self.settle();

        let handle = self.dispatcher.run(&self.path, command.clone());
        info!(module = %self.name, %command, mutating, task = %handle.id(), "command dispatched");

        self.commands.push(TrackedCommand {
            command,
            mutating,
            handle: handle.clone(),
        });
        handle
    }

    fn reject(&mut self, args: &str, error: GitError) -> TaskHandle<CommandOutput> {
        warn!(module = %self.name, args, error = %error, "command rejected");
        let handle = TaskHandle::ready(Err(error.clone()));
        self.errors.push(CommandError {
            task: handle.id(),
            command: args.to_string(),
            error,
        });
        handle
    }

    /// Drain failures of commands run through this module
    ///
    /// Each failure is returned exactly once.
    pub fn take_errors(&mut self) -> Vec<CommandError> {
        self.settle();
        std::mem::take(&mut self.errors)
    }

    /// True while any query or command is still running
    pub fn is_busy(&self) -> bool {
        self.queries.handles().iter().any(|h| !h.is_completed())
            || self.commands.iter().any(|c| !c.handle.is_completed())
    }

    /// Future resolving once everything in flight right now has finished
    ///
    /// Results are folded into the cache on the next call that settles.
    pub fn idle(&self) -> impl Future<Output = ()> + Send + 'static {
        let queries = self.queries.handles();
        let commands: Vec<_> = self.commands.iter().map(|c| c.handle.clone()).collect();
        async move {
            for handle in queries {
                let _ = handle.wait().await;
            }
            for handle in commands {
                let _ = handle.wait().await;
            }
        }
    }

    /// Fold finished work into the cache
    ///
    /// Completed mutating commands advance the token first, so a query
    /// that finished alongside them is evicted in the same pass instead of
    /// being served stale.
    fn settle(&mut self) {
        let mut still_running = Vec::with_capacity(self.commands.len());
        for tracked in std::mem::take(&mut self.commands) {
            let Some(result) = tracked.handle.poll() else {
                still_running.push(tracked);
                continue;
            };
            let task = tracked.handle.id();
            let outcome = match &result {
                Ok(output) => Outcome::Exited(output.exit_code),
                Err(_) => Outcome::NotStarted,
            };
            self.audit(task, &tracked, outcome);

            match result {
                Ok(output) => {
                    if tracked.mutating {
                        self.token += 1;
                        debug!(module = %self.name, %task, token = self.token, "cache invalidated");
                    }
                    if let Err(error) = output.into_result(&tracked.command) {
                        warn!(module = %self.name, %task, error = %error, "command failed");
                        self.errors.push(CommandError {
                            task,
                            command: tracked.command.to_command_line(),
                            error,
                        });
                    }
                }
                Err(error) => {
                    warn!(module = %self.name, %task, error = %error, "command could not run");
                    self.errors.push(CommandError {
                        task,
                        command: tracked.command.to_command_line(),
                        error,
                    });
                }
            }
        }
        self.commands = still_running;

        for (kind, handle) in self.queries.take_completed() {
            let state = match handle.poll() {
                Some(Ok(value)) => EntryState::Ready(value),
                Some(Err(error)) => EntryState::Failed {
                    error,
                    task: handle.id(),
                },
                None => continue,
            };
            self.cache.complete(kind, state);
        }

        let evicted = self.cache.evict_stale(self.token);
        if !evicted.is_empty() {
            debug!(module = %self.name, ?evicted, "stale entries evicted");
        }
    }

    fn audit(&self, task: TaskId, tracked: &TrackedCommand, outcome: Outcome) {
        let Some(logger) = self.dispatcher.audit() else {
            return;
        };
        let record = AuditRecord::new(
            &self.name,
            &self.path,
            task,
            &tracked.command.to_command_line(),
            tracked.mutating,
            outcome,
        );
        if let Err(e) = logger.record(&record) {
            warn!(module = %self.name, path = %logger.log_path().display(), error = %e, "failed to write audit log");
        }
    }

    pub fn commit(&mut self, message: &str) -> TaskHandle<CommandOutput> {
        self.run_command(GitCommand::from_args(["commit", "-m", message]), true)
    }

    /// `add -f -- files`
    pub fn stage<S: AsRef<str>>(&mut self, files: &[S]) -> TaskHandle<CommandOutput> {
        self.run_command(with_paths(["add", "-f", "--"], files), true)
    }

    /// `reset -q -- files`
    pub fn unstage<S: AsRef<str>>(&mut self, files: &[S]) -> TaskHandle<CommandOutput> {
        self.run_command(with_paths(["reset", "-q", "--"], files), true)
    }

    /// Restore files from the index, dropping worktree changes
    pub fn discard<S: AsRef<str>>(&mut self, files: &[S]) -> TaskHandle<CommandOutput> {
        self.run_command(with_paths(["checkout", "--"], files), true)
    }

    pub fn stash_files<S: AsRef<str>>(&mut self, message: &str, files: &[S]) -> TaskHandle<CommandOutput> {
        self.run_command(with_paths(["stash", "push", "-m", message, "--"], files), true)
    }

    pub fn checkout(&mut self, target: &str) -> TaskHandle<CommandOutput> {
        self.run_command(GitCommand::from_args(["checkout", target]), true)
    }

    pub fn create_branch(&mut self, name: &str, checkout: bool) -> TaskHandle<CommandOutput> {
        let command = if checkout {
            GitCommand::from_args(["checkout", "-b", name])
        } else {
            GitCommand::from_args(["branch", name])
        };
        self.run_command(command, true)
    }

    pub fn merge(&mut self, reference: &Reference) -> TaskHandle<CommandOutput> {
        self.run_command(GitCommand::from_args(["merge", reference.qualified_name()]), true)
    }

    pub fn rebase(&mut self, reference: &Reference) -> TaskHandle<CommandOutput> {
        self.run_command(GitCommand::from_args(["rebase", reference.qualified_name()]), true)
    }

    /// Check out, switch to, or apply the reference depending on its kind
    pub fn checkout_reference(&mut self, reference: &Reference) -> TaskHandle<CommandOutput> {
        let command = match reference {
            Reference::LocalBranch { name, .. } => GitCommand::from_args(["checkout", name.as_str()]),
            Reference::RemoteBranch { name, .. } => GitCommand::from_args(["switch", name.as_str()]),
            Reference::Tag { qualified_name, .. } => {
                GitCommand::from_args(["checkout", qualified_name.as_str()])
            }
            Reference::Stash { qualified_name, .. } => {
                GitCommand::from_args(["stash", "apply", qualified_name.as_str()])
            }
        };
        self.run_command(command, true)
    }

    /// Delete the reference: local branch, branch on its remote, tag or stash
    pub fn delete_reference(&mut self, reference: &Reference) -> TaskHandle<CommandOutput> {
        let command = match reference {
            Reference::LocalBranch { name, .. } => GitCommand::from_args(["branch", "-d", name.as_str()]),
            Reference::RemoteBranch {
                name, remote_alias, ..
            } => GitCommand::from_args(["push", "-d", remote_alias.as_str(), name.as_str()]),
            Reference::Tag { name, .. } => GitCommand::from_args(["tag", "-d", name.as_str()]),
            Reference::Stash { qualified_name, .. } => {
                GitCommand::from_args(["stash", "drop", qualified_name.as_str()])
            }
        };
        self.run_command(command, true)
    }

    pub fn add_remote(&mut self, alias: &str, url: &str) -> TaskHandle<CommandOutput> {
        self.run_command(GitCommand::from_args(["remote", "add", alias, url]), true)
    }

    pub fn remove_remote(&mut self, alias: &str) -> TaskHandle<CommandOutput> {
        self.run_command(GitCommand::from_args(["remote", "remove", alias]), true)
    }

    pub fn set_remote_url(&mut self, alias: &str, url: &str) -> TaskHandle<CommandOutput> {
        self.run_command(GitCommand::from_args(["remote", "set-url", alias, url]), true)
    }
}

fn with_paths<const N: usize, S: AsRef<str>>(prefix: [&str; N], files: &[S]) -> GitCommand {
    GitCommand::from_args(
        prefix
            .iter()
            .map(|a| a.to_string())
            .chain(files.iter().map(|f| f.as_ref().to_string())),
    )
}
