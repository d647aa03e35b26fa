use crate::error::{AppError, GitError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFriendlyError {
    pub simple_message: String,
    pub suggestion: Option<String>,
    pub raw_error: String,
}

#[derive(Debug)]
pub struct ErrorTranslator;

impl ErrorTranslator {
    /// Translate an AppError into a user-friendly error message
    pub fn translate_app_error(error: &AppError) -> UserFriendlyError {
        match error {
            AppError::Git(git_err) => Self::translate(git_err),
            AppError::Config(config_err) => UserFriendlyError {
                simple_message: "Configuration error occurred.".to_string(),
                suggestion: Some("Check your config file at ~/.config/mrgit/config.toml".to_string()),
                raw_error: config_err.to_string(),
            },
            AppError::Io(io_err) => UserFriendlyError {
                simple_message: "I/O error occurred.".to_string(),
                suggestion: Some("Check file permissions and disk space".to_string()),
                raw_error: io_err.to_string(),
            },
            AppError::Json(json_err) => UserFriendlyError {
                simple_message: "Failed to encode output.".to_string(),
                suggestion: None,
                raw_error: json_err.to_string(),
            },
        }
    }

    /// Translate a GitError into a user-friendly error message
    pub fn translate(error: &GitError) -> UserFriendlyError {
        let raw_error = error.to_string();

        let (simple_message, suggestion) = match error {
            GitError::Launch { .. } => (
                "Git could not be started.".to_string(),
                Some("Install git or set git.executable in ~/.config/mrgit/config.toml".to_string()),
            ),
            GitError::Tokenize(_) => (
                "The command line could not be split into arguments.".to_string(),
                Some("Check that every quote is closed.".to_string()),
            ),
            GitError::TaskAborted => (
                "The git task stopped before it finished.".to_string(),
                None,
            ),
            _ => Self::match_error_patterns(&raw_error),
        };

        UserFriendlyError {
            simple_message,
            suggestion,
            raw_error,
        }
    }

    /// Match common git error patterns and provide user-friendly messages
    fn match_error_patterns(error_text: &str) -> (String, Option<String>) {
        let lower = error_text.to_lowercase();

        // No upstream branch
        if lower.contains("no upstream") || lower.contains("does not have an upstream") {
            return (
                "No remote branch is configured for tracking.".to_string(),
                Some("Try: git push -u origin <branch-name>".to_string()),
            );
        }

        // Merge conflicts
        if lower.contains("merge conflict") || lower.contains("conflict") {
            return (
                "Merge has conflicts that need to be resolved.".to_string(),
                Some("Fix conflicts in the listed files, then git add and git commit.".to_string()),
            );
        }

        // Detached HEAD
        if lower.contains("detached head") {
            return (
                "Not currently on any branch (detached HEAD state).".to_string(),
                Some("Create a new branch: git checkout -b <branch-name>".to_string()),
            );
        }

        // Nothing to commit
        if lower.contains("nothing to commit") || lower.contains("working tree clean") {
            return (
                "No changes to commit - working directory is clean.".to_string(),
                None,
            );
        }

        // Pathspec did not match
        if lower.contains("pathspec") && lower.contains("did not match") {
            return (
                "File path not found in the repository.".to_string(),
                Some("Check the file path and try again. Use 'git status' to see available files.".to_string()),
            );
        }

        // Branch already exists
        if lower.contains("already exists") && (lower.contains("branch") || lower.contains("ref")) {
            return (
                "A branch with that name already exists.".to_string(),
                Some("Use a different name or delete the existing branch first.".to_string()),
            );
        }

        // Not a git repository
        if lower.contains("not a git repository") {
            return (
                "Current directory is not a git repository.".to_string(),
                Some("Initialize with: git init".to_string()),
            );
        }

        // Remote not found
        if lower.contains("remote") && (lower.contains("not found") || lower.contains("does not appear")) {
            return (
                "Remote repository not found.".to_string(),
                Some("Check the remote URL with: git remote -v".to_string()),
            );
        }

        // Authentication failed
        if lower.contains("authentication failed") || lower.contains("permission denied") {
            return (
                "Authentication failed - check your credentials.".to_string(),
                Some("Verify your SSH keys or personal access token.".to_string()),
            );
        }

        // Uncommitted changes
        if lower.contains("uncommitted changes") || lower.contains("would be overwritten") {
            return (
                "Operation would overwrite uncommitted changes.".to_string(),
                Some("Commit or stash your changes first: git stash".to_string()),
            );
        }

        // Divergent branches
        if lower.contains("diverged") || (lower.contains("rejected") && lower.contains("non-fast-forward")) {
            return (
                "Local and remote branches have diverged.".to_string(),
                Some("Pull changes first: git pull, or force push: git push --force (dangerous!)".to_string()),
            );
        }

        // Untracked files would be overwritten
        if lower.contains("untracked working tree files would be overwritten") {
            return (
                "Untracked files would be overwritten by this operation.".to_string(),
                Some("Move or remove the conflicting files, or commit them first.".to_string()),
            );
        }

        // Rebase in progress
        if lower.contains("rebase in progress") {
            return (
                "A rebase operation is currently in progress.".to_string(),
                Some("Continue with: git rebase --continue, or abort: git rebase --abort".to_string()),
            );
        }

        // Merge in progress
        if lower.contains("merge in progress") {
            return (
                "A merge operation is currently in progress.".to_string(),
                Some("Complete the merge and commit, or abort: git merge --abort".to_string()),
            );
        }

        // No changes staged
        if lower.contains("no changes added to commit") {
            return (
                "No files staged for commit.".to_string(),
                Some("Stage files with: git add <file>".to_string()),
            );
        }

        // Default: return the error as-is with no suggestion
        (error_text.to_string(), None)
    }
}
