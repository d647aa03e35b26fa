#![allow(dead_code)]

use mrgit::cache::{CacheEntry, QueryKind};
use mrgit::git::{CommandRunner, Dispatcher, GitExecutor, Module};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::runtime::Handle;

/// Run git synchronously in `repo_path`, panicking on failure
pub fn git(repo_path: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Helper to create a test git repository on branch `main`
pub fn create_test_repo() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let repo_path = temp_dir.path().to_path_buf();

    git(&repo_path, &["init", "-q"]);
    git(&repo_path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(&repo_path, &["config", "user.name", "Test User"]);
    git(&repo_path, &["config", "user.email", "test@example.com"]);
    git(&repo_path, &["config", "commit.gpgsign", "false"]);

    (temp_dir, repo_path)
}

/// Helper to create a commit
pub fn create_commit(repo_path: &Path, file: &str, content: &str, message: &str) {
    fs::write(repo_path.join(file), content).expect("Failed to write file");
    git(repo_path, &["add", file]);
    git(repo_path, &["commit", "-q", "-m", message]);
}

/// `path` spelled relative to the current directory, walking up with `..`
pub fn relative_to_cwd(path: &Path) -> PathBuf {
    let cwd = std::env::current_dir().unwrap().canonicalize().unwrap();
    let target = path.canonicalize().unwrap();

    let mut relative = PathBuf::new();
    for _ in cwd.components().skip(1) {
        relative.push("..");
    }
    relative.push(target.strip_prefix("/").unwrap());
    relative
}

/// Dispatcher running real git on the current runtime
pub fn real_dispatcher() -> Dispatcher {
    Dispatcher::new(Arc::new(GitExecutor::new()), Handle::current())
}

pub fn dispatcher_for(runner: Arc<dyn CommandRunner>) -> Dispatcher {
    Dispatcher::new(runner, Handle::current())
}

/// Poll `kind` until the entry is no longer pending
pub async fn settled(module: &mut Module, kind: QueryKind) -> CacheEntry {
    loop {
        let entry = module.get(kind);
        if !entry.is_pending() {
            return entry;
        }
        module.idle().await;
    }
}
