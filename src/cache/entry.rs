use crate::error::GitError;
use crate::git::handle::TaskId;
use crate::git::parser::{GitStatus, Reference, Remote};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// The queries a module memoizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Status,
    References,
    Remotes,
    CurrentBranch,
    RepoRoot,
}

impl QueryKind {
    pub const ALL: [QueryKind; 5] = [
        QueryKind::Status,
        QueryKind::References,
        QueryKind::Remotes,
        QueryKind::CurrentBranch,
        QueryKind::RepoRoot,
    ];

    /// Whether a mutating command can change this query's answer
    pub fn depends_on_repo_state(self) -> bool {
        !matches!(self, QueryKind::RepoRoot)
    }
}

/// Parsed payload of a finished query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    Status(Arc<GitStatus>),
    References(Arc<Vec<Reference>>),
    Remotes(Arc<Vec<Remote>>),
    CurrentBranch(Option<String>),
    RepoRoot(PathBuf),
}

impl QueryValue {
    pub fn kind(&self) -> QueryKind {
        match self {
            QueryValue::Status(_) => QueryKind::Status,
            QueryValue::References(_) => QueryKind::References,
            QueryValue::Remotes(_) => QueryKind::Remotes,
            QueryValue::CurrentBranch(_) => QueryKind::CurrentBranch,
            QueryValue::RepoRoot(_) => QueryKind::RepoRoot,
        }
    }
}

/// Lifecycle state of a cache entry
///
/// `Absent` is represented by the lack of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    Ready(QueryValue),
    Failed { error: GitError, task: TaskId },
}

/// Memoized result of one query against one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub kind: QueryKind,
    pub state: EntryState,
    pub produced_at: u64,
}

impl CacheEntry {
    pub fn is_pending(&self) -> bool {
        matches!(self.state, EntryState::Pending)
    }

    /// The value, if the query finished successfully
    pub fn value(&self) -> Option<&QueryValue> {
        match &self.state {
            EntryState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<(TaskId, &GitError)> {
        match &self.state {
            EntryState::Failed { error, task } => Some((*task, error)),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<&Arc<GitStatus>> {
        match self.value() {
            Some(QueryValue::Status(status)) => Some(status),
            _ => None,
        }
    }

    pub fn references(&self) -> Option<&Arc<Vec<Reference>>> {
        match self.value() {
            Some(QueryValue::References(refs)) => Some(refs),
            _ => None,
        }
    }

    pub fn remotes(&self) -> Option<&Arc<Vec<Remote>>> {
        match self.value() {
            Some(QueryValue::Remotes(remotes)) => Some(remotes),
            _ => None,
        }
    }

    /// `Some(None)` means the query finished and HEAD is detached
    pub fn current_branch(&self) -> Option<Option<&str>> {
        match self.value() {
            Some(QueryValue::CurrentBranch(branch)) => Some(branch.as_deref()),
            _ => None,
        }
    }

    pub fn repo_root(&self) -> Option<&PathBuf> {
        match self.value() {
            Some(QueryValue::RepoRoot(root)) => Some(root),
            _ => None,
        }
    }
}

/// Per-module memo table
///
/// Transitions: absent -> pending -> ready | failed, and ready | failed ->
/// absent when the invalidation token moves past the entry.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: HashMap<QueryKind, CacheEntry>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: QueryKind) -> Option<&CacheEntry> {
        self.entries.get(&kind)
    }

    /// Record that a query was dispatched at `token`
    ///
    /// Has no effect when an entry already exists.
    pub fn mark_pending(&mut self, kind: QueryKind, token: u64) -> &CacheEntry {
        self.entries.entry(kind).or_insert(CacheEntry {
            kind,
            state: EntryState::Pending,
            produced_at: token,
        })
    }

    /// Settle a pending entry; settled or absent entries are left alone
    pub fn complete(&mut self, kind: QueryKind, state: EntryState) -> bool {
        match self.entries.get_mut(&kind) {
            Some(entry) if entry.is_pending() && !matches!(state, EntryState::Pending) => {
                entry.state = state;
                true
            }
            _ => false,
        }
    }

    /// Evict settled, repo-dependent entries produced before `token`
    ///
    /// Returns the evicted kinds.
    pub fn evict_stale(&mut self, token: u64) -> Vec<QueryKind> {
        let stale: Vec<QueryKind> = self
            .entries
            .values()
            .filter(|e| !e.is_pending() && e.kind.depends_on_repo_state() && e.produced_at < token)
            .map(|e| e.kind)
            .collect();
        for kind in &stale {
            self.entries.remove(kind);
        }
        stale
    }

    /// Evict one settled entry regardless of its token
    pub fn evict(&mut self, kind: QueryKind) -> bool {
        match self.entries.get(&kind) {
            Some(entry) if !entry.is_pending() => self.entries.remove(&kind).is_some(),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
