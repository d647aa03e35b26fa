use crate::cache::CacheEntry;
use crate::error::GitError;
use crate::error_translation::translator::{ErrorTranslator, UserFriendlyError};
use crate::git::handle::TaskId;
use crate::git::module::CommandError;
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};

/// A failure kept in the reporter history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedError {
    pub task: TaskId,
    pub source: String,
    pub error: GitError,
    pub friendly: UserFriendlyError,
    pub first_seen: DateTime<Utc>,
    /// Times the same failure was polled again after being shown
    pub suppressed: usize,
}

/// Surfaces each failed task once and remembers every failure
///
/// Owned by whatever renders errors and passed to the code that polls;
/// there is no global list. Repeated polls of the same failed task bump
/// its `suppressed` count instead of producing a new pop-up.
#[derive(Debug)]
pub struct ErrorReporter {
    shown: HashSet<TaskId>,
    history: VecDeque<ReportedError>,
    capacity: usize,
}

impl ErrorReporter {
    pub fn new(capacity: usize) -> Self {
        Self {
            shown: HashSet::new(),
            history: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record a failure; returns the message to show the first time only
    pub fn report(&mut self, task: TaskId, source: &str, error: &GitError) -> Option<UserFriendlyError> {
        if !self.shown.insert(task) {
            if let Some(existing) = self.history.iter_mut().find(|r| r.task == task) {
                existing.suppressed += 1;
            }
            return None;
        }

        let friendly = ErrorTranslator::translate(error);
        tracing::error!(%task, source, error = %error, "git failure");

        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(ReportedError {
            task,
            source: source.to_string(),
            error: error.clone(),
            friendly: friendly.clone(),
            first_seen: Utc::now(),
            suppressed: 0,
        });

        Some(friendly)
    }

    /// Report a Failed cache entry, if it is one
    pub fn report_entry(&mut self, source: &str, entry: &CacheEntry) -> Option<UserFriendlyError> {
        let (task, error) = entry.error()?;
        self.report(task, source, error)
    }

    pub fn report_command(&mut self, source: &str, failure: &CommandError) -> Option<UserFriendlyError> {
        let source = format!("{}: git {}", source, failure.command);
        self.report(failure.task, &source, &failure.error)
    }

    /// Failures in the order they were first seen, oldest first
    pub fn history(&self) -> impl Iterator<Item = &ReportedError> {
        self.history.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{EntryState, QueryKind};
    use crate::git::handle::TaskHandle;

    fn task() -> TaskId {
        TaskHandle::<()>::ready(Ok(())).id()
    }

    #[test]
    fn test_same_task_shown_once() {
        let mut reporter = ErrorReporter::new(10);
        let id = task();

        assert!(reporter.report(id, "repo", &GitError::NotARepository).is_some());
        assert!(reporter.report(id, "repo", &GitError::NotARepository).is_none());
        assert!(reporter.report(id, "repo", &GitError::NotARepository).is_none());

        let history: Vec<_> = reporter.history().collect();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].suppressed, 2);
    }

    #[test]
    fn test_distinct_tasks_each_shown() {
        let mut reporter = ErrorReporter::new(10);
        assert!(reporter.report(task(), "a", &GitError::TaskAborted).is_some());
        assert!(reporter.report(task(), "a", &GitError::TaskAborted).is_some());
        assert_eq!(reporter.history().count(), 2);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut reporter = ErrorReporter::new(2);
        let ids: Vec<_> = (0..3).map(|_| task()).collect();
        for id in &ids {
            reporter.report(*id, "repo", &GitError::NotARepository);
        }

        let kept: Vec<_> = reporter.history().map(|r| r.task).collect();
        assert_eq!(kept, vec![ids[1], ids[2]]);

        // Evicted from history but still never shown twice
        assert!(reporter.report(ids[0], "repo", &GitError::NotARepository).is_none());
    }

    #[test]
    fn test_report_entry() {
        let mut reporter = ErrorReporter::new(10);
        let pending = CacheEntry {
            kind: QueryKind::Status,
            state: EntryState::Pending,
            produced_at: 0,
        };
        assert!(reporter.report_entry("repo", &pending).is_none());

        let failed = CacheEntry {
            kind: QueryKind::Status,
            state: EntryState::Failed {
                error: GitError::NotARepository,
                task: task(),
            },
            produced_at: 0,
        };
        let shown = reporter.report_entry("repo", &failed).unwrap();
        assert!(shown.simple_message.contains("not a git repository"));
        assert!(reporter.report_entry("repo", &failed).is_none());
    }
}
