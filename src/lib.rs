pub mod audit;
pub mod cache;
pub mod config;
pub mod error;
pub mod error_translation;
pub mod git;

// Re-export commonly used types for convenience
pub use cache::{CacheEntry, EntryState, QueryKind, QueryValue};
pub use config::Config;
pub use error::{AppError, AppResult, GitError, GitResult};
pub use error_translation::{ErrorReporter, ErrorTranslator, UserFriendlyError};
pub use git::{
    CommandOutput, CommandRunner, Dispatcher, GitCommand, GitExecutor, GitVersion, Module,
    TaskHandle, TaskId, Workspace,
};
