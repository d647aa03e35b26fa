pub mod command;
pub mod dispatch;
pub mod executor;
pub mod handle;
pub mod module;
pub mod parser;
pub mod version;
pub mod workspace;

// Re-export commonly used types
pub use command::{GitCommand, join_file_names, quote_arg, split_command_line};
pub use dispatch::Dispatcher;
pub use executor::{CommandOutput, CommandRunner, GitExecutor};
pub use handle::{TaskHandle, TaskId};
pub use module::{CommandError, Module};
pub use parser::{
    FileStatus, GitStatus, Reference, Remote, parse_branches, parse_current_branch,
    parse_remotes, parse_repo_root, parse_stash_list, parse_status_porcelain, parse_tags,
};
pub use version::GitVersion;
pub use workspace::{MergeMode, ReferencePresence, Workspace, merge_references};
