pub mod reporter;
pub mod translator;

pub use reporter::{ErrorReporter, ReportedError};
pub use translator::{ErrorTranslator, UserFriendlyError};
