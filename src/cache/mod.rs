pub mod entry;
pub mod registry;

pub use entry::{CacheEntry, EntryState, QueryKind, QueryValue, ResultCache};
pub use registry::TaskRegistry;
