pub mod logger;

pub use logger::{AuditLogger, AuditRecord, Outcome, RotationPolicy};
