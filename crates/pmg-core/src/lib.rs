//! Command parsing (C1), trust filtering (C4), and guard-mode orchestration (C6) for
//! PMG.

pub mod engine;
pub mod parser;
pub mod trust;
pub mod ui;

pub use engine::{GuardEngine, RunOutcome};
pub use parser::{parse_command, PackageManager};
pub use ui::{NullInteraction, UserInteraction};
