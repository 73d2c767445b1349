//! Context compilation: select → budget → format.

pub mod budget;
pub mod compiler;
pub mod format;
pub mod select;
pub mod token;

pub use budget::{BudgetPolicy, BudgetResult, apply_budget};
pub use compiler::{CompileDebug, CompileOptions, CompileResult, Compiler};
pub use format::{FormatInput, format_messages};
pub use select::{EvidenceItem, EvidenceWindows, SelectionPolicy, rank_evidence, select_evidence};
