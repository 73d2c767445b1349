//! The mnemo runtime — compiles bounded model context from session memory.
//!
//! One turn flows strictly one way:
//!
//! ```text
//! store ──► select ──► budget ──► format ──► messages
//!   ▲                                           │
//!   └──────────── observe ◄── model reply ◄─────┘
//! ```
//!
//! [`compile`] is read-only with respect to the store; [`observe`] is the
//! only operation that rewrites session state. Ingestion helpers in
//! [`ingest`] feed events and artifacts in; [`session`] wraps it all behind
//! a per-session handle, and [`turn`] runs one chat turn with an injected
//! model client.

pub mod compile;
pub mod ingest;
pub mod observe;
pub mod session;
pub mod turn;

pub use compile::{
    BudgetPolicy, BudgetResult, CompileDebug, CompileOptions, CompileResult, Compiler,
    EvidenceItem, EvidenceWindows, SelectionPolicy,
};
pub use ingest::{IngestOutcome, SnippetRequest};
pub use observe::observe;
pub use session::{Runtime, Session};
pub use turn::{TurnOptions, TurnOutcome, run_turn};
