//! # mnemo Core
//!
//! Domain types, traits, and error definitions for the mnemo context runtime.
//! This crate has **zero framework dependencies**: it defines the session
//! model (events, artifacts, distilled state) and the two seams every other
//! crate implements against.
//!
//! ## Seams
//!
//! - [`Store`] is the persistent event/artifact/session store. Implementations
//!   live in `mnemo-store`.
//! - [`ModelClient`] is the language-model capability ("accepts an ordered
//!   message sequence, returns text"). Implementations live in `mnemo-providers`.

pub mod error;
pub mod message;
pub mod event;
pub mod artifact;
pub mod state;
pub mod store;
pub mod model;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ModelError, Result, StoreError, StoreResultExt};
pub use message::{Message, Role};
pub use event::{EventType, StoredEvent};
pub use artifact::{Artifact, ArtifactKind, NewArtifact};
pub use state::{Decision, GlossaryEntry, OpenThread, SessionState, StateDelta, WorkingSet};
pub use store::{SessionRecord, Store};
pub use model::ModelClient;
