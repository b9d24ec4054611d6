//! readapt-core: the adaptive reading-difficulty control loop.
//!
//! This crate tracks a learner's running comprehension performance, maps it
//! onto a discrete simplification level, and decides per chunk whether and
//! how strongly to rewrite text. External services (chunker, rater, grader,
//! rewriter, question generator) are reached through the traits in
//! [`traits`].

pub mod controller;
pub mod elo;
pub mod error;
pub mod level;
pub mod model;
pub mod parse;
pub mod performance;
pub mod policy;
pub mod replay;
pub mod selector;
pub mod session;
pub mod traits;

pub use controller::{AdaptedChunk, AdaptiveController, ControllerSnapshot, Delivery};
pub use error::CoreError;
pub use level::{LevelScale, SimplificationLevel};
pub use model::{Chunk, DifficultyScore, Rating};
pub use performance::PerformanceState;
pub use policy::{DecisionState, PolicyConfig, PolicyKind, SimplificationPolicy};
pub use session::{Collaborators, ReadingSession};
