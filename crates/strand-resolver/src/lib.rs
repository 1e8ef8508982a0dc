//! strand-resolver
//!
//! The per-DID state machine: folds the ordered stream of anchored
//! operations for one suffix into a `DidState`, enforcing the commit/reveal
//! discipline and signature chain, and projects the result into an external
//! DID document.

pub mod apply;
pub mod projection;
pub mod resolver;
pub mod state;

pub use projection::{project, ResolutionResult};
pub use resolver::Resolver;
pub use state::{DidState, DocumentState};
