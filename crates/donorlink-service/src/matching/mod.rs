//! Match confirmation protocol.

pub mod gate;
pub mod lifecycle;
pub mod reconcile;
pub mod refusal;
pub mod role;
pub mod service;

pub use gate::{Authorization, ConfirmationGate};
pub use lifecycle::{ActionKind, MatchAction, ServerTransition};
pub use reconcile::{MatchBook, Merge};
pub use refusal::Refusal;
pub use role::derive_role;
pub use service::{ActionOutcome, MatchService};
