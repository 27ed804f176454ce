//! # donorlink-service
//!
//! The match confirmation protocol. Pure pieces (lifecycle engine, gate,
//! local match book) are synchronous and take `now` explicitly; the
//! [`MatchService`] orchestrates them around calls to an injected
//! [`MatchGateway`].
//!
//! Gateway contracts live here rather than in the HTTP crate so that every
//! consumer (realtime sync, CLI, tests) depends only on the trait.

pub mod gateway;
pub mod matching;

pub use gateway::{MatchFilter, MatchGateway, NotificationGateway};
pub use matching::{
    ActionKind, ActionOutcome, Authorization, ConfirmationGate, MatchAction, MatchBook,
    MatchService, Refusal, ServerTransition, derive_role,
};
