//! STOMP frames, frame builders, and inbound validation.

pub mod builder;
pub mod frame;
pub mod types;
pub mod validator;

pub use frame::{Command, Frame};
pub use types::Inbound;
