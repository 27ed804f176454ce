//! # donorlink-auth
//!
//! Session lifecycle for the DonorLink client.
//!
//! ## Modules
//!
//! - `session`: the login/logout broadcast ([`SessionStore`]) that every
//!   session-bound component listens to, and on-disk persistence of the
//!   active session for the command-line client

pub mod session;

pub use session::{SessionFile, SessionStore};
