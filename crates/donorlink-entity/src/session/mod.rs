//! Session value object.

pub mod model;

pub use model::{Credential, Session};
