//! Session lifecycle management: login, logout, and persistence.

pub mod persist;
pub mod store;

pub use persist::SessionFile;
pub use store::SessionStore;
