//! Local notification state and its synchronization with the backend.

pub mod store;
pub mod sync;

pub use store::NotificationStore;
pub use sync::NotificationSync;
