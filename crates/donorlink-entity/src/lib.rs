//! # donorlink-entity
//!
//! Domain models for the DonorLink client. Every struct in this crate is
//! either a server DTO (`MatchResult`, `NotificationRecord`) or a client-side
//! value object (`Session`). All derive `Debug`, `Clone`, `Serialize`, and
//! `Deserialize`; wire names are camelCase to match the backend.

pub mod matching;
pub mod notification;
pub mod session;
pub mod timestamp;
pub mod user;
