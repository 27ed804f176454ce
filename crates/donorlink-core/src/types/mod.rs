//! Core type definitions used across the DonorLink workspace.

pub mod id;

pub use id::*;
