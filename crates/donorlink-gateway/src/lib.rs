//! # donorlink-gateway
//!
//! REST client for the DonorLink backend. [`HttpGateway`] implements both
//! [`MatchGateway`](donorlink_service::MatchGateway) and
//! [`NotificationGateway`](donorlink_service::NotificationGateway); every
//! request carries the session's bearer credential and user id, and every
//! non-success response is mapped onto a tagged [`AppError`](donorlink_core::AppError).

pub mod client;
pub mod error;
pub mod matching;
pub mod notification;

pub use client::HttpGateway;
pub use error::{Resource, http_error, status_error};
