//! Convenience result type alias for DonorLink.

use crate::error::AppError;

/// A specialized `Result` type for DonorLink operations.
pub type AppResult<T> = Result<T, AppError>;
