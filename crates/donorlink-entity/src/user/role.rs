//! User role enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Roles a user can be registered under.
///
/// A single account may hold both `Donor` and `Recipient`; which one applies
/// to a given match is decided per match, not per account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Registered to offer donations.
    Donor,
    /// Registered to file receive-requests.
    Recipient,
    /// Back-office administrator.
    Admin,
    /// Hospital / blood-bank staff account.
    Hospital,
    /// Any role this client does not know about.
    #[serde(other)]
    Other,
}

impl UserRole {
    /// Return the role as the backend spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Donor => "DONOR",
            Self::Recipient => "RECIPIENT",
            Self::Admin => "ADMIN",
            Self::Hospital => "HOSPITAL",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = donorlink_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DONOR" => Ok(Self::Donor),
            "RECIPIENT" => Ok(Self::Recipient),
            "ADMIN" => Ok(Self::Admin),
            "HOSPITAL" => Ok(Self::Hospital),
            _ => Err(donorlink_core::AppError::validation(format!(
                "Invalid user role: '{s}'. Expected one of: donor, recipient, admin, hospital"
            ))),
        }
    }
}
