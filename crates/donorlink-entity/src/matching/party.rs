//! The two sides of a match.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One side of a donor/recipient match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Party {
    /// The party offering the donation.
    Donor,
    /// The party that filed the receive-request.
    Recipient,
}

impl Party {
    /// The opposite party.
    pub fn other(&self) -> Self {
        match self {
            Self::Donor => Self::Recipient,
            Self::Recipient => Self::Donor,
        }
    }

    /// Path segment used by the matching endpoints.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::Donor => "donor",
            Self::Recipient => "recipient",
        }
    }

    /// Return the party as the backend spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Donor => "DONOR",
            Self::Recipient => "RECIPIENT",
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The current user's relationship to a particular match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchRole {
    /// The user is the donor of this match.
    Donor,
    /// The user is the recipient of this match.
    Recipient,
    /// The user is not (unambiguously) a party; every action is refused.
    Unknown,
}

impl MatchRole {
    /// The acting party, if any.
    pub fn party(&self) -> Option<Party> {
        match self {
            Self::Donor => Some(Party::Donor),
            Self::Recipient => Some(Party::Recipient),
            Self::Unknown => None,
        }
    }
}

impl From<Party> for MatchRole {
    fn from(party: Party) -> Self {
        match party {
            Party::Donor => Self::Donor,
            Party::Recipient => Self::Recipient,
        }
    }
}
