//! Session entity model.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use donorlink_core::error::AppError;
use donorlink_core::types::id::UserId;

use crate::user::UserRole;

/// Opaque bearer credential. Never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Return the raw token for placing in a header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Value for an `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// An authenticated session.
///
/// Built in one step at login and dropped in one step at logout, so no
/// component can ever observe a user id without a credential or vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// The logged-in user.
    pub user_id: UserId,
    /// Roles the account is registered under.
    pub roles: BTreeSet<UserRole>,
    /// Bearer credential for REST and push calls.
    pub credential: Credential,
    /// When the session was established locally.
    pub established_at: DateTime<Utc>,
}

impl Session {
    /// Create a session, rejecting an empty credential.
    pub fn new(
        user_id: UserId,
        roles: impl IntoIterator<Item = UserRole>,
        credential: impl Into<String>,
    ) -> Result<Self, AppError> {
        let credential = credential.into();
        if credential.trim().is_empty() {
            return Err(AppError::session_required());
        }
        Ok(Self {
            user_id,
            roles: roles.into_iter().collect(),
            credential: Credential::new(credential),
            established_at: Utc::now(),
        })
    }

    /// Check whether the account holds a role.
    pub fn has_role(&self, role: UserRole) -> bool {
        self.roles.contains(&role)
    }
}
