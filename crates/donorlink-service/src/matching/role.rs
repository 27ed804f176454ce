//! Deriving the current user's side of a match.

use donorlink_entity::matching::{MatchResult, MatchRole};
use donorlink_entity::session::Session;

/// The session user's role in `m`.
///
/// `Unknown` when the user is neither party, and also when the user is both
/// (a self-match), since no action could then be attributed to one side.
pub fn derive_role(m: &MatchResult, session: &Session) -> MatchRole {
    let is_donor = m.donor_user_id == session.user_id;
    let is_recipient = m.recipient_user_id == session.user_id;
    match (is_donor, is_recipient) {
        (true, false) => MatchRole::Donor,
        (false, true) => MatchRole::Recipient,
        _ => MatchRole::Unknown,
    }
}
