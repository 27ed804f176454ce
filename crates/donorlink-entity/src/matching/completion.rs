//! Completion attestation submitted by the recipient.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Details the recipient supplies when confirming physical receipt.
///
/// Serialized as the body of `confirm-completion`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompletionDetails {
    /// Date the donation was received. Required at submission.
    pub received_date: Option<NaiveDate>,
    /// Free-text notes about the handover.
    pub notes: String,
    /// Optional 1–5 rating of the experience.
    #[validate(range(min = 1, max = 5))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    /// Hospital where the handover happened.
    #[validate(length(max = 200))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospital_name: Option<String>,
}

impl CompletionDetails {
    /// Completion details with the required fields.
    pub fn new(received_date: NaiveDate, notes: impl Into<String>) -> Self {
        Self {
            received_date: Some(received_date),
            notes: notes.into(),
            rating: None,
            hospital_name: None,
        }
    }

    /// Attach a rating.
    #[must_use]
    pub fn with_rating(mut self, rating: u8) -> Self {
        self.rating = Some(rating);
        self
    }

    /// Attach a hospital name.
    #[must_use]
    pub fn with_hospital(mut self, hospital: impl Into<String>) -> Self {
        self.hospital_name = Some(hospital.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_range_validation() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        assert!(CompletionDetails::new(date, "received").with_rating(5).validate().is_ok());
        assert!(CompletionDetails::new(date, "received").with_rating(0).validate().is_err());
        assert!(CompletionDetails::new(date, "received").with_rating(6).validate().is_err());
        assert!(CompletionDetails::new(date, "received").validate().is_ok());
    }

    #[test]
    fn test_wire_body_shape() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let body = serde_json::to_value(
            CompletionDetails::new(date, "Received in good condition")
                .with_rating(4)
                .with_hospital("St. Mary"),
        )
        .unwrap();
        assert_eq!(body["receivedDate"], "2024-05-02");
        assert_eq!(body["notes"], "Received in good condition");
        assert_eq!(body["rating"], 4);
        assert_eq!(body["hospitalName"], "St. Mary");
    }
}
