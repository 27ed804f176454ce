//! `/matching` endpoints.

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::info;

use donorlink_core::error::AppError;
use donorlink_core::types::id::MatchId;
use donorlink_entity::matching::{CompletionDetails, MatchResult, Party};
use donorlink_entity::session::Session;
use donorlink_service::{MatchFilter, MatchGateway};

use crate::client::HttpGateway;
use crate::error::Resource;

#[derive(Debug, Serialize)]
struct ReasonBody<'a> {
    reason: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CanConfirmBody {
    can_confirm: bool,
}

pub fn list_path(filter: MatchFilter) -> String {
    format!("matching/my-matches/{}", filter.path_segment())
}

/// Path for a party-scoped action (`confirm`, `reject`, `withdraw`).
pub fn action_path(party: Party, action: &str, id: MatchId) -> String {
    format!("matching/{}/{}/{}", party.path_segment(), action, id)
}

pub fn completion_path(id: MatchId) -> String {
    format!("matching/recipient/confirm-completion/{id}")
}

pub fn can_complete_path(id: MatchId) -> String {
    format!("matching/recipient/can-confirm-completion/{id}")
}

#[async_trait]
impl MatchGateway for HttpGateway {
    async fn list_matches(
        &self,
        session: &Session,
        filter: MatchFilter,
    ) -> Result<Vec<MatchResult>, AppError> {
        let request = self.request(Method::GET, &list_path(filter), session);
        self.send_json(request, Resource::Match).await
    }

    async fn confirm(&self, session: &Session, party: Party, id: MatchId) -> Result<(), AppError> {
        let request = self.request(Method::POST, &action_path(party, "confirm", id), session);
        self.send_unit(request, Resource::Match).await?;
        info!(match_id = %id, party = party.as_str(), "Match confirmed");
        Ok(())
    }

    async fn reject(
        &self,
        session: &Session,
        party: Party,
        id: MatchId,
        reason: &str,
    ) -> Result<(), AppError> {
        let request = self
            .request(Method::POST, &action_path(party, "reject", id), session)
            .json(&ReasonBody { reason });
        self.send_unit(request, Resource::Match).await?;
        info!(match_id = %id, party = party.as_str(), "Match rejected");
        Ok(())
    }

    async fn withdraw(
        &self,
        session: &Session,
        party: Party,
        id: MatchId,
        reason: &str,
    ) -> Result<(), AppError> {
        let request = self
            .request(Method::POST, &action_path(party, "withdraw", id), session)
            .json(&ReasonBody { reason });
        self.send_unit(request, Resource::Match).await?;
        info!(match_id = %id, party = party.as_str(), "Confirmation withdrawn");
        Ok(())
    }

    async fn confirm_completion(
        &self,
        session: &Session,
        id: MatchId,
        details: &CompletionDetails,
    ) -> Result<(), AppError> {
        let request = self
            .request(Method::POST, &completion_path(id), session)
            .json(details);
        self.send_unit(request, Resource::Match).await?;
        info!(match_id = %id, "Completion confirmed");
        Ok(())
    }

    async fn can_confirm_completion(
        &self,
        session: &Session,
        id: MatchId,
    ) -> Result<bool, AppError> {
        let request = self.request(Method::GET, &can_complete_path(id), session);
        let body: CanConfirmBody = self.send_json(request, Resource::Match).await?;
        Ok(body.can_confirm)
    }
}
