//! Session commands: login, logout, whoami.

use clap::Args;
use serde::Serialize;

use crate::output::{self, OutputFormat};
use donorlink_core::config::AppConfig;
use donorlink_core::error::AppError;
use donorlink_core::types::id::UserId;
use donorlink_entity::session::Session;
use donorlink_entity::user::UserRole;

/// Arguments for `login`
#[derive(Debug, Args)]
pub struct LoginArgs {
    /// User id issued by the identity provider
    #[arg(long)]
    pub user_id: Option<String>,

    /// Bearer token (prompted for when omitted)
    #[arg(long)]
    pub token: Option<String>,

    /// Registered role; repeat for several (donor, recipient)
    #[arg(long = "role", required = true)]
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WhoamiView {
    user_id: String,
    roles: Vec<String>,
    established_at: String,
    session_file: String,
}

/// Build and persist a session.
pub async fn login(args: &LoginArgs, config: &AppConfig) -> Result<(), AppError> {
    let user_id = match &args.user_id {
        Some(id) => id.clone(),
        None => dialoguer::Input::new()
            .with_prompt("User id")
            .interact_text()
            .map_err(|e| AppError::internal(format!("Input error: {e}")))?,
    };
    let user_id: UserId = user_id
        .trim()
        .parse()
        .map_err(|e| AppError::validation(format!("Invalid user id '{user_id}': {e}")))?;

    let token = match &args.token {
        Some(token) => token.clone(),
        None => dialoguer::Password::new()
            .with_prompt("Bearer token")
            .interact()
            .map_err(|e| AppError::internal(format!("Input error: {e}")))?,
    };

    let roles = args
        .roles
        .iter()
        .map(|r| r.parse::<UserRole>())
        .collect::<Result<Vec<_>, _>>()?;

    let session = Session::new(user_id, roles, token)?;
    let file = super::session_file(config);
    file.save(&session).await?;

    output::print_success(&format!(
        "Logged in as {} (session saved to {})",
        session.user_id,
        file.path().display()
    ));
    Ok(())
}

/// Remove the persisted session.
pub async fn logout(config: &AppConfig) -> Result<(), AppError> {
    if super::session_file(config).clear().await? {
        output::print_success("Logged out");
    } else {
        output::print_warning("No session was stored");
    }
    Ok(())
}

/// Show the persisted session without its credential.
pub async fn whoami(config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let file = super::session_file(config);
    let Some(session) = file.load().await? else {
        output::print_warning("Not logged in");
        return Ok(());
    };

    let view = WhoamiView {
        user_id: session.user_id.to_string(),
        roles: session.roles.iter().map(|r| r.to_string()).collect(),
        established_at: output::timestamp(session.established_at),
        session_file: file.path().display().to_string(),
    };
    match format {
        OutputFormat::Json => output::print_json(&view, "{}"),
        OutputFormat::Table => {
            output::print_kv("User", &view.user_id);
            output::print_kv("Roles", &view.roles.join(", "));
            output::print_kv("Logged in", &view.established_at);
            output::print_kv("Session file", &view.session_file);
        }
    }
    Ok(())
}
