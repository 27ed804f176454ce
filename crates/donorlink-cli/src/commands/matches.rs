//! Match CLI commands.

use chrono::{NaiveDate, Utc};
use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use donorlink_core::config::AppConfig;
use donorlink_core::error::AppError;
use donorlink_core::types::id::MatchId;
use donorlink_entity::matching::{CompletionDetails, MatchResult};
use donorlink_entity::session::Session;
use donorlink_service::{
    ActionOutcome, ConfirmationGate, MatchAction, MatchFilter, MatchService, derive_role,
};

/// Arguments for match commands
#[derive(Debug, Args)]
pub struct MatchesArgs {
    /// Match subcommand
    #[command(subcommand)]
    pub command: MatchCommand,
}

/// Listing selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FilterArg {
    AsDonor,
    AsRecipient,
    Active,
    Pending,
    Confirmed,
}

impl From<FilterArg> for MatchFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::AsDonor => Self::AsDonor,
            FilterArg::AsRecipient => Self::AsRecipient,
            FilterArg::Active => Self::Active,
            FilterArg::Pending => Self::Pending,
            FilterArg::Confirmed => Self::Confirmed,
        }
    }
}

/// Match subcommands
#[derive(Debug, Subcommand)]
pub enum MatchCommand {
    /// List matches
    List {
        /// Which listing to fetch
        #[arg(long, value_enum, default_value = "active")]
        filter: FilterArg,
    },
    /// Show one match and what you can do with it
    Show {
        /// Match ID
        id: String,
    },
    /// Confirm a match
    Confirm {
        /// Match ID
        id: String,
        /// Skip confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Reject a match
    Reject {
        /// Match ID
        id: String,
        /// Why the match is being rejected
        #[arg(long)]
        reason: String,
        /// Skip confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Withdraw your confirmation (within the grace period)
    Withdraw {
        /// Match ID
        id: String,
        /// Why the confirmation is being withdrawn
        #[arg(long)]
        reason: String,
        /// Skip confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Confirm the donation was received (recipient only)
    Complete {
        /// Match ID
        id: String,
        /// Date received (YYYY-MM-DD)
        #[arg(long)]
        received: NaiveDate,
        /// Notes about the handover
        #[arg(long)]
        notes: String,
        /// Rating from 1 to 5
        #[arg(long)]
        rating: Option<u8>,
        /// Hospital where the handover happened
        #[arg(long)]
        hospital: Option<String>,
        /// Skip confirmation
        #[arg(long)]
        yes: bool,
    },
}

/// Match display row for table output
#[derive(Debug, Serialize, Tabled)]
struct MatchRow {
    /// Match ID
    id: String,
    /// Status
    status: String,
    /// Your role
    role: String,
    /// Donor confirmed
    donor: String,
    /// Recipient confirmed
    recipient: String,
    /// Grace period left for you
    grace: String,
    /// Available actions
    actions: String,
    /// Updated
    updated: String,
}

impl MatchRow {
    fn new(m: &MatchResult, session: &Session, gate: &ConfirmationGate) -> Self {
        let now = Utc::now();
        let role = derive_role(m, session);
        let grace = role
            .party()
            .and_then(|party| m.grace_remaining(party, now))
            .map(|left| format!("{}m", left.num_minutes()))
            .unwrap_or_else(|| "-".to_string());
        let actions = gate
            .permitted_actions(m, session, now)
            .iter()
            .map(|a| a.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            id: m.match_id.to_string(),
            status: m.status.label().to_string(),
            role: format!("{role:?}"),
            donor: tick(m.donor_confirmed),
            recipient: tick(m.recipient_confirmed),
            grace,
            actions: if actions.is_empty() { "-".to_string() } else { actions },
            updated: output::optional_timestamp(m.updated_at),
        }
    }
}

fn tick(flag: bool) -> String {
    if flag { "✓" } else { "✗" }.to_string()
}

/// Execute match commands
pub async fn execute(
    args: &MatchesArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let sessions = super::logged_in(config).await?;
    let session = sessions.require()?;
    let service = MatchService::new(super::gateway(config)?, sessions, &config.matching);

    match &args.command {
        MatchCommand::List { filter } => {
            let matches = service.load((*filter).into()).await?;
            let rows: Vec<MatchRow> = matches
                .iter()
                .map(|m| MatchRow::new(m, &session, service.gate()))
                .collect();
            output::print_list(&rows, format, "No matches found.");
        }
        MatchCommand::Show { id } => {
            let id = parse_id(id)?;
            service.load_all().await?;
            let m = service
                .get(id)
                .ok_or_else(|| AppError::not_found(format!("Match '{id}' not found")))?;
            match format {
                OutputFormat::Json => output::print_json(&m, "{}"),
                OutputFormat::Table => {
                    let row = MatchRow::new(&m, &session, service.gate());
                    output::print_kv("Match", &row.id);
                    output::print_kv("Status", &row.status);
                    output::print_kv("Your role", &row.role);
                    output::print_kv("Donor confirmed", &row.donor);
                    output::print_kv("Recipient confirmed", &row.recipient);
                    output::print_kv("Grace left", &row.grace);
                    output::print_kv("Actions", &row.actions);
                    output::print_kv("Updated", &row.updated);
                }
            }
        }
        MatchCommand::Confirm { id, yes } => {
            let action = MatchAction::Confirm;
            run_action(&service, id, action, *yes, "Confirm this match?", format).await?;
        }
        MatchCommand::Reject { id, reason, yes } => {
            let action = MatchAction::Reject {
                reason: reason.clone(),
            };
            run_action(&service, id, action, *yes, "Reject this match?", format).await?;
        }
        MatchCommand::Withdraw { id, reason, yes } => {
            let action = MatchAction::Withdraw {
                reason: reason.clone(),
            };
            run_action(&service, id, action, *yes, "Withdraw your confirmation?", format).await?;
        }
        MatchCommand::Complete {
            id,
            received,
            notes,
            rating,
            hospital,
            yes,
        } => {
            let mut details = CompletionDetails::new(*received, notes.clone());
            details.rating = *rating;
            details.hospital_name = hospital.clone();
            let action = MatchAction::Complete(details);
            run_action(
                &service,
                id,
                action,
                *yes,
                "Confirm you received this donation?",
                format,
            )
            .await?;
        }
    }

    Ok(())
}

async fn run_action(
    service: &MatchService,
    id: &str,
    action: MatchAction,
    yes: bool,
    prompt: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let id = parse_id(id)?;
    service.load_all().await?;

    let authorization = service.authorize(id, &action)?;
    if !authorization.allowed {
        let reason = authorization
            .reason
            .unwrap_or_else(|| "Action not allowed".to_string());
        return Err(match authorization.refusal {
            Some(refusal) => refusal.into(),
            None => AppError::authorization(reason),
        });
    }

    if !yes {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| AppError::internal(format!("Input error: {e}")))?;
        if !confirmed {
            output::print_warning("Cancelled");
            return Ok(());
        }
    }

    let kind = action.kind();
    let outcome = match action {
        MatchAction::Confirm => service.confirm(id).await?,
        MatchAction::Reject { reason } => service.reject(id, reason).await?,
        MatchAction::Withdraw { reason } => service.withdraw(id, reason).await?,
        MatchAction::Complete(details) => service.confirm_completion(id, details).await?,
    };

    match (&outcome, format) {
        (_, OutputFormat::Json) => output::print_json(outcome.record(), "{}"),
        (ActionOutcome::Applied(m), OutputFormat::Table) => {
            output::print_success(&format!("{kind}: match is now {}", m.status.label()));
        }
        (ActionOutcome::NoLongerActionable(m), OutputFormat::Table) => {
            output::print_warning(&format!(
                "This match is no longer actionable (now {})",
                m.status.label()
            ));
        }
    }
    Ok(())
}

fn parse_id(raw: &str) -> Result<MatchId, AppError> {
    raw.trim()
        .parse()
        .map_err(|e| AppError::validation(format!("Invalid match id '{raw}': {e}")))
}
