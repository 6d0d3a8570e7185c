//! `disable-inactive`: disable accounts that have not logged on recently
//!
//! The report lists only the accounts that were actually disabled, so it can
//! be used to re-enable them later.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use clap::Args;
use serde::Serialize;

use super::Console;
use crate::domain::InactiveAccount;
use crate::error::{AppError, AppResult};
use crate::infrastructure::tabular::{
    default_report_name, DisabledAccountRecord, ReportWriter, DISABLED_REPORT_HEADERS,
};
use crate::infrastructure::{
    disable_account, find_inactive_accounts, Directory, InactiveQuery, Prompter, TerminalPrompter,
};

pub const DEFAULT_INACTIVE_DAYS: u32 = 90;
/// Upper bound for `--days` (100 years)
pub const MAX_INACTIVE_DAYS: u32 = 36_500;

#[derive(Debug, Clone, Args)]
pub struct DisableInactiveArgs {
    /// Days without a logon before an account counts as inactive
    #[arg(long, default_value_t = DEFAULT_INACTIVE_DAYS, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_INACTIVE_DAYS)))]
    pub days: u32,

    /// Search base DN (default: the domain)
    #[arg(long)]
    pub search_base: Option<String>,

    /// Report file (default: DisabledAccounts_<yyyyMMdd>.csv)
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Disable without asking
    #[arg(long)]
    pub force: bool,

    /// List the candidates and stop
    #[arg(long)]
    pub what_if: bool,

    /// Also treat accounts that never logged on as inactive
    #[arg(long)]
    pub include_never_logged_on: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisableFailure {
    pub sam_account_name: String,
    pub distinguished_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisableSummary {
    pub cutoff: DateTime<Utc>,
    pub candidates: Vec<InactiveAccount>,
    pub disabled: Vec<DisabledAccountRecord>,
    pub failures: Vec<DisableFailure>,
    /// None for what-if runs
    pub report_path: Option<PathBuf>,
}

pub struct DisableRequest<'a> {
    pub search_base: Option<&'a str>,
    pub days: u32,
    pub now: DateTime<Utc>,
    pub include_never_logged_on: bool,
    pub force: bool,
    pub what_if: bool,
    pub report_path: &'a Path,
}

pub fn disable_inactive(
    dir: &mut dyn Directory,
    prompter: &mut dyn Prompter,
    console: Console,
    request: &DisableRequest<'_>,
) -> AppResult<DisableSummary> {
    if request.days == 0 || request.days > MAX_INACTIVE_DAYS {
        return Err(AppError::InvalidInput(format!(
            "--days must be between 1 and {}",
            MAX_INACTIVE_DAYS
        )));
    }
    let cutoff = request
        .now
        .checked_sub_signed(Duration::days(i64::from(request.days)))
        .ok_or_else(|| {
            AppError::InvalidInput(format!("{} days before {} is out of range", request.days, request.now))
        })?;
    let search_base = match request.search_base {
        Some(base) => base.to_string(),
        None => dir.naming_contexts()?.default,
    };

    let candidates = find_inactive_accounts(
        dir,
        &InactiveQuery {
            search_base,
            cutoff,
            include_never_logged_on: request.include_never_logged_on,
        },
    )?;

    console.line(format!(
        "{} account(s) without a logon since {}:",
        candidates.len(),
        cutoff.format("%Y-%m-%d")
    ));
    for account in &candidates {
        console.line(format!(
            "  {:<20} {:<30} {}",
            account.sam_account_name,
            account.display_name.as_deref().unwrap_or(""),
            account
                .last_logon
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "never".to_string())
        ));
    }

    let mut summary = DisableSummary {
        cutoff,
        candidates,
        disabled: Vec::new(),
        failures: Vec::new(),
        report_path: None,
    };
    if request.what_if {
        console.line("What-if: no account was changed");
        return Ok(summary);
    }
    if summary.candidates.is_empty() {
        return Ok(summary);
    }

    if !request.force
        && !prompter.confirm(
            &format!("Disable {} account(s)?", summary.candidates.len()),
            false,
        )?
    {
        tracing::info!("Operator declined to disable inactive accounts");
        return Err(AppError::Aborted);
    }

    // Opened before the first change so an unwritable path stops the run early
    let mut report = ReportWriter::create(request.report_path, DISABLED_REPORT_HEADERS)?;
    summary.report_path = Some(request.report_path.to_path_buf());

    for account in &summary.candidates {
        match disable_account(dir, &account.distinguished_name) {
            Ok(()) => {
                console.line(format!("Disabled {}", account.sam_account_name));
                let record = DisabledAccountRecord::new(account, Utc::now());
                report.append(&record)?;
                summary.disabled.push(record);
            }
            Err(e) => {
                tracing::error!(dn = %account.distinguished_name, error = %e, "Failed to disable account");
                console.line(format!("FAILED to disable {}: {}", account.sam_account_name, e));
                summary.failures.push(DisableFailure {
                    sam_account_name: account.sam_account_name.clone(),
                    distinguished_name: account.distinguished_name.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        disabled = report.rows(),
        failed = summary.failures.len(),
        report = %request.report_path.display(),
        "Inactive account run finished"
    );
    Ok(summary)
}

/// Entry point for the subcommand
pub fn execute(args: &DisableInactiveArgs, dir: &mut dyn Directory, console: Console) -> AppResult<()> {
    let now = Utc::now();
    let report_path = args
        .report
        .clone()
        .unwrap_or_else(|| PathBuf::from(default_report_name(now.date_naive())));

    let summary = disable_inactive(
        dir,
        &mut TerminalPrompter,
        console,
        &DisableRequest {
            search_base: args.search_base.as_deref(),
            days: args.days,
            now,
            include_never_logged_on: args.include_never_logged_on,
            force: args.force,
            what_if: args.what_if,
            report_path: &report_path,
        },
    )?;

    let text = match &summary.report_path {
        Some(path) => format!(
            "Disabled {} of {} account(s), {} failed; report: {}",
            summary.disabled.len(),
            summary.candidates.len(),
            summary.failures.len(),
            path.display()
        ),
        None => format!("{} inactive account(s) found", summary.candidates.len()),
    };
    console.finish(&summary, &text)
}
