//! `seize-roles`: move FSMO roles off unreachable domain controllers
//!
//! Roles are only seized from holders that failed the liveness probe. The
//! operator must type the confirmation word unless `--force` is given.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use super::Console;
use crate::domain::dn::{extract_server_from_ntds_settings, short_host_name};
use crate::domain::{FsmoRole, NamingContexts, RoleHolder};
use crate::error::{AppError, AppResult};
use crate::infrastructure::{
    check_seize_output, discover_role_holders, read_role_owner, Directory, NtdsutilTool,
    PingProber, Prober, Prompter, RoleTransferTool, TerminalPrompter, DEFAULT_NTDSUTIL,
};

/// Word the operator must type to go ahead
pub const CONFIRMATION_WORD: &str = "SEIZE";

#[derive(Debug, Clone, Args)]
pub struct SeizeRolesArgs {
    /// Domain controller that receives the seized roles
    #[arg(long)]
    pub target: String,

    /// Roles to consider, comma separated (default: all five)
    #[arg(long, value_enum, value_delimiter = ',')]
    pub roles: Vec<FsmoRole>,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub force: bool,

    /// Path to ntdsutil
    #[arg(long, default_value = DEFAULT_NTDSUTIL)]
    pub ntdsutil: PathBuf,

    /// Keep the generated ntdsutil scripts after the run
    #[arg(long)]
    pub keep_scripts: bool,

    /// Directory for generated ntdsutil scripts
    #[arg(long)]
    pub script_dir: Option<PathBuf>,
}

/// What happened to one offline role
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleOutcome {
    pub role: FsmoRole,
    pub previous_holder: String,
    pub seized: bool,
    pub error: Option<String>,
    /// Whether the directory now names the target as holder; None if unread
    pub verified: Option<bool>,
    pub script_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupFailure {
    pub role: FsmoRole,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeizeSummary {
    pub target: String,
    pub holders: Vec<RoleHolder>,
    pub lookup_failures: Vec<LookupFailure>,
    pub outcomes: Vec<RoleOutcome>,
    pub success_count: usize,
    pub failure_count: usize,
}

/// Which roles to move where
#[derive(Debug, Clone, Copy)]
pub struct SeizeRequest<'a> {
    pub target: &'a str,
    /// Empty means all five
    pub roles: &'a [FsmoRole],
    pub force: bool,
}

/// Seize every requested role whose holder does not answer the probe.
///
/// Fails without touching anything when the confirmation word is not typed
/// or when every holder answered.
pub fn seize_roles(
    dir: &mut dyn Directory,
    prober: &dyn Prober,
    tool: &dyn RoleTransferTool,
    prompter: &mut dyn Prompter,
    console: Console,
    request: SeizeRequest<'_>,
) -> AppResult<SeizeSummary> {
    let SeizeRequest { target, roles, force } = request;
    let target = target.trim();
    if target.is_empty() {
        return Err(AppError::InvalidInput("--target must not be empty".to_string()));
    }
    // Repeated roles would run the tool twice for the same role
    let roles = if roles.is_empty() { FsmoRole::all() } else { roles };
    let mut requested: Vec<FsmoRole> = Vec::with_capacity(roles.len());
    for &role in roles {
        if !requested.contains(&role) {
            requested.push(role);
        }
    }

    let contexts = dir.naming_contexts()?;
    let (mut holders, errors) = discover_role_holders(dir, &contexts, &requested);
    let lookup_failures: Vec<LookupFailure> = errors
        .into_iter()
        .map(|(role, e)| {
            console.line(format!("  {:<22} lookup failed: {}", role.display_name(), e));
            LookupFailure {
                role,
                error: e.to_string(),
            }
        })
        .collect();
    if holders.is_empty() {
        return Err(AppError::OperationFailed(
            "no FSMO role holder could be read".to_string(),
        ));
    }

    console.line("Current FSMO role holders:");
    for holder in &holders {
        console.line(format!(
            "  {:<22} {} ({})",
            holder.role.display_name(),
            holder.server_name,
            holder.dns_host_name
        ));
    }

    if !force {
        let answer = prompter.read_text(&format!(
            "Type {} to seize roles held by unreachable controllers onto {}",
            CONFIRMATION_WORD, target
        ))?;
        if answer.trim() != CONFIRMATION_WORD {
            tracing::warn!("Role seizure confirmation did not match");
            return Err(AppError::ConfirmationMismatch);
        }
    }

    probe_holders(prober, &mut holders);
    for holder in &holders {
        console.line(format!(
            "  {:<22} {}",
            holder.role.display_name(),
            if holder.is_offline() { "UNREACHABLE" } else { "online" }
        ));
    }

    let offline: Vec<&RoleHolder> = holders.iter().filter(|h| h.is_offline()).collect();
    if offline.is_empty() {
        return Err(AppError::NoOfflineRoles);
    }

    let mut outcomes = Vec::with_capacity(offline.len());
    for holder in offline {
        let outcome = seize_one(dir, &contexts, tool, target, holder);
        match &outcome.error {
            None => console.line(format!("Seized {} onto {}", holder.role, target)),
            Some(e) => console.line(format!("FAILED to seize {}: {}", holder.role, e)),
        }
        outcomes.push(outcome);
    }

    let success_count = outcomes.iter().filter(|o| o.seized).count();
    let failure_count = outcomes.len() - success_count;
    tracing::info!(
        target = target,
        seized = success_count,
        failed = failure_count,
        "Role seizure finished"
    );

    Ok(SeizeSummary {
        target: target.to_string(),
        holders,
        lookup_failures,
        outcomes,
        success_count,
        failure_count,
    })
}

/// Probe each distinct holder host once, in order
fn probe_holders(prober: &dyn Prober, holders: &mut [RoleHolder]) {
    let mut results: HashMap<String, bool> = HashMap::new();
    for holder in holders.iter_mut() {
        let key = holder.dns_host_name.to_lowercase();
        let reachable = *results
            .entry(key)
            .or_insert_with(|| prober.is_reachable(&holder.dns_host_name));
        holder.reachable = Some(reachable);
    }
}

fn seize_one(
    dir: &mut dyn Directory,
    contexts: &NamingContexts,
    tool: &dyn RoleTransferTool,
    target: &str,
    holder: &RoleHolder,
) -> RoleOutcome {
    let mut outcome = RoleOutcome {
        role: holder.role,
        previous_holder: holder.server_name.clone(),
        seized: false,
        error: None,
        verified: None,
        script_path: None,
    };

    let result = tool.seize(target, holder.role).and_then(|output| {
        outcome.script_path = output.script_path.clone();
        check_seize_output(&output).map_err(AppError::ToolFailed)
    });
    if let Err(e) = result {
        tracing::error!(role = %holder.role, error = %e, "Role seizure failed");
        outcome.error = Some(e.to_string());
        return outcome;
    }
    outcome.seized = true;

    outcome.verified = match read_role_owner(dir, contexts, holder.role) {
        Ok(owner_dn) => Some(
            extract_server_from_ntds_settings(&owner_dn)
                .is_some_and(|server| short_host_name(&server) == short_host_name(target)),
        ),
        Err(e) => {
            tracing::warn!(role = %holder.role, error = %e, "Could not verify new role owner");
            None
        }
    };
    if outcome.verified == Some(false) {
        tracing::warn!(
            role = %holder.role,
            target = target,
            "Directory does not yet name the target as role owner (replication pending?)"
        );
    }
    outcome
}

/// Entry point for the subcommand
pub fn execute(args: &SeizeRolesArgs, dir: &mut dyn Directory, console: Console) -> AppResult<()> {
    let tool = NtdsutilTool {
        executable: args.ntdsutil.clone(),
        script_dir: args.script_dir.clone(),
        keep_scripts: args.keep_scripts,
    };
    let summary = seize_roles(
        dir,
        &PingProber::default(),
        &tool,
        &mut TerminalPrompter,
        console,
        SeizeRequest {
            target: &args.target,
            roles: &args.roles,
            force: args.force,
        },
    )?;

    console.finish(
        &summary,
        &format!(
            "Seized {} role(s) onto {}, {} failed",
            summary.success_count, summary.target, summary.failure_count
        ),
    )
}
