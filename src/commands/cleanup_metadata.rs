//! `cleanup-metadata`: remove what a decommissioned controller left behind
//!
//! Categories are processed in a fixed order and each object is deleted
//! behind its own prompt. A failed lookup or deletion is reported and the
//! run moves on.

use clap::Args;
use serde::Serialize;

use super::Console;
use crate::domain::dn::short_host_name;
use crate::domain::{MetadataCategory, MetadataObject};
use crate::error::{AppError, AppResult};
use crate::infrastructure::{
    delete_metadata_object, find_metadata_objects, Directory, Prompter, TerminalPrompter,
};

#[derive(Debug, Clone, Args)]
pub struct CleanupMetadataArgs {
    /// Name of the dead domain controller (short or DNS name)
    #[arg(long)]
    pub controller: String,

    /// Only look for the server object in this site
    #[arg(long)]
    pub site: Option<String>,

    /// Delete without asking
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupFailure {
    pub category: MetadataCategory,
    /// None when the lookup itself failed
    pub distinguished_name: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupSummary {
    pub controller: String,
    pub deleted: Vec<MetadataObject>,
    pub skipped: Vec<MetadataObject>,
    pub not_found: Vec<MetadataCategory>,
    pub failures: Vec<CleanupFailure>,
}

pub fn cleanup_metadata(
    dir: &mut dyn Directory,
    prompter: &mut dyn Prompter,
    console: Console,
    controller: &str,
    site: Option<&str>,
    force: bool,
) -> AppResult<CleanupSummary> {
    if controller.trim().is_empty() {
        return Err(AppError::InvalidInput("--controller must not be empty".to_string()));
    }
    let name = short_host_name(controller.trim());
    let contexts = dir.naming_contexts()?;
    tracing::info!(controller = %name, site = ?site, force = force, "Starting metadata cleanup");
    console.line(format!(
        "Cleaning up metadata of {} in {}",
        name,
        contexts.dns_root()
    ));

    let mut summary = CleanupSummary {
        controller: name.clone(),
        ..Default::default()
    };
    // DNs already offered, so overlapping categories never ask twice
    let mut seen: Vec<String> = Vec::new();

    for &category in MetadataCategory::all() {
        let objects = match find_metadata_objects(dir, &contexts, &name, site, category, &seen) {
            Ok(objects) => objects,
            Err(e) => {
                tracing::error!(category = %category, error = %e, "Metadata lookup failed");
                console.line(format!("{}: lookup failed: {}", category, e));
                summary.failures.push(CleanupFailure {
                    category,
                    distinguished_name: None,
                    error: e.to_string(),
                });
                continue;
            }
        };

        if objects.is_empty() {
            console.line(format!("{}: not found", category));
            summary.not_found.push(category);
            continue;
        }

        for object in objects {
            seen.push(object.distinguished_name.clone());

            let go = force
                || prompter.confirm(
                    &format!("Delete {} {}?", category, object.distinguished_name),
                    false,
                )?;
            if !go {
                console.line(format!("Skipped {}", object.distinguished_name));
                summary.skipped.push(object);
                continue;
            }

            match delete_metadata_object(dir, &object) {
                Ok(()) => {
                    console.line(format!("Deleted {}", object.distinguished_name));
                    summary.deleted.push(object);
                }
                Err(e) => {
                    tracing::error!(dn = %object.distinguished_name, error = %e, "Failed to delete metadata object");
                    console.line(format!("FAILED to delete {}: {}", object.distinguished_name, e));
                    summary.failures.push(CleanupFailure {
                        category,
                        distinguished_name: Some(object.distinguished_name),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    tracing::info!(
        controller = %name,
        deleted = summary.deleted.len(),
        skipped = summary.skipped.len(),
        failed = summary.failures.len(),
        "Metadata cleanup finished"
    );
    Ok(summary)
}

/// Entry point for the subcommand
pub fn execute(
    args: &CleanupMetadataArgs,
    dir: &mut dyn Directory,
    console: Console,
) -> AppResult<()> {
    let summary = cleanup_metadata(
        dir,
        &mut TerminalPrompter,
        console,
        &args.controller,
        args.site.as_deref(),
        args.force,
    )?;
    console.finish(
        &summary,
        &format!(
            "Deleted {} object(s) for {}, {} skipped, {} failed",
            summary.deleted.len(),
            summary.controller,
            summary.skipped.len(),
            summary.failures.len()
        ),
    )
}
