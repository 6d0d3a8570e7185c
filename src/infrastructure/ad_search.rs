//! Active Directory search operations
//!
//! Queries used by the maintenance procedures: FSMO role holders, leftover
//! objects of a dead domain controller, and inactive user accounts.

use chrono::{DateTime, Utc};

use super::directory::{read_object, Directory, SearchResult, SearchScope};
use crate::domain::dn::{
    escape_dn_value, escape_ldap_filter, extract_server_from_ntds_settings, server_dn_from_ntds_settings,
    short_host_name,
};
use crate::domain::{
    datetime_to_filetime, filetime_to_datetime, FsmoRole, InactiveAccount, MetadataCategory,
    MetadataObject, NamingContexts, RoleHolder,
};
use crate::error::{AppError, AppResult};

/// LDAP matching rule OID for bitwise AND
pub const LDAP_MATCHING_RULE_BIT_AND: &str = "1.2.840.113556.1.4.803";

/// Read the NTDS Settings DN currently owning a role
pub fn read_role_owner(
    dir: &mut dyn Directory,
    contexts: &NamingContexts,
    role: FsmoRole,
) -> AppResult<String> {
    let role_dn = role.role_object_dn(contexts);
    let row = read_object(dir, &role_dn, &["fSMORoleOwner"])?
        .ok_or_else(|| AppError::ObjectNotFound(role_dn.clone()))?;
    row.get("fSMORoleOwner")
        .cloned()
        .ok_or_else(|| AppError::LdapError(format!("{} has no fSMORoleOwner", role_dn)))
}

/// Resolve an NTDS Settings DN to the holder's server and DNS names
pub fn resolve_role_holder(
    dir: &mut dyn Directory,
    role: FsmoRole,
    owner_dn: &str,
) -> AppResult<RoleHolder> {
    // A deleted holder shows up as "CN=NTDS Settings\0ADEL:<guid>,..."
    let server_name = extract_server_from_ntds_settings(owner_dn).ok_or_else(|| {
        AppError::InvalidInput(format!("{} is not an NTDS Settings DN", owner_dn))
    })?;
    let server_dn = server_dn_from_ntds_settings(owner_dn).unwrap_or_default();

    let dns_host_name = match read_object(dir, server_dn, &["dNSHostName"]) {
        Ok(row) => row.and_then(|r| r.get("dNSHostName").cloned()),
        Err(e) => {
            tracing::warn!(server_dn = %server_dn, error = %e, "Failed to read server object");
            None
        }
    }
    .unwrap_or_else(|| server_name.clone());

    Ok(RoleHolder {
        role,
        owner_dn: owner_dn.to_string(),
        server_name: short_host_name(&server_name),
        dns_host_name,
        reachable: None,
    })
}

/// Discover FSMO role holders
///
/// Roles whose owner cannot be read are returned in the error list and
/// skipped; the rest are resolved to server names.
pub fn discover_role_holders(
    dir: &mut dyn Directory,
    contexts: &NamingContexts,
    roles: &[FsmoRole],
) -> (Vec<RoleHolder>, Vec<(FsmoRole, AppError)>) {
    let mut holders = Vec::new();
    let mut errors = Vec::new();

    for &role in roles {
        let holder = read_role_owner(dir, contexts, role)
            .and_then(|owner_dn| resolve_role_holder(dir, role, &owner_dn));
        match holder {
            Ok(holder) => {
                tracing::info!(
                    role = %role,
                    server = %holder.server_name,
                    dns = %holder.dns_host_name,
                    "Found FSMO role holder"
                );
                holders.push(holder);
            }
            Err(e) => {
                tracing::error!(role = %role, error = %e, "Failed to look up FSMO role holder");
                errors.push((role, e));
            }
        }
    }

    (holders, errors)
}

/// Locate the leftover objects of one category for a dead controller.
///
/// `already_found` holds DNs matched by earlier categories so the same
/// object is never offered twice.
pub fn find_metadata_objects(
    dir: &mut dyn Directory,
    contexts: &NamingContexts,
    controller: &str,
    site: Option<&str>,
    category: MetadataCategory,
    already_found: &[String],
) -> AppResult<Vec<MetadataObject>> {
    let name = escape_ldap_filter(controller);
    let dns: Vec<String> = match category {
        MetadataCategory::ServerObject => find_server_objects(dir, contexts, controller, site)?,
        MetadataCategory::NtdsSettings => {
            let mut found = Vec::new();
            for server_dn in find_server_objects(dir, contexts, controller, site)? {
                let ntds_dn = format!("CN=NTDS Settings,{}", server_dn);
                if read_object(dir, &ntds_dn, &["objectClass"])?.is_some() {
                    found.push(ntds_dn);
                }
            }
            found
        }
        MetadataCategory::ComputerAccount => dir
            .search(
                &contexts.default,
                &format!("(&(objectCategory=computer)(sAMAccountName={}$))", name),
                &["distinguishedName"],
                SearchScope::Subtree,
            )?
            .into_iter()
            .map(|r| r.distinguished_name)
            .collect(),
        MetadataCategory::DomainControllersOuEntry => {
            let ou = format!("OU=Domain Controllers,{}", contexts.default);
            match dir.search(&ou, &format!("(name={}*)", name), &["name"], SearchScope::OneLevel) {
                Ok(rows) => rows
                    .into_iter()
                    .filter(|r| is_same_or_conflict_name(r, controller))
                    .map(|r| r.distinguished_name)
                    .collect(),
                Err(AppError::ObjectNotFound(_)) => Vec::new(),
                Err(e) => return Err(e),
            }
        }
        MetadataCategory::SysvolMember => {
            let member_dn = format!(
                "CN={},CN=Topology,CN=Domain System Volume,CN=DFSR-GlobalSettings,CN=System,{}",
                escape_dn_value(controller),
                contexts.default
            );
            read_object(dir, &member_dn, &["objectClass"])?
                .map(|_| vec![member_dn])
                .unwrap_or_default()
        }
    };

    Ok(dns
        .into_iter()
        .filter(|dn| !already_found.iter().any(|f| f.eq_ignore_ascii_case(dn)))
        .map(|distinguished_name| MetadataObject {
            category,
            distinguished_name,
        })
        .collect())
}

fn find_server_objects(
    dir: &mut dyn Directory,
    contexts: &NamingContexts,
    controller: &str,
    site: Option<&str>,
) -> AppResult<Vec<String>> {
    let base = match site {
        Some(site) => format!(
            "CN=Servers,CN={},CN=Sites,{}",
            escape_dn_value(site.trim()),
            contexts.configuration
        ),
        None => format!("CN=Sites,{}", contexts.configuration),
    };
    let filter = format!("(&(objectClass=server)(cn={}))", escape_ldap_filter(controller));
    match dir.search(&base, &filter, &["distinguishedName"], SearchScope::Subtree) {
        Ok(rows) => Ok(rows.into_iter().map(|r| r.distinguished_name).collect()),
        Err(AppError::ObjectNotFound(_)) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Exact name, or a replication-conflict copy ("DC2\nCNF:<guid>")
fn is_same_or_conflict_name(row: &SearchResult, controller: &str) -> bool {
    let Some(name) = row.get("name") else {
        return false;
    };
    if name.eq_ignore_ascii_case(controller) {
        return true;
    }
    name.get(..controller.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(controller))
        && name[controller.len()..].trim_start_matches('\n').starts_with("CNF:")
}

/// Options for the inactive account query
#[derive(Debug, Clone)]
pub struct InactiveQuery {
    pub search_base: String,
    pub cutoff: DateTime<Utc>,
    pub include_never_logged_on: bool,
}

impl InactiveQuery {
    /// LDAP filter for enabled, non-critical users idle since before the cutoff
    pub fn filter(&self) -> AppResult<String> {
        let cutoff = datetime_to_filetime(self.cutoff).ok_or_else(|| {
            AppError::InvalidInput(format!("cutoff {} is outside the FILETIME range", self.cutoff))
        })?;
        let logon_clause = if self.include_never_logged_on {
            format!("(|(lastLogonTimestamp<={})(!(lastLogonTimestamp=*)))", cutoff)
        } else {
            format!("(lastLogonTimestamp<={})", cutoff)
        };
        Ok(format!(
            "(&(objectCategory=person)(objectClass=user)(!(userAccountControl:{}:=2))(!(isCriticalSystemObject=TRUE)){})",
            LDAP_MATCHING_RULE_BIT_AND, logon_clause
        ))
    }
}

/// Find enabled user accounts whose last logon is older than the cutoff
pub fn find_inactive_accounts(
    dir: &mut dyn Directory,
    query: &InactiveQuery,
) -> AppResult<Vec<InactiveAccount>> {
    let filter = query.filter()?;
    let rows = dir.search(
        &query.search_base,
        &filter,
        &[
            "sAMAccountName",
            "displayName",
            "distinguishedName",
            "lastLogonTimestamp",
        ],
        SearchScope::Subtree,
    )?;

    let mut accounts: Vec<InactiveAccount> = rows
        .into_iter()
        .filter_map(|row| {
            let sam_account_name = row.get("sAMAccountName")?.clone();
            Some(InactiveAccount {
                sam_account_name,
                display_name: row.get("displayName").cloned(),
                last_logon: row
                    .get("lastLogonTimestamp")
                    .and_then(|s| s.parse::<i64>().ok())
                    .and_then(filetime_to_datetime),
                distinguished_name: row.distinguished_name,
            })
        })
        .collect();
    accounts.sort_by(|a, b| a.sam_account_name.to_lowercase().cmp(&b.sam_account_name.to_lowercase()));

    tracing::info!(count = accounts.len(), cutoff = %query.cutoff, "Found inactive accounts");
    Ok(accounts)
}
