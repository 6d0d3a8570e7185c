//! Active Directory write operations
//!
//! Account disabling, user creation from import rows, and object deletion.

use super::directory::{read_object, Directory};
use crate::domain::dn::looks_like_dn;
use crate::domain::{AccountControl, MetadataObject, NewUser, UserRow};
use crate::error::{AppError, AppResult};

/// Disable a user account by setting the ACCOUNTDISABLE flag
///
/// Other flags are preserved; an already disabled account is left alone.
pub fn disable_account(dir: &mut dyn Directory, object_dn: &str) -> AppResult<()> {
    let row = read_object(dir, object_dn, &["userAccountControl"])?
        .ok_or_else(|| AppError::ObjectNotFound(object_dn.to_string()))?;

    let current = row
        .get("userAccountControl")
        .and_then(|v| AccountControl::parse(v))
        .ok_or_else(|| {
            AppError::LdapError(format!("{} has no readable userAccountControl", object_dn))
        })?;

    if current.is_domain_controller() {
        return Err(AppError::InvalidInput(format!(
            "{} is a domain controller account and will not be disabled",
            object_dn
        )));
    }
    if current.is_disabled() {
        tracing::debug!(dn = object_dn, "Account already disabled");
        return Ok(());
    }

    dir.set_account_control(object_dn, current.disabled())?;
    tracing::info!(dn = object_dn, uac = %current.disabled(), "Account disabled");
    Ok(())
}

/// Validate an import row and turn it into a creation request
pub fn new_user_from_row(row: &UserRow, change_password_at_logon: bool) -> AppResult<NewUser> {
    let required = [
        ("DisplayName", &row.display_name),
        ("SamAccountName", &row.sam_account_name),
        ("UserPrincipalName", &row.user_principal_name),
        ("GivenName", &row.given_name),
        ("Surname", &row.surname),
        ("Path", &row.path),
        ("Password", &row.password),
    ];
    let missing: Vec<&str> = required
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "missing required field(s): {}",
            missing.join(", ")
        )));
    }

    if !looks_like_dn(&row.path) {
        return Err(AppError::InvalidInput(format!(
            "Path '{}' is not a distinguished name",
            row.path
        )));
    }
    // sAMAccountName is limited to 20 characters for user objects
    if row.sam_account_name.trim().chars().count() > 20 {
        return Err(AppError::InvalidInput(format!(
            "SamAccountName '{}' is longer than 20 characters",
            row.sam_account_name
        )));
    }
    if !row.user_principal_name.contains('@') {
        return Err(AppError::InvalidInput(format!(
            "UserPrincipalName '{}' has no @suffix",
            row.user_principal_name
        )));
    }

    Ok(NewUser {
        parent_dn: row.path.trim().to_string(),
        common_name: row.display_name.trim().to_string(),
        sam_account_name: row.sam_account_name.trim().to_string(),
        user_principal_name: row.user_principal_name.trim().to_string(),
        display_name: row.display_name.trim().to_string(),
        given_name: row.given_name.trim().to_string(),
        surname: row.surname.trim().to_string(),
        description: row.description.clone().filter(|d| !d.trim().is_empty()),
        password: row.password.clone(),
        change_password_at_logon,
    })
}

/// Delete one leftover metadata object
pub fn delete_metadata_object(dir: &mut dyn Directory, object: &MetadataObject) -> AppResult<()> {
    dir.delete_object(
        &object.distinguished_name,
        object.category.needs_tree_delete(),
    )?;
    tracing::info!(
        dn = %object.distinguished_name,
        category = %object.category,
        "Deleted metadata object"
    );
    Ok(())
}
