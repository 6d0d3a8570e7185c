use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::dn::domain_dn_to_dns;

/// Naming contexts read from RootDSE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamingContexts {
    /// defaultNamingContext (domain partition)
    pub default: String,
    pub configuration: String,
    pub schema: String,
    pub root_domain: String,
    /// dNSHostName of the controller that answered
    pub dns_host_name: Option<String>,
}

impl NamingContexts {
    /// Derive the other partitions assuming the domain is the forest root
    pub fn from_default_dn(domain_dn: &str) -> Self {
        let configuration = format!("CN=Configuration,{}", domain_dn);
        Self {
            default: domain_dn.to_string(),
            schema: format!("CN=Schema,{}", configuration),
            configuration,
            root_domain: domain_dn.to_string(),
            dns_host_name: None,
        }
    }

    pub fn dns_root(&self) -> String {
        domain_dn_to_dns(&self.default)
    }
}

/// Categories of leftover objects for a decommissioned domain controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataCategory {
    NtdsSettings,
    ServerObject,
    ComputerAccount,
    DomainControllersOuEntry,
    SysvolMember,
}

impl MetadataCategory {
    /// Cleanup order: NTDS Settings must go before its server object
    pub fn all() -> &'static [MetadataCategory] {
        &[
            MetadataCategory::NtdsSettings,
            MetadataCategory::ServerObject,
            MetadataCategory::ComputerAccount,
            MetadataCategory::DomainControllersOuEntry,
            MetadataCategory::SysvolMember,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            MetadataCategory::NtdsSettings => "NTDS Settings object",
            MetadataCategory::ServerObject => "Site server object",
            MetadataCategory::ComputerAccount => "Computer account",
            MetadataCategory::DomainControllersOuEntry => "Domain Controllers OU entry",
            MetadataCategory::SysvolMember => "SYSVOL replication member",
        }
    }

    /// Whether deletion needs the tree-delete control
    pub fn needs_tree_delete(&self) -> bool {
        !matches!(self, MetadataCategory::SysvolMember)
    }
}

impl fmt::Display for MetadataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A directory object found during metadata cleanup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataObject {
    pub category: MetadataCategory,
    pub distinguished_name: String,
}

/// One row of the bulk user import file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserRow {
    #[serde(rename = "DisplayName")]
    pub display_name: String,
    #[serde(rename = "SamAccountName")]
    pub sam_account_name: String,
    #[serde(rename = "UserPrincipalName")]
    pub user_principal_name: String,
    #[serde(rename = "GivenName")]
    pub given_name: String,
    #[serde(rename = "Surname")]
    pub surname: String,
    /// Target container DN
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
}

/// Attributes of a user account to create
#[derive(Clone, PartialEq, Eq)]
pub struct NewUser {
    pub parent_dn: String,
    pub common_name: String,
    pub sam_account_name: String,
    pub user_principal_name: String,
    pub display_name: String,
    pub given_name: String,
    pub surname: String,
    pub description: Option<String>,
    pub password: String,
    pub change_password_at_logon: bool,
}

impl NewUser {
    pub fn distinguished_name(&self) -> String {
        format!("CN={},{}", super::dn::escape_dn_value(&self.common_name), self.parent_dn)
    }
}

// Password stays out of logs
impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("parent_dn", &self.parent_dn)
            .field("common_name", &self.common_name)
            .field("sam_account_name", &self.sam_account_name)
            .field("user_principal_name", &self.user_principal_name)
            .field("change_password_at_logon", &self.change_password_at_logon)
            .finish_non_exhaustive()
    }
}

/// A user account whose last logon is older than the cutoff
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InactiveAccount {
    pub sam_account_name: String,
    pub display_name: Option<String>,
    pub distinguished_name: String,
    /// None when the account never logged on
    pub last_logon: Option<DateTime<Utc>>,
}
