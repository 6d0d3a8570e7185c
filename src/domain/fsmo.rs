//! FSMO role definitions
//!
//! Each role knows which directory object carries its `fSMORoleOwner`
//! attribute and which ntdsutil verb seizes it.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::NamingContexts;

/// Flexible Single Master Operations roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum FsmoRole {
    #[value(name = "schema", alias = "schema-master")]
    SchemaMaster,
    #[value(name = "naming", alias = "domain-naming-master")]
    DomainNamingMaster,
    #[value(name = "rid", alias = "rid-master")]
    RidMaster,
    #[value(name = "pdc", alias = "pdc-emulator")]
    PdcEmulator,
    #[value(name = "infrastructure", alias = "infrastructure-master")]
    InfrastructureMaster,
}

impl FsmoRole {
    /// All five roles, forest-wide roles first
    pub fn all() -> &'static [FsmoRole] {
        &[
            FsmoRole::SchemaMaster,
            FsmoRole::DomainNamingMaster,
            FsmoRole::RidMaster,
            FsmoRole::PdcEmulator,
            FsmoRole::InfrastructureMaster,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FsmoRole::SchemaMaster => "Schema Master",
            FsmoRole::DomainNamingMaster => "Domain Naming Master",
            FsmoRole::RidMaster => "RID Master",
            FsmoRole::PdcEmulator => "PDC Emulator",
            FsmoRole::InfrastructureMaster => "Infrastructure Master",
        }
    }

    /// DN of the object whose `fSMORoleOwner` names the current holder
    pub fn role_object_dn(&self, contexts: &NamingContexts) -> String {
        match self {
            FsmoRole::SchemaMaster => contexts.schema.clone(),
            FsmoRole::DomainNamingMaster => format!("CN=Partitions,{}", contexts.configuration),
            FsmoRole::RidMaster => format!("CN=RID Manager$,CN=System,{}", contexts.default),
            FsmoRole::PdcEmulator => contexts.default.clone(),
            FsmoRole::InfrastructureMaster => format!("CN=Infrastructure,{}", contexts.default),
        }
    }

    /// Argument to ntdsutil's `seize` command in the `fsmo maintenance` menu
    pub fn ntdsutil_verb(&self) -> &'static str {
        match self {
            FsmoRole::SchemaMaster => "schema master",
            FsmoRole::DomainNamingMaster => "naming master",
            FsmoRole::RidMaster => "rid master",
            FsmoRole::PdcEmulator => "pdc",
            FsmoRole::InfrastructureMaster => "infrastructure master",
        }
    }
}

impl fmt::Display for FsmoRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Current holder of a role, annotated with the probe result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleHolder {
    pub role: FsmoRole,
    /// DN of the holder's NTDS Settings object
    pub owner_dn: String,
    /// Short server name (the server object's CN)
    pub server_name: String,
    /// dNSHostName of the server object, or the server name if absent
    pub dns_host_name: String,
    /// None until probed
    pub reachable: Option<bool>,
}

impl RoleHolder {
    pub fn is_offline(&self) -> bool {
        self.reachable == Some(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contexts() -> NamingContexts {
        NamingContexts::from_default_dn("DC=corp,DC=contoso,DC=com")
    }

    #[test]
    fn test_role_object_dns() {
        let nc = contexts();
        assert_eq!(
            FsmoRole::RidMaster.role_object_dn(&nc),
            "CN=RID Manager$,CN=System,DC=corp,DC=contoso,DC=com"
        );
        assert_eq!(
            FsmoRole::DomainNamingMaster.role_object_dn(&nc),
            "CN=Partitions,CN=Configuration,DC=corp,DC=contoso,DC=com"
        );
        assert_eq!(
            FsmoRole::SchemaMaster.role_object_dn(&nc),
            "CN=Schema,CN=Configuration,DC=corp,DC=contoso,DC=com"
        );
        assert_eq!(FsmoRole::PdcEmulator.role_object_dn(&nc), "DC=corp,DC=contoso,DC=com");
    }

    #[test]
    fn test_offline_only_after_failed_probe() {
        let holder = RoleHolder {
            role: FsmoRole::PdcEmulator,
            owner_dn: String::new(),
            server_name: "DC1".into(),
            dns_host_name: "dc1.corp.contoso.com".into(),
            reachable: None,
        };
        assert!(!holder.is_offline());
        let down = RoleHolder {
            reachable: Some(false),
            ..holder.clone()
        };
        assert!(down.is_offline());
        let up = RoleHolder {
            reachable: Some(true),
            ..holder
        };
        assert!(!up.is_offline());
    }
}
