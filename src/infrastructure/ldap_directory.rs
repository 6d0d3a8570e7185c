//! LDAP directory client
//!
//! Talks LDAP v3 to a domain controller with the synchronous `ldap3` client.
//! Works from any platform given a server name and bind credentials.

use std::collections::HashSet;
use std::time::Duration;

use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
use ldap3::controls::RawControl;
use ldap3::{LdapConn, LdapConnSettings, LdapResult, Mod, Scope, SearchEntry};

use super::ad_connection::ConnectionSettings;
use super::directory::{Directory, SearchResult, SearchScope};
use crate::domain::{AccountControl, NamingContexts, NewUser};
use crate::error::{AppError, AppResult};

/// Tree delete control: removes an object together with its children
pub const LDAP_SERVER_TREE_DELETE_OID: &str = "1.2.840.113556.1.4.805";

/// AD's default MaxPageSize is 1000
const PAGE_SIZE: i32 = 500;

const RC_SUCCESS: u32 = 0;
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_INVALID_CREDENTIALS: u32 = 49;

/// Directory client over an `ldap3` connection
pub struct LdapDirectory {
    conn: LdapConn,
    url: String,
    secure: bool,
    contexts: Option<NamingContexts>,
}

impl LdapDirectory {
    /// Connect and bind using the given settings.
    pub fn connect(settings: &ConnectionSettings) -> AppResult<Self> {
        let server = settings
            .server
            .as_deref()
            .ok_or_else(|| AppError::ConfigError("no LDAP server configured".to_string()))?;
        let url = settings.ldap_url(server);

        tracing::debug!(url = %url, "Connecting to LDAP server");

        let ldap_settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_secs(settings.timeout_secs))
            .set_no_tls_verify(settings.insecure_tls);

        let mut conn = LdapConn::with_settings(ldap_settings, &url).map_err(|e| {
            tracing::error!(url = %url, error = %e, "LDAP connection failed");
            AppError::LdapError(format!("Failed to connect to {}: {}", url, e))
        })?;

        if let (Some(bind_dn), Some(password)) = (&settings.bind_dn, &settings.bind_password) {
            tracing::debug!(bind_dn = %bind_dn, "Performing LDAP bind");
            let res = conn.simple_bind(bind_dn, password)?;
            if res.rc == RC_INVALID_CREDENTIALS {
                return Err(AppError::AuthenticationFailed(format!(
                    "invalid credentials for {}",
                    bind_dn
                )));
            }
            res.success()
                .map_err(|e| AppError::AuthenticationFailed(e.to_string()))?;
        }

        tracing::info!(url = %url, "LDAP connection established");

        Ok(Self {
            conn,
            url,
            secure: settings.use_ldaps,
            contexts: None,
        })
    }

    fn check(res: LdapResult, dn: &str) -> AppResult<()> {
        match res.rc {
            RC_SUCCESS => Ok(()),
            RC_NO_SUCH_OBJECT => Err(AppError::ObjectNotFound(dn.to_string())),
            _ => {
                let rc = res.rc;
                res.success().map(|_| ()).map_err(|e| {
                    tracing::error!(dn = dn, rc = rc, error = %e, "LDAP operation failed");
                    AppError::LdapError(format!("{}: {}", dn, e))
                })
            }
        }
    }

    fn entry_to_result(entry: SearchEntry) -> SearchResult {
        let mut result = SearchResult::new(entry.dn);
        for (name, values) in entry.attrs {
            result.insert(&name, values);
        }
        result
    }

    fn to_ldap_scope(scope: SearchScope) -> Scope {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }
}

impl Directory for LdapDirectory {
    fn naming_contexts(&mut self) -> AppResult<NamingContexts> {
        if let Some(contexts) = &self.contexts {
            return Ok(contexts.clone());
        }

        let rows = self.search(
            "",
            "(objectClass=*)",
            &[
                "defaultNamingContext",
                "configurationNamingContext",
                "schemaNamingContext",
                "rootDomainNamingContext",
                "dnsHostName",
            ],
            SearchScope::Base,
        )?;
        let root_dse = rows
            .first()
            .ok_or_else(|| AppError::LdapError(format!("RootDSE not readable on {}", self.url)))?;

        let default = root_dse
            .get("defaultNamingContext")
            .cloned()
            .ok_or_else(|| AppError::LdapError("defaultNamingContext missing from RootDSE".to_string()))?;

        let mut contexts = NamingContexts::from_default_dn(&default);
        if let Some(config) = root_dse.get("configurationNamingContext") {
            contexts.configuration = config.clone();
        }
        if let Some(schema) = root_dse.get("schemaNamingContext") {
            contexts.schema = schema.clone();
        }
        if let Some(root) = root_dse.get("rootDomainNamingContext") {
            contexts.root_domain = root.clone();
        }
        contexts.dns_host_name = root_dse.get("dnsHostName").cloned();

        self.contexts = Some(contexts.clone());
        Ok(contexts)
    }

    fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&str],
        scope: SearchScope,
    ) -> AppResult<Vec<SearchResult>> {
        tracing::info!(
            base_dn = base_dn,
            filter = filter,
            scope = ?scope,
            "LDAP SEARCH: Starting query"
        );

        let attrs: Vec<String> = attributes.iter().map(|a| a.to_string()).collect();

        // Paging control is pointless (and refused on RootDSE) for base searches
        if scope == SearchScope::Base {
            let ldap3::SearchResult(entries, res) =
                self.conn.search(base_dn, Scope::Base, filter, attrs)?;
            Self::check(res, base_dn)?;
            return Ok(entries
                .into_iter()
                .map(|e| Self::entry_to_result(SearchEntry::construct(e)))
                .collect());
        }

        let adapters: Vec<Box<dyn Adapter<_, _>>> = vec![
            Box::new(EntriesOnly::new()),
            Box::new(PagedResults::new(PAGE_SIZE)),
        ];
        let mut stream = self.conn.streaming_search_with(
            adapters,
            base_dn,
            Self::to_ldap_scope(scope),
            filter,
            attrs,
        )?;

        let mut results = Vec::new();
        while let Some(entry) = stream.next()? {
            results.push(Self::entry_to_result(SearchEntry::construct(entry)));
        }
        Self::check(stream.result(), base_dn)?;

        tracing::info!(
            base_dn = base_dn,
            result_count = results.len(),
            "LDAP search completed"
        );
        Ok(results)
    }

    fn set_account_control(&mut self, dn: &str, flags: AccountControl) -> AppResult<()> {
        let value = flags.to_string();
        let res = self.conn.modify(
            dn,
            vec![Mod::Replace("userAccountControl", HashSet::from([value.as_str()]))],
        )?;
        Self::check(res, dn)
    }

    fn create_user(&mut self, user: &NewUser) -> AppResult<String> {
        // AD only accepts unicodePwd over an encrypted connection
        if !self.secure {
            return Err(AppError::ConfigError(
                "setting passwords requires an LDAPS connection (--ldaps)".to_string(),
            ));
        }

        let dn = user.distinguished_name();
        let attrs = user_add_attributes(user)?;

        tracing::debug!(dn = %dn, sam = %user.sam_account_name, "Creating user");
        let res = self.conn.add(&dn, attrs)?;
        Self::check(res, &dn)?;
        Ok(dn)
    }

    fn delete_object(&mut self, dn: &str, recursive: bool) -> AppResult<()> {
        let res = if recursive {
            self.conn
                .with_controls(RawControl {
                    ctype: LDAP_SERVER_TREE_DELETE_OID.to_string(),
                    crit: true,
                    val: None,
                })
                .delete(dn)?
        } else {
            self.conn.delete(dn)?
        };
        Self::check(res, dn)
    }
}

impl Drop for LdapDirectory {
    fn drop(&mut self) {
        if let Err(e) = self.conn.unbind() {
            tracing::debug!(error = %e, "LDAP unbind failed");
        }
    }
}

/// Encode a password for `unicodePwd`: quoted, UTF-16LE
pub fn encode_ad_password(password: &str) -> AppResult<Vec<u8>> {
    if password.is_empty() {
        return Err(AppError::InvalidInput("Password cannot be empty".to_string()));
    }

    let quoted = format!("\"{password}\"");
    Ok(quoted.encode_utf16().flat_map(u16::to_le_bytes).collect())
}

/// Attribute list for the LDAP add of a new, enabled user
fn user_add_attributes(user: &NewUser) -> AppResult<Vec<(Vec<u8>, HashSet<Vec<u8>>)>> {
    fn attr(name: &str, values: &[&str]) -> (Vec<u8>, HashSet<Vec<u8>>) {
        (
            name.as_bytes().to_vec(),
            values.iter().map(|v| v.as_bytes().to_vec()).collect(),
        )
    }

    let uac = AccountControl::enabled_user().to_string();
    let mut attrs = vec![
        attr("objectClass", &["top", "person", "organizationalPerson", "user"]),
        attr("cn", &[user.common_name.as_str()]),
        attr("sAMAccountName", &[user.sam_account_name.as_str()]),
        attr("userPrincipalName", &[user.user_principal_name.as_str()]),
        attr("displayName", &[user.display_name.as_str()]),
        attr("givenName", &[user.given_name.as_str()]),
        attr("sn", &[user.surname.as_str()]),
        attr("userAccountControl", &[uac.as_str()]),
        (
            b"unicodePwd".to_vec(),
            HashSet::from([encode_ad_password(&user.password)?]),
        ),
    ];
    if let Some(description) = user.description.as_deref().filter(|d| !d.is_empty()) {
        attrs.push(attr("description", &[description]));
    }
    if user.change_password_at_logon {
        attrs.push(attr("pwdLastSet", &["0"]));
    }
    Ok(attrs)
}
