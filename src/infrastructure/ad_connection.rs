//! Active Directory connection settings and backend selection
//!
//! With an explicit `--server` the LDAP client is used on every platform.
//! Without one, Windows falls back to ADSI with the logged-on user's
//! credentials; other platforms have nothing to fall back to.

use super::directory::Directory;
use super::ldap_directory::LdapDirectory;
use crate::error::{AppError, AppResult};

pub const LDAP_PORT: u16 = 389;
pub const LDAPS_PORT: u16 = 636;

/// How to reach the directory
#[derive(Clone, Default)]
pub struct ConnectionSettings {
    /// Domain controller or domain DNS name
    pub server: Option<String>,
    pub port: Option<u16>,
    pub use_ldaps: bool,
    pub insecure_tls: bool,
    pub bind_dn: Option<String>,
    pub bind_password: Option<String>,
    pub timeout_secs: u64,
}

impl ConnectionSettings {
    pub fn validate(&self) -> AppResult<()> {
        if self.bind_dn.is_some() != self.bind_password.is_some() {
            return Err(AppError::ConfigError(
                "--bind-dn and --bind-password must be given together".to_string(),
            ));
        }
        if self.server.is_none() && !cfg!(windows) {
            return Err(AppError::ConfigError(
                "--server is required on this platform (ADSI is only available on Windows)"
                    .to_string(),
            ));
        }
        if self.server.is_none() && self.bind_dn.is_some() {
            return Err(AppError::ConfigError(
                "--bind-dn needs --server; ADSI always uses the current Windows credentials"
                    .to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(AppError::ConfigError("--timeout-secs must be positive".to_string()));
        }
        Ok(())
    }

    pub fn effective_port(&self) -> u16 {
        self.port
            .unwrap_or(if self.use_ldaps { LDAPS_PORT } else { LDAP_PORT })
    }

    pub fn ldap_url(&self, server: &str) -> String {
        let scheme = if self.use_ldaps { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, server, self.effective_port())
    }
}

// Password stays out of logs
impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("server", &self.server)
            .field("port", &self.effective_port())
            .field("use_ldaps", &self.use_ldaps)
            .field("insecure_tls", &self.insecure_tls)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &self.bind_password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Open a directory connection for the given settings.
pub fn connect(settings: &ConnectionSettings) -> AppResult<Box<dyn Directory>> {
    settings.validate()?;
    tracing::debug!(settings = ?settings, "Opening directory connection");

    if settings.server.is_some() {
        return Ok(Box::new(LdapDirectory::connect(settings)?));
    }

    #[cfg(windows)]
    {
        let adsi = super::adsi_directory::AdsiDirectory::connect()?;
        Ok(Box::new(adsi))
    }

    #[cfg(not(windows))]
    {
        Err(AppError::NotConnected)
    }
}
