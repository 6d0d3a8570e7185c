//! Command-line definition and dispatch

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::commands::cleanup_metadata::CleanupMetadataArgs;
use crate::commands::disable_inactive::DisableInactiveArgs;
use crate::commands::import_users::ImportUsersArgs;
use crate::commands::seize_roles::SeizeRolesArgs;
use crate::commands::{self, Console};
use crate::error::AppResult;
use crate::infrastructure::{connect, ConnectionSettings};

/// Active Directory recovery and account maintenance
#[derive(Debug, Parser)]
#[command(name = "adops")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Directory for adops.log (default: next to the executable)
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Print the result summary as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Also log to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Args)]
pub struct ConnectionArgs {
    /// Domain controller or domain DNS name (uses LDAP instead of ADSI)
    #[arg(long, env = "ADOPS_SERVER", global = true)]
    pub server: Option<String>,

    #[arg(long, env = "ADOPS_PORT", global = true)]
    pub port: Option<u16>,

    /// Connect with ldaps:// (required for creating users over LDAP)
    #[arg(long, env = "ADOPS_LDAPS", global = true)]
    pub ldaps: bool,

    /// Accept any server certificate
    #[arg(long, global = true)]
    pub insecure_tls: bool,

    #[arg(long, env = "ADOPS_BIND_DN", global = true)]
    pub bind_dn: Option<String>,

    #[arg(long, env = "ADOPS_BIND_PASSWORD", hide_env_values = true, global = true)]
    pub bind_password: Option<String>,

    /// Connection timeout in seconds
    #[arg(long, default_value_t = 30, global = true)]
    pub timeout_secs: u64,
}

impl From<&ConnectionArgs> for ConnectionSettings {
    fn from(args: &ConnectionArgs) -> Self {
        ConnectionSettings {
            server: args.server.clone(),
            port: args.port,
            use_ldaps: args.ldaps,
            insecure_tls: args.insecure_tls,
            bind_dn: args.bind_dn.clone(),
            bind_password: args.bind_password.clone(),
            timeout_secs: args.timeout_secs,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Seize FSMO roles from unreachable domain controllers
    SeizeRoles(SeizeRolesArgs),

    /// Delete the leftover objects of a decommissioned domain controller
    CleanupMetadata(CleanupMetadataArgs),

    /// Create user accounts from a CSV file
    ImportUsers(ImportUsersArgs),

    /// Disable accounts without a recent logon and write a report
    DisableInactive(DisableInactiveArgs),
}

/// Connect and run the selected subcommand
pub fn run(cli: &Cli) -> AppResult<()> {
    let settings = ConnectionSettings::from(&cli.connection);
    let mut dir = connect(&settings)?;
    let console = Console { json: cli.json };

    match &cli.command {
        Commands::SeizeRoles(args) => commands::seize_roles::execute(args, dir.as_mut(), console),
        Commands::CleanupMetadata(args) => {
            commands::cleanup_metadata::execute(args, dir.as_mut(), console)
        }
        Commands::ImportUsers(args) => commands::import_users::execute(args, dir.as_mut(), console),
        Commands::DisableInactive(args) => {
            commands::disable_inactive::execute(args, dir.as_mut(), console)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FsmoRole;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_seize_roles() {
        let cli = Cli::try_parse_from([
            "adops",
            "--server",
            "dc1.contoso.com",
            "seize-roles",
            "--target",
            "DC3",
            "--roles",
            "pdc,rid",
            "--force",
        ])
        .unwrap();

        assert_eq!(cli.connection.server.as_deref(), Some("dc1.contoso.com"));
        match cli.command {
            Commands::SeizeRoles(args) => {
                assert_eq!(args.roles, vec![FsmoRole::PdcEmulator, FsmoRole::RidMaster]);
                assert!(args.force);
                assert_eq!(args.ntdsutil, PathBuf::from("ntdsutil.exe"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_import_users_delimiter() {
        let cli = Cli::try_parse_from([
            "adops",
            "import-users",
            "--csv",
            "users.csv",
            "--delimiter",
            ";",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::ImportUsers(args) => assert_eq!(args.delimiter, b';'),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_disable_inactive_defaults() {
        let cli = Cli::try_parse_from(["adops", "disable-inactive"]).unwrap();
        match cli.command {
            Commands::DisableInactive(args) => {
                assert_eq!(args.days, 90);
                assert!(!args.what_if);
                assert!(args.report.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(Cli::try_parse_from(["adops", "disable-inactive", "--days", "0"]).is_err());
        assert!(Cli::try_parse_from(["adops", "disable-inactive", "--days", "36501"]).is_err());
        assert!(Cli::try_parse_from(["adops", "disable-inactive", "--days", "36500"]).is_ok());
    }

    #[test]
    fn test_cleanup_requires_controller() {
        assert!(Cli::try_parse_from(["adops", "cleanup-metadata"]).is_err());
    }
}
