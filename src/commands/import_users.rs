//! `import-users`: create user accounts from a CSV file
//!
//! Every row stands alone: a bad row or a rejected creation is reported
//! with its line number and the next row is processed.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use super::Console;
use crate::error::{AppError, AppResult};
use crate::infrastructure::tabular::{
    parse_delimiter, read_user_rows, ImportRecord, ImportResultRecord, ReportWriter,
    IMPORT_REPORT_HEADERS,
};
use crate::infrastructure::{new_user_from_row, Directory};

#[derive(Debug, Clone, Args)]
pub struct ImportUsersArgs {
    /// CSV file with DisplayName, SamAccountName, UserPrincipalName,
    /// GivenName, Surname, Path and Password columns
    #[arg(long)]
    pub csv: PathBuf,

    /// Field delimiter (a single character, or "tab")
    #[arg(long, default_value = ",", value_parser = parse_delimiter)]
    pub delimiter: u8,

    /// Require a password change at first logon
    #[arg(long)]
    pub change_password_at_logon: bool,

    /// Write a per-row result CSV here
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub created_count: usize,
    pub failed_count: usize,
    pub results: Vec<ImportResultRecord>,
}

/// Create one user per record.
///
/// With a report, each result row is written as soon as its account has
/// been handled.
pub fn import_users(
    dir: &mut dyn Directory,
    console: Console,
    records: Vec<ImportRecord>,
    change_password_at_logon: bool,
    mut report: Option<&mut ReportWriter>,
) -> AppResult<ImportSummary> {
    let mut results = Vec::with_capacity(records.len());

    for record in records {
        let sam = record
            .row
            .as_ref()
            .map(|r| r.sam_account_name.trim().to_string())
            .unwrap_or_default();

        let created = record.row.map_err(AppError::InvalidInput).and_then(|row| {
            let user = new_user_from_row(&row, change_password_at_logon)?;
            dir.create_user(&user)
        });

        let result = match created {
            Ok(dn) => {
                tracing::info!(line = record.line, sam = %sam, dn = %dn, "Created user");
                console.line(format!("Line {}: created {}", record.line, dn));
                ImportResultRecord {
                    line: record.line,
                    sam_account_name: sam,
                    status: "Created".to_string(),
                    distinguished_name: dn,
                    error: String::new(),
                }
            }
            Err(e) => {
                tracing::error!(line = record.line, sam = %sam, error = %e, "Failed to create user");
                console.line(format!("Line {}: FAILED {}: {}", record.line, sam, e));
                ImportResultRecord {
                    line: record.line,
                    sam_account_name: sam,
                    status: "Failed".to_string(),
                    distinguished_name: String::new(),
                    error: e.to_string(),
                }
            }
        };
        if let Some(report) = report.as_deref_mut() {
            report.append(&result)?;
        }
        results.push(result);
    }

    let created_count = results.iter().filter(|r| r.status == "Created").count();
    Ok(ImportSummary {
        created_count,
        failed_count: results.len() - created_count,
        results,
    })
}

/// Entry point for the subcommand
pub fn execute(args: &ImportUsersArgs, dir: &mut dyn Directory, console: Console) -> AppResult<()> {
    let records = read_user_rows(&args.csv, args.delimiter)?;
    tracing::info!(file = %args.csv.display(), rows = records.len(), "Importing users");

    let mut report = match &args.report {
        Some(path) => Some(ReportWriter::create(path, IMPORT_REPORT_HEADERS)?),
        None => None,
    };

    let summary = import_users(
        dir,
        console,
        records,
        args.change_password_at_logon,
        report.as_mut(),
    )?;

    console.finish(
        &summary,
        &format!(
            "Created {} user(s), {} failed",
            summary.created_count, summary.failed_count
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::tabular::read_user_rows_from;
    use crate::testing::FakeDirectory;

    const CSV: &str = "DisplayName,SamAccountName,UserPrincipalName,GivenName,Surname,Path,Password\n\
        Anna Smith,asmith,asmith@contoso.com,Anna,Smith,\"OU=Staff,DC=contoso,DC=com\",Pa55word!\n\
        No Path,npath,npath@contoso.com,No,Path,,Pa55word!\n\
        Bob Jones,bjones,bjones@contoso.com,Bob,Jones,\"OU=Staff,DC=contoso,DC=com\",Pa55word!\n\
        Carl Berg,cberg,cberg@contoso.com,Carl,Berg,\"OU=Staff,DC=contoso,DC=com\",Pa55word!\n";

    #[test]
    fn test_failed_rows_do_not_stop_the_import() {
        let mut dir = FakeDirectory::with_domain("DC=contoso,DC=com");
        dir.fail_on("CN=Bob Jones,OU=Staff,DC=contoso,DC=com");
        let records = read_user_rows_from(CSV.as_bytes(), b',').unwrap();

        let summary = import_users(&mut dir, Console::default(), records, false, None).unwrap();

        assert_eq!(summary.created_count, 2);
        assert_eq!(summary.failed_count, 2);
        assert_eq!(
            dir.created,
            vec![
                "CN=Anna Smith,OU=Staff,DC=contoso,DC=com".to_string(),
                "CN=Carl Berg,OU=Staff,DC=contoso,DC=com".to_string(),
            ]
        );

        let no_path = &summary.results[1];
        assert_eq!(no_path.line, 3);
        assert_eq!(no_path.status, "Failed");
        assert!(no_path.error.contains("Path"));

        let bob = &summary.results[2];
        assert_eq!(bob.sam_account_name, "bjones");
        assert!(bob.error.contains("insufficient rights"));
    }

    #[test]
    fn test_unparseable_row_is_reported_with_its_line() {
        let csv = "DisplayName,SamAccountName,UserPrincipalName,GivenName,Surname,Path,Password\n\
                   too,few\n";
        let mut dir = FakeDirectory::with_domain("DC=contoso,DC=com");
        let records = read_user_rows_from(csv.as_bytes(), b',').unwrap();

        let summary = import_users(&mut dir, Console::default(), records, false, None).unwrap();
        assert_eq!(summary.failed_count, 1);
        assert_eq!(summary.results[0].line, 2);
        assert!(dir.created.is_empty());
    }

    #[test]
    fn test_duplicate_account_fails_only_that_row() {
        let csv = "DisplayName,SamAccountName,UserPrincipalName,GivenName,Surname,Path,Password\n\
                   Anna Smith,asmith,asmith@contoso.com,Anna,Smith,\"OU=Staff,DC=contoso,DC=com\",x\n\
                   Anna Smith,asmith2,asmith2@contoso.com,Anna,Smith,\"OU=Staff,DC=contoso,DC=com\",x\n";
        let mut dir = FakeDirectory::with_domain("DC=contoso,DC=com");
        let records = read_user_rows_from(csv.as_bytes(), b',').unwrap();

        let summary = import_users(&mut dir, Console::default(), records, true, None).unwrap();
        assert_eq!(summary.created_count, 1);
        assert_eq!(summary.results[1].status, "Failed");
    }

    fn args(csv: PathBuf, report: Option<PathBuf>) -> ImportUsersArgs {
        ImportUsersArgs {
            csv,
            delimiter: b',',
            change_password_at_logon: false,
            report,
        }
    }

    #[test]
    fn test_report_is_written_row_by_row() {
        let tmp = tempfile::tempdir().unwrap();
        let csv_path = tmp.path().join("users.csv");
        let report_path = tmp.path().join("result.csv");
        std::fs::write(&csv_path, CSV).unwrap();
        let mut dir = FakeDirectory::with_domain("DC=contoso,DC=com");

        execute(&args(csv_path, Some(report_path.clone())), &mut dir, Console::default()).unwrap();

        let mut reader = csv::Reader::from_path(&report_path).unwrap();
        let statuses: Vec<String> = reader
            .records()
            .map(|r| r.unwrap()[2].to_string())
            .collect();
        assert_eq!(statuses, vec!["Created", "Failed", "Created", "Created"]);
    }

    #[test]
    fn test_unwritable_report_creates_no_users() {
        let tmp = tempfile::tempdir().unwrap();
        let csv_path = tmp.path().join("users.csv");
        std::fs::write(&csv_path, CSV).unwrap();
        let report_path = tmp.path().join("missing").join("result.csv");
        let mut dir = FakeDirectory::with_domain("DC=contoso,DC=com");

        let err = execute(&args(csv_path, Some(report_path)), &mut dir, Console::default()).unwrap_err();

        assert!(matches!(err, AppError::IoError(_)));
        assert!(dir.created.is_empty());
    }
}
