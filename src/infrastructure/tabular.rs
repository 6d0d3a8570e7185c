//! CSV input and report files
//!
//! User import rows are read one record at a time so a malformed row only
//! fails itself. Reports are plain CSV with PascalCase headers.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::domain::{InactiveAccount, UserRow};
use crate::error::{AppError, AppResult};

/// Columns every import file must carry
pub const REQUIRED_IMPORT_HEADERS: &[&str] = &[
    "DisplayName",
    "SamAccountName",
    "UserPrincipalName",
    "GivenName",
    "Surname",
    "Path",
    "Password",
];

/// One data row of an import file
#[derive(Debug)]
pub struct ImportRecord {
    /// 1-based line in the file (header = 1)
    pub line: u64,
    pub row: Result<UserRow, String>,
}

/// Parse an import delimiter argument (`,` `;` `tab` ...)
pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        v if v.len() == 1 && v.is_ascii() => Ok(v.as_bytes()[0]),
        v => Err(format!("delimiter must be a single ASCII character, got '{}'", v)),
    }
}

/// Read user rows from a CSV file
pub fn read_user_rows(path: &Path, delimiter: u8) -> AppResult<Vec<ImportRecord>> {
    let file = std::fs::File::open(path).map_err(|e| {
        AppError::InvalidInput(format!("cannot open {}: {}", path.display(), e))
    })?;
    read_user_rows_from(file, delimiter)
}

/// Read user rows from any reader.
///
/// A missing required header fails the whole file; anything wrong with a
/// single record is kept as that record's error.
pub fn read_user_rows_from<R: Read>(reader: R, delimiter: u8) -> AppResult<Vec<ImportRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let missing: Vec<&str> = REQUIRED_IMPORT_HEADERS
        .iter()
        .copied()
        .filter(|h| !headers.iter().any(|found| found == *h))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "import file is missing column(s): {}",
            missing.join(", ")
        )));
    }

    let mut records = Vec::new();
    for (index, result) in rdr.records().enumerate() {
        // Header is line 1; fall back to the index when csv has no position
        let fallback_line = index as u64 + 2;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map_or(fallback_line, |p| p.line());
                records.push(ImportRecord {
                    line,
                    row: Err(e.to_string()),
                });
                continue;
            }
        };
        let line = record.position().map_or(fallback_line, |p| p.line());
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let row = record
            .deserialize::<UserRow>(Some(&headers))
            .map_err(|e| e.to_string());
        records.push(ImportRecord { line, row });
    }

    tracing::debug!(rows = records.len(), "Read import file");
    Ok(records)
}

/// Report row for a disabled account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DisabledAccountRecord {
    pub sam_account_name: String,
    pub display_name: String,
    pub distinguished_name: String,
    /// ISO 8601, empty when the account never logged on
    pub last_logon: String,
    pub disabled_at: String,
}

impl DisabledAccountRecord {
    pub fn new(account: &InactiveAccount, disabled_at: DateTime<Utc>) -> Self {
        Self {
            sam_account_name: account.sam_account_name.clone(),
            display_name: account.display_name.clone().unwrap_or_default(),
            distinguished_name: account.distinguished_name.clone(),
            last_logon: account
                .last_logon
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            disabled_at: disabled_at.to_rfc3339(),
        }
    }
}

/// Report row for one import line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImportResultRecord {
    pub line: u64,
    pub sam_account_name: String,
    /// `Created` or `Failed`
    pub status: String,
    pub distinguished_name: String,
    pub error: String,
}

/// `DisabledAccounts_<yyyyMMdd>.csv`
pub fn default_report_name(date: NaiveDate) -> String {
    format!("DisabledAccounts_{}.csv", date.format("%Y%m%d"))
}

pub const DISABLED_REPORT_HEADERS: &[&str] = &[
    "SamAccountName",
    "DisplayName",
    "DistinguishedName",
    "LastLogon",
    "DisabledAt",
];

pub const IMPORT_REPORT_HEADERS: &[&str] =
    &["Line", "SamAccountName", "Status", "DistinguishedName", "Error"];

/// CSV report written one row at a time.
///
/// The header goes out on creation and every row is flushed as soon as it
/// is appended, so the file on disk always matches the work done so far.
pub struct ReportWriter<W: Write = File> {
    wtr: csv::Writer<W>,
    rows: usize,
}

impl ReportWriter<File> {
    /// Create (or truncate) the report file and write its header
    pub fn create(path: &Path, headers: &[&str]) -> AppResult<Self> {
        let file = File::create(path).map_err(|e| {
            AppError::IoError(io::Error::new(
                e.kind(),
                format!("cannot create report {}: {}", path.display(), e),
            ))
        })?;
        tracing::debug!(path = %path.display(), "Opened report");
        Self::from_writer(file, headers)
    }
}

impl<W: Write> ReportWriter<W> {
    pub fn from_writer(writer: W, headers: &[&str]) -> AppResult<Self> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        wtr.write_record(headers)?;
        wtr.flush()?;
        Ok(Self { wtr, rows: 0 })
    }

    pub fn append<T: Serialize>(&mut self, record: &T) -> AppResult<()> {
        self.wtr.serialize(record)?;
        self.wtr.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> AppResult<W> {
        self.wtr
            .into_inner()
            .map_err(|e| AppError::IoError(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const HEADER: &str = "DisplayName,SamAccountName,UserPrincipalName,GivenName,Surname,Path,Password";

    #[test]
    fn test_read_rows_keeps_bad_row_errors_local() {
        let data = format!(
            "{}\n\
             Anna Smith,asmith,asmith@contoso.com,Anna,Smith,\"OU=Staff,DC=contoso,DC=com\",Pa55word!\n\
             Broken,row\n\
             \n\
             Bob Jones,bjones,bjones@contoso.com,Bob,Jones,\"OU=Staff,DC=contoso,DC=com\",Pa55word!\n",
            HEADER
        );
        let records = read_user_rows_from(data.as_bytes(), b',').unwrap();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].line, 2);
        let anna = records[0].row.as_ref().unwrap();
        assert_eq!(anna.path, "OU=Staff,DC=contoso,DC=com");
        assert_eq!(anna.description, None);

        assert_eq!(records[1].line, 3);
        assert!(records[1].row.is_err());

        assert_eq!(records[2].row.as_ref().unwrap().sam_account_name, "bjones");
    }

    #[test]
    fn test_read_rows_with_semicolon_and_description() {
        let data = "DisplayName;SamAccountName;UserPrincipalName;GivenName;Surname;Path;Password;Description\n\
                    Anna Smith;asmith;asmith@contoso.com;Anna;Smith;OU=Staff,DC=contoso,DC=com;x;Accounting\n";
        let records = read_user_rows_from(data.as_bytes(), b';').unwrap();
        let row = records[0].row.as_ref().unwrap();
        assert_eq!(row.description.as_deref(), Some("Accounting"));
    }

    #[test]
    fn test_missing_header_fails_file() {
        let data = "DisplayName,SamAccountName\nAnna,asmith\n";
        let err = read_user_rows_from(data.as_bytes(), b',').unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(err.to_string().contains("Password"));
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(";"), Ok(b';'));
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert!(parse_delimiter(";;").is_err());
    }

    #[test]
    fn test_default_report_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(default_report_name(date), "DisabledAccounts_20240307.csv");
    }

    #[test]
    fn test_disabled_report_columns() {
        let account = InactiveAccount {
            sam_account_name: "asmith".into(),
            display_name: None,
            distinguished_name: "CN=Anna Smith,OU=Staff,DC=contoso,DC=com".into(),
            last_logon: None,
        };
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap();
        let mut report = ReportWriter::from_writer(Vec::new(), DISABLED_REPORT_HEADERS).unwrap();
        report.append(&DisabledAccountRecord::new(&account, at)).unwrap();
        assert_eq!(report.rows(), 1);
        let text = String::from_utf8(report.into_inner().unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("SamAccountName,DisplayName,DistinguishedName,LastLogon,DisabledAt")
        );
        assert_eq!(
            lines.next(),
            Some("asmith,,\"CN=Anna Smith,OU=Staff,DC=contoso,DC=com\",,2024-03-07T12:00:00+00:00")
        );
    }

    #[test]
    fn test_empty_report_has_header_only() {
        let report = ReportWriter::from_writer(Vec::new(), DISABLED_REPORT_HEADERS).unwrap();
        let out = report.into_inner().unwrap();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_report_rows_reach_disk_before_finish() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("report.csv");
        let mut report = ReportWriter::create(&path, IMPORT_REPORT_HEADERS).unwrap();
        report
            .append(&ImportResultRecord {
                line: 2,
                sam_account_name: "asmith".into(),
                status: "Created".into(),
                distinguished_name: "CN=Anna Smith,OU=Staff,DC=contoso,DC=com".into(),
                error: String::new(),
            })
            .unwrap();

        // Still open: the row is already readable
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().nth(1).unwrap().starts_with("2,asmith,Created,"));
    }

    #[test]
    fn test_report_in_missing_directory_fails_on_create() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("missing").join("report.csv");
        let err = ReportWriter::create(&path, DISABLED_REPORT_HEADERS).err().unwrap();
        assert!(matches!(err, AppError::IoError(_)));
        assert!(err.to_string().contains("report.csv"));
    }
}
