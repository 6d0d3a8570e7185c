//! ntdsutil role seizure
//!
//! Each seizure runs ntdsutil once with a generated command script on stdin.
//! The script connects to the target controller and seizes a single role.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::domain::FsmoRole;
use crate::error::{AppError, AppResult};

pub const DEFAULT_NTDSUTIL: &str = "ntdsutil.exe";

/// Printed by ntdsutil once the safe transfer failed and the seizure starts
const SEIZURE_MARKER: &str = "proceeding with seizure";
/// Printed after a completed operation, followed by the role list
const ROLE_LIST_MARKER: &str = "knows about";

/// Captured result of one tool run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub script_path: Option<PathBuf>,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Something that can move a role onto a target controller
pub trait RoleTransferTool {
    fn seize(&self, target: &str, role: FsmoRole) -> AppResult<ToolOutput>;
}

/// Command script for seizing one role onto `target`
pub fn seize_script(target: &str, role: FsmoRole) -> String {
    [
        "popups off".to_string(),
        "roles".to_string(),
        "connections".to_string(),
        format!("connect to server {}", target),
        "quit".to_string(),
        format!("seize {}", role.ntdsutil_verb()),
        "quit".to_string(),
        "quit".to_string(),
    ]
    .join("\r\n")
        + "\r\n"
}

/// Decide whether a seizure run succeeded from its captured output.
///
/// The safe-transfer attempt that precedes a seizure always reports an
/// `error 0x...` line when the holder is offline, so only the text after the
/// seizure marker counts.
pub fn check_seize_output(output: &ToolOutput) -> Result<(), String> {
    if output.exit_code != Some(0) {
        return Err(format!(
            "ntdsutil exited with {}",
            output
                .exit_code
                .map_or_else(|| "a signal".to_string(), |c| format!("code {}", c))
        ));
    }

    let lower = output.stdout.to_lowercase();
    let tail = lower
        .rfind(SEIZURE_MARKER)
        .map_or(lower.as_str(), |i| &lower[i + SEIZURE_MARKER.len()..]);

    if let Some(line) = tail.lines().find(|l| l.contains("error 0x")) {
        return Err(format!("ntdsutil reported: {}", line.trim()));
    }
    if !tail.contains(ROLE_LIST_MARKER) {
        return Err("ntdsutil did not report the resulting role holders".to_string());
    }
    Ok(())
}

/// Runs the real ntdsutil executable
#[derive(Debug, Clone)]
pub struct NtdsutilTool {
    pub executable: PathBuf,
    /// Where scripts are written; the system temp dir when None
    pub script_dir: Option<PathBuf>,
    /// Keep scripts on disk after the run for the audit trail
    pub keep_scripts: bool,
}

impl Default for NtdsutilTool {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_NTDSUTIL),
            script_dir: None,
            keep_scripts: false,
        }
    }
}

impl NtdsutilTool {
    fn write_script(&self, contents: &str) -> AppResult<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("adops-seize-").suffix(".txt");
        let mut file = match &self.script_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(contents.as_bytes())?;
        file.flush()?;
        Ok(file)
    }

    fn run(&self, script_path: &Path) -> AppResult<std::process::Output> {
        let stdin = File::open(script_path)?;
        Command::new(&self.executable)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                AppError::ToolFailed(format!(
                    "failed to start {}: {}",
                    self.executable.display(),
                    e
                ))
            })
    }
}

impl RoleTransferTool for NtdsutilTool {
    fn seize(&self, target: &str, role: FsmoRole) -> AppResult<ToolOutput> {
        let script = seize_script(target, role);
        let file = self.write_script(&script)?;

        tracing::info!(
            role = %role,
            target = target,
            script = %file.path().display(),
            "Running ntdsutil seizure"
        );
        let output = self.run(file.path())?;

        let script_path = if self.keep_scripts {
            let (_, path) = file.keep().map_err(|e| AppError::IoError(e.error))?;
            Some(path)
        } else {
            None
        };

        let result = ToolOutput {
            script_path,
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(role = %role, exit_code = ?result.exit_code, stdout = %result.stdout, "ntdsutil finished");
        Ok(result)
    }
}
