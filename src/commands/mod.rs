//! Subcommands
//!
//! Each module holds the clap arguments for one procedure, the procedure
//! itself written against the infrastructure traits, and an `execute`
//! entry point that wires in the real implementations.

pub mod cleanup_metadata;
pub mod disable_inactive;
pub mod import_users;
pub mod seize_roles;

use serde::Serialize;

use crate::error::{AppError, AppResult};

/// Operator-facing console output
#[derive(Debug, Clone, Copy, Default)]
pub struct Console {
    pub json: bool,
}

impl Console {
    /// Status line; goes to stderr in JSON mode so stdout stays parseable
    pub fn line(&self, message: impl AsRef<str>) {
        if self.json {
            eprintln!("{}", message.as_ref());
        } else {
            println!("{}", message.as_ref());
        }
    }

    /// Print the final result as JSON or as a one-line text summary
    pub fn finish<T: Serialize>(&self, summary: &T, text: &str) -> AppResult<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(summary)?);
        } else {
            println!("{}", text);
        }
        Ok(())
    }

    /// Report a run that ended with an error.
    ///
    /// JSON mode prints `{"code": .., "message": ..}` on stdout in place of
    /// the summary; text mode prints `Error: ..` on stderr.
    pub fn fail(&self, err: &AppError) {
        let rendered = self.render_error(err);
        if self.json {
            println!("{}", rendered);
        } else {
            eprintln!("{}", rendered);
        }
    }

    fn render_error(&self, err: &AppError) -> String {
        if self.json {
            if let Ok(json) = serde_json::to_string_pretty(err) {
                return json;
            }
        }
        format!("Error: {}", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_rendering_follows_output_mode() {
        let err = AppError::NoOfflineRoles;

        let json: serde_json::Value =
            serde_json::from_str(&Console { json: true }.render_error(&err)).unwrap();
        assert_eq!(json["code"], "NO_OFFLINE_ROLES");
        assert_eq!(json["message"], err.to_string());

        assert_eq!(
            Console::default().render_error(&err),
            format!("Error: {}", err)
        );
    }
}
