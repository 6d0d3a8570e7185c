//! Operator prompts
//!
//! Procedures ask for confirmation through [`Prompter`] so tests can script
//! the answers and `--force` runs can prove no question was asked.

use std::io::IsTerminal;

use dialoguer::{Confirm, Input};

use crate::error::{AppError, AppResult};

pub trait Prompter {
    /// Yes/no question; `default` is used when the operator just presses enter
    fn confirm(&mut self, prompt: &str, default: bool) -> AppResult<bool>;

    /// Free text answer, returned untrimmed
    fn read_text(&mut self, prompt: &str) -> AppResult<String>;
}

/// Checks if both stdin and stderr are connected to a terminal
pub fn is_interactive_terminal() -> bool {
    std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
}

/// Interactive prompts on the controlling terminal
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn require_interactive(&self) -> AppResult<()> {
        if !is_interactive_terminal() {
            return Err(AppError::PromptError(
                "confirmation needed but no terminal is attached; rerun with --force".to_string(),
            ));
        }
        Ok(())
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&mut self, prompt: &str, default: bool) -> AppResult<bool> {
        self.require_interactive()?;
        Ok(Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?)
    }

    fn read_text(&mut self, prompt: &str) -> AppResult<String> {
        self.require_interactive()?;
        Ok(Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?)
    }
}
