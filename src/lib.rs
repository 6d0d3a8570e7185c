pub mod cli;
pub mod commands;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod logging;

#[cfg(test)]
mod testing;
