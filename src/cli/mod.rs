//! CLI argument parsing and command handling.

mod args;
pub mod classify;
pub mod help;
mod validators;

pub use args::{Cli, ClassifyArgs, Command, ConfigAction, ModelsAction, OnReject};
