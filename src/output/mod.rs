//! Result reporting.

mod reporter;
mod types;

pub use reporter::{JsonReporter, Reporter, SPEC_VERSION, TextReporter, reporter_for};
pub use types::{OutputFormat, Outcome, PhotoReport};
