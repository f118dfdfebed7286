//! Output formatting for CLI.

mod json;

pub use json::{timestamp, JsonOutput};
