//! Output formatting module.

mod formatter;
mod human;
mod json;

pub use formatter::OutputFormatter;

use human::HumanFormatter;
use json::JsonFormatter;

/// Creates an output formatter based on CLI flags.
///
/// `to_stderr` keeps stdout free when it carries the archive itself.
pub fn create_formatter(
    json: bool,
    verbose: bool,
    quiet: bool,
    to_stderr: bool,
) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter::new(to_stderr))
    } else {
        Box::new(HumanFormatter::new(verbose, quiet, to_stderr))
    }
}
