//! esp - edit IP configuration BOM trees.

use std::process::ExitCode;

fn main() -> ExitCode {
    match espalier::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            espalier::ui::output::error(format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}
