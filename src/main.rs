//! dgspec - Project dependency graph tool

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = dgspec::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
