//! Devour - build orchestration with watch mode

use std::process::ExitCode;

fn main() -> ExitCode {
    match devour::cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
