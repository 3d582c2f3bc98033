use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match busgated::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let mut stderr = io::stderr().lock();
            // Telemetry may not be installed yet, so report on stderr directly.
            let _ = writeln!(stderr, "busgated: {error}");
            ExitCode::FAILURE
        }
    }
}
