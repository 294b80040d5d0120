use std::io::{self, Write};
use std::process::ExitCode;

use ytproxyd::LaunchError;

fn main() -> ExitCode {
    match ytproxyd::run_server() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            // Help, version and usage errors are rendered by clap with its
            // own exit codes.
            if let LaunchError::Config { source } = &error
                && let Some(clap_error) = source.as_clap()
            {
                clap_error.exit();
            }
            // Nothing further can be reported if stderr is gone.
            writeln!(io::stderr(), "ytproxyd: {error}").ok();
            ExitCode::FAILURE
        }
    }
}
