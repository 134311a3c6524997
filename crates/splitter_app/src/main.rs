mod platform;

use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let args = platform::Args::parse();
    match platform::run_app(args) {
        Ok(outcome) => outcome.exit_code(),
        Err(err) => {
            eprintln!("splitter: {err:#}");
            ExitCode::FAILURE
        }
    }
}
