use clap::Parser;
use dirsort::cli::{Cli, run};
use dirsort::output::print_fatal;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            print_fatal(&format!("Error: {}", e));
            ExitCode::from(e.exit_code())
        }
    }
}
