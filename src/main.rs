use clap::Parser;
use hindcast::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
