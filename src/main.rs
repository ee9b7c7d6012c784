use clap::Parser;
use stockrank::cli::{run, Cli};
use stockrank::logging::init_logging;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(cli)
}
