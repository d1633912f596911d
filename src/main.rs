use clap::Parser;
use ratiotrader::cli::{run, Cli};
use ratiotrader::logging;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.json_logs);
    run(cli)
}
