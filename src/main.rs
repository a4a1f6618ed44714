mod cli;

use clap::Parser;
use cli::app::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli::app::init_logging(cli.verbose);
    cli::app::run(cli)
}
