//! optix command-line executable.

use anyhow::Result;
use clap::Parser;
use optix::cli::{run_cli, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    run_cli(cli)
}
