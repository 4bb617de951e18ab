use clap::{Parser, Subcommand};

mod common;
mod platforms;
mod probe;
mod send;

#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(name = "netapi")]
struct Cli {
    #[command(flatten)]
    common: common::CommonArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the device answers HTTP at all
    Probe(probe::ProbeArgs),
    /// Open a session, send one request and print the reply
    Send(send::SendArgs),
    /// List the built-in platform identifiers
    Platforms,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.common.init_logging();

    match cli.command {
        Commands::Probe(probe) => probe.run(&cli.common),
        Commands::Send(send) => send.run(&cli.common),
        Commands::Platforms => {
            platforms::run();
            Ok(())
        }
    }
}
