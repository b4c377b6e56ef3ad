//! rsct - Reed-Solomon container tool
//!
//! Packs files into burst-tolerant FEC containers and reconstructs them.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;

use rsct_frame::prelude::*;
use rsct_tools::{inspect, init_logging, GlobalConfig, InspectConfig, PackConfig, Packer, Profile};
use rsct_tools::{UnpackConfig, Unpacker};

/// Reed-Solomon container tool
#[derive(Parser)]
#[command(name = "rsct")]
#[command(about = "Pack and unpack Reed-Solomon protected containers")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a file into a container
    Pack(PackConfig),
    /// Reconstruct a file from a container
    Unpack(UnpackConfig),
    /// Describe a container
    Inspect(InspectConfig),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.global);

    let profile = Profile::load(cli.global.config.as_deref())?;
    debug!("Profile: {:?}", profile);

    match cli.command {
        Commands::Pack(config) => {
            let mut packer = Packer::new(config, &profile.pack, cli.global.verbose);
            if packer.run()?.is_cancelled() {
                eprintln!("cancelled");
            }
        }
        Commands::Unpack(config) => {
            let mut unpacker = Unpacker::new(config, &profile.unpack, cli.global.verbose);
            let (completion, stats) = unpacker.run()?;
            if completion == Completion::Cancelled {
                eprintln!("cancelled");
            }
            println!("{}", unpacker.render(&stats)?);
        }
        Commands::Inspect(config) => {
            let summary = inspect::summarize(&config)?;
            print!("{}", inspect::render(&summary, config.records));
        }
    }

    Ok(())
}
