mod cli;
mod config;
mod error;
mod estimate;
mod input;
mod process;
mod sampler;
mod stats;
mod subsample;

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

use anyhow::Context;

fn main() -> anyhow::Result<()> {
    let cfg = cli::handle_cli().with_context(|| "Error processing command line arguments")?;
    process::process(&cfg)
}
