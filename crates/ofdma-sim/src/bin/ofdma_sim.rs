use std::path::PathBuf;

use anyhow::{Context, Result};
use ofdma_sim::{Scenario, Simulation};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .compact()
        .with_writer(std::io::stderr)
        .init();

    ofdma_scheduler::init();

    let mut args = std::env::args().skip(1);
    let mut path = None;
    let mut rounds = None;
    let mut pretty = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--rounds" => {
                let value = args.next().context("Missing --rounds value")?;
                rounds = Some(value.parse::<usize>().context("--rounds must be a number")?);
            }
            "--pretty" => pretty = true,
            "-h" | "--help" => {
                eprintln!("usage: ofdma-sim <scenario.toml> [--rounds N] [--pretty]");
                return Ok(());
            }
            other => path = Some(PathBuf::from(other)),
        }
    }

    let path = path.context("Missing scenario file")?;
    let mut scenario = Scenario::load(&path)?;
    if let Some(rounds) = rounds {
        scenario.rounds = rounds;
    }

    let report = Simulation::new(&scenario)?.run();
    let json = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");
    Ok(())
}
