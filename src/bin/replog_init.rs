//! Replica storage initialization tool: marks the store at the given path
//! as a voting member of a fresh replica group.

use std::path::PathBuf;
use std::process::exit;

use clap::Parser;

use env_logger::Env;

use tokio::runtime::Builder;

use replog::{initialize, pf_error, pf_info, RepLogError};

/// Command line arguments definition.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Path to the replica's durable store.
    #[arg(short, long)]
    path: PathBuf,
}

// Initialization tool main entrance.
fn init_main() -> Result<(), RepLogError> {
    let args = CliArgs::parse();

    let runtime = Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(initialize(&args.path))?;

    pf_info!("init"; "initialized replica store at '{}'",
                     args.path.display());
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .init();

    if let Err(e) = init_main() {
        pf_error!("init"; "initialization failed: {}", e);
        exit(1);
    }
}
