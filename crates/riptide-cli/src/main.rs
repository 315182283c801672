//! External CLI contract surface: argument parsing and config validation
//! only. File I/O, socket I/O, and handshake orchestration are outside
//! this crate's scope.

mod config;

use clap::Parser;
use config::{Args, Config};

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    match Config::try_from(args) {
        Ok(cfg) => {
            tracing::info!(src = %cfg.src, dest = %cfg.dest, mtu = cfg.mtu, "riptide config resolved");
            if cfg.dry_run {
                println!("dry run: {:?}", cfg);
            }
        }
        Err(e) => {
            eprintln!("riptide: {e}");
            std::process::exit(1);
        }
    }
}
