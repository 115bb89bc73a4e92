use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use armarchive::cli::{Cli, GlobalArgs, run};

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.global);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

/// Verbosity flags pick the default filter; `RUST_LOG` wins when set.
fn init_logging(global: &GlobalArgs) {
    let default = if global.quiet {
        "armarchive=warn"
    } else if global.verbose {
        "armarchive=debug"
    } else {
        "armarchive=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
