mod cli;
mod exit_codes;
mod ui;

use clap::Parser;
use cli::args::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    let code = cli::dispatch::run(cli).await;
    std::process::exit(code);
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.silent {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);

    if let Some(log_path) = &cli.log {
        if let Ok(file) = std::fs::OpenOptions::new().create(true).append(true).open(log_path) {
            let _ = subscriber.with_writer(move || file.try_clone().expect("cloneable log file handle")).try_init();
            return;
        }
    }
    let _ = subscriber.try_init();
}
