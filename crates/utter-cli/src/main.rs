mod app;
mod cli;
mod render;

use clap::Parser;
use tracing::info;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run() -> anyhow::Result<()> {
    let cli = cli::GlobalCli::parse();
    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(verbose = cli.verbose, quiet = cli.quiet, "starting utter CLI");

    let app = app::App::open(&cli)?;
    app.run(cli.command).await
}
