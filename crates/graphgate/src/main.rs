//! graphgate entry point

use std::process::ExitCode;

use clap::Parser;

use graphgate::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.init_tracing();

    match graphgate::run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
