/// Main entry point for workctl
///
/// Thin wrapper; the application logic lives in `interfaces::cli`.

use std::process::ExitCode;
use workctl::interfaces::cli;

#[tokio::main]
async fn main() -> ExitCode {
    cli::run().await
}
