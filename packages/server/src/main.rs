#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Solar siting API server.
//!
//! ```text
//! solar_siting_server                # start with environment configuration
//! solar_siting_server --interactive  # prompt for configuration first
//! ```

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "solar_siting_server",
    about = "Serve solar site suitability analysis over HTTP"
)]
struct Cli {
    /// Prompt for bind address, port and raster service before starting
    #[arg(short, long)]
    interactive: bool,
}

#[actix_web::main]
#[allow(clippy::future_not_send)]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    if cli.interactive {
        solar_siting_server::interactive::run().await
    } else {
        solar_siting_server::run_server().await
    }
}
