//! Interactive mode for the server.
//!
//! Prompts for the listen address and the raster compute service before
//! starting the server.

use dialoguer::{Confirm, Input};

fn prompt(label: &str, default: String) -> String {
    Input::new()
        .with_prompt(label)
        .default(default.clone())
        .interact_text()
        .unwrap_or(default)
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Runs the server in interactive mode, prompting for configuration.
///
/// Asks for a bind address, port and raster service endpoint, sets the
/// corresponding environment variables (`BIND_ADDR`, `PORT`,
/// `RASTER_BACKEND_URL`, `RASTER_BACKEND_PROJECT`), and delegates to
/// [`super::run_server`]. Values already present in the environment are
/// offered as defaults.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the underlying server fails to
/// start.
#[allow(clippy::future_not_send)]
pub async fn run() -> std::io::Result<()> {
    println!("Solar Siting Server");
    println!();

    let bind_addr = prompt("Bind address", env_or("BIND_ADDR", "127.0.0.1"));
    let port = prompt("Port", env_or("PORT", &super::DEFAULT_PORT.to_string()));
    let backend_url = prompt("Raster service URL", env_or("RASTER_BACKEND_URL", ""));
    let project = prompt("Raster project", env_or("RASTER_BACKEND_PROJECT", ""));

    // SAFETY: We are single-threaded at this point (before server starts) and
    // these variables are only read once during server initialisation.
    unsafe {
        std::env::set_var("BIND_ADDR", &bind_addr);
        std::env::set_var("PORT", &port);
        if !backend_url.is_empty() {
            std::env::set_var("RASTER_BACKEND_URL", &backend_url);
        }
        if !project.is_empty() {
            std::env::set_var("RASTER_BACKEND_PROJECT", &project);
        }
    }

    if backend_url.is_empty() {
        println!("No raster service configured; analyses will fail until one is.");
    }

    if !Confirm::new()
        .with_prompt(format!("Start server on {bind_addr}:{port}?"))
        .default(true)
        .interact()
        .unwrap_or(true)
    {
        println!("Cancelled.");
        return Ok(());
    }

    super::run_server().await
}
