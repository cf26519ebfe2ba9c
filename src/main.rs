use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

mod config;
mod format;
mod handlers;
mod logging;
mod net;
mod session;
mod tui;
mod ui;

use config::Options;
use net::{HandlerRegistry, Retrier};
use tui::app::{App, Composer};

fn main() -> ExitCode {
    // Ensure terminal colors are enabled on Windows (banner and errors before the TUI starts)
    #[cfg(windows)]
    let _ = colored::control::set_virtual_terminal(true);

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            ui::print_error(&ui::error_report(&err));
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Missing required options exit here, before any network I/O.
    let opts = Options::parse();
    let settings = opts.validate().context("Invalid configuration")?;
    let _log_guard = logging::init(&opts)?;
    let channel = opts.channel().to_string();

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    let address = settings.address();
    let retrier = Retrier::default();
    ui::print_banner(&address, &channel, settings.tls);
    let connected = runtime.block_on(ui::with_spinner(
        &format!("Connecting to {address}"),
        "Connected",
        || session::connect(&settings, &retrier),
    ));
    let connection = connected.context("Could not connect")?;

    let (bridge, updates) = tui::bridge::channel();
    let mut handlers = HandlerRegistry::new();
    handlers::install(&mut handlers, &opts, &bridge);
    session::join_on_welcome(&mut handlers, &channel, connection.sender());

    let composer = Composer::new(&channel, &settings.nick, connection.sender(), bridge.clone());
    runtime.spawn(session::read_loop(connection, handlers, bridge));

    let result = tui::run_tui(App::new(&channel, composer), updates);

    // The read loop is parked on the socket; the process exit takes it down.
    runtime.shutdown_background();
    result?;

    info!("bye");
    ui::print_outro(&format!("Left {channel}"));
    Ok(())
}
