use cliclack::{intro, log, outro, spinner};
use colored::*;
use std::future::Future;

pub fn print_banner(address: &str, channel: &str, tls: bool) {
    // intro prints the title in a nice styled badge
    intro(" NAKO ").ok();
    let transport = if tls { "tls".green() } else { "plain".yellow() };
    log::remark(format!(
        "{} {} ({})",
        address.cyan(),
        channel.bold(),
        transport
    ))
    .ok();
}

pub fn print_error(message: &str) {
    log::error(message).ok();
}

/// The error and its causes on one line, outermost first.
pub fn error_report(err: &anyhow::Error) -> String {
    format!("{err:#}")
}

pub fn print_outro(msg: &str) {
    outro(msg).ok();
}

pub async fn with_spinner<F, Fut, T, E>(start_msg: &str, success_msg: &str, f: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let s = spinner();
    s.start(start_msg);
    let result = f().await;
    match &result {
        Ok(_) => s.stop(success_msg),
        Err(_) => s.stop("Failed"),
    }
    result
}
