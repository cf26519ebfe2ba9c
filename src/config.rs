use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};

/// Command-line options. Every flag can also come from a `NAKO_*` variable;
/// switches read from the environment accept `1`/`0`, `true`/`false`, `yes`/`no`.
#[derive(Debug, Clone, Parser)]
#[command(name = "nako", about = "Sit in one IRC channel from your terminal.")]
pub struct Options {
    /// IRC server:port
    #[arg(short = 's', long, env = "NAKO_SERVER")]
    pub server: String,

    /// IRC nick
    #[arg(short = 'n', long, env = "NAKO_NICK")]
    pub nick: String,

    /// IRC user
    #[arg(short = 'u', long, env = "NAKO_USER")]
    pub user: String,

    /// IRC password
    #[arg(short = 'p', long, env = "NAKO_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Channels to join (only the first one is used)
    #[arg(
        short = 'c',
        long,
        env = "NAKO_CHANNELS",
        value_delimiter = ',',
        num_args = 1..,
        required = true
    )]
    pub channels: Vec<String>,

    /// Connect to irc using tls
    #[arg(
        short = 'T',
        long,
        env = "NAKO_TLS",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub tls: bool,

    /// Show every event for the joined channel in the transcript
    #[arg(
        short = 'v',
        long,
        env = "NAKO_VERBOSE",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub verbose: bool,

    /// Show every event from the whole server in the transcript
    #[arg(
        short = 'V',
        long,
        env = "NAKO_GLOBAL_VERBOSE",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub global_verbose: bool,

    /// Log raw protocol traffic
    #[arg(
        short = 'd',
        long,
        env = "NAKO_DEBUG",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub debug: bool,

    /// Show join and part messages
    #[arg(
        short = 'j',
        long,
        env = "NAKO_SHOW_JOINS",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub show_joins: bool,

    /// Where to write the log file
    #[arg(long, env = "NAKO_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

/// Everything the connection needs, checked and split out of `Options`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub nick: String,
    pub user: String,
    pub password: Option<String>,
    pub log_raw: bool,
}

impl ConnectionSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Options {
    /// The single channel this session lives in.
    pub fn channel(&self) -> &str {
        self.channels.first().map(String::as_str).unwrap_or_default()
    }

    pub fn debug_handler_enabled(&self) -> bool {
        self.verbose || self.global_verbose
    }

    /// Check the values clap can't, before anything touches the network.
    pub fn validate(&self) -> Result<ConnectionSettings> {
        let (host, port) = split_server(&self.server)?;

        check_word("nick", &self.nick)?;
        check_word("user", &self.user)?;

        let channel = self.channel();
        if channel.is_empty() {
            bail!("channel name must not be empty");
        }
        if channel.chars().any(|c| c == ' ' || c == ',' || c.is_control()) {
            bail!("invalid channel name: {channel:?}");
        }

        Ok(ConnectionSettings {
            host: host.to_string(),
            port,
            tls: self.tls,
            nick: self.nick.clone(),
            user: self.user.clone(),
            password: self.password.clone().filter(|p| !p.is_empty()),
            log_raw: self.debug,
        })
    }
}

fn split_server(server: &str) -> Result<(&str, u16)> {
    let (host, port) = server
        .rsplit_once(':')
        .with_context(|| format!("server must be host:port, got {server:?}"))?;
    if host.is_empty() {
        bail!("server host must not be empty");
    }
    let port: u16 = port
        .parse()
        .with_context(|| format!("invalid server port {port:?}"))?;
    if port == 0 {
        bail!("server port must not be 0");
    }
    Ok((host, port))
}

fn check_word(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        bail!("{what} must not be empty");
    }
    if value.chars().any(char::is_whitespace) {
        bail!("{what} must not contain whitespace: {value:?}");
    }
    Ok(())
}
