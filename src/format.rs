//! Turning events and outgoing messages into transcript lines.

use std::fmt;

use chrono::{DateTime, Local};

use crate::net::Event;

/// A timestamped line destined for a text view. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    pub stamp: String,
    pub text: String,
}

impl DisplayLine {
    pub fn now(text: impl Into<String>) -> Self {
        Self::at(Local::now(), text)
    }

    pub fn at(time: DateTime<Local>, text: impl Into<String>) -> Self {
        Self {
            stamp: time.format("%H:%M").to_string(),
            text: text.into(),
        }
    }
}

impl fmt::Display for DisplayLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.stamp, self.text)
    }
}

pub fn message_line(nick: &str, body: &str) -> DisplayLine {
    DisplayLine::now(format!("{nick}: {body}"))
}

pub fn join_line(nick: &str, channel: &str) -> DisplayLine {
    DisplayLine::now(format!("-> {nick} joined {channel}"))
}

pub fn part_line(nick: &str, channel: &str) -> DisplayLine {
    DisplayLine::now(format!("<- {nick} left {channel}"))
}

pub fn notice_line(text: &str) -> DisplayLine {
    DisplayLine::now(format!("-- {text}"))
}

/// Every field of an event, one line each, in a fixed order.
pub fn debug_lines(event: &Event) -> Vec<DisplayLine> {
    let tags = event
        .tags
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ");

    [
        format!("Code: {}", event.code),
        format!("Raw: {}", event.raw),
        format!("Nick: {}", event.nick),
        format!("Host: {}", event.host),
        format!("Source: {}", event.source),
        format!("User: {}", event.user),
        format!("Tags: [{tags}]"),
        format!("Arguments: {:?}", event.arguments),
    ]
    .into_iter()
    .map(DisplayLine::now)
    .collect()
}
