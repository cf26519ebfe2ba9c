use std::collections::BTreeMap;

use irc::proto::{Command, Message, Prefix};

/// Coarse classification of an inbound command, used for routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Message,
    Join,
    Part,
    Quit,
    Handshake,
    Other,
}

impl EventKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "PRIVMSG" => EventKind::Message,
            "JOIN" => EventKind::Join,
            "PART" => EventKind::Part,
            "QUIT" => EventKind::Quit,
            "001" => EventKind::Handshake,
            _ => EventKind::Other,
        }
    }
}

/// One inbound protocol line, flattened for handlers.
///
/// `source` is the whole prefix. `nick`/`user`/`host` are filled in when the
/// prefix names a client rather than a server, so server-originated lines have
/// an empty nick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    pub code: String,
    pub raw: String,
    pub nick: String,
    pub host: String,
    pub source: String,
    pub user: String,
    pub tags: BTreeMap<String, String>,
    pub arguments: Vec<String>,
}

impl Event {
    /// Parse a single line (CRLF optional).
    ///
    /// Returns `None` for lines the protocol parser rejects.
    pub fn parse(line: &str) -> Option<Self> {
        let raw = line.trim_end_matches(['\r', '\n']);
        let message = raw.parse::<Message>().ok()?;
        Some(Self::from_message(raw, &message))
    }

    pub fn from_message(raw: &str, message: &Message) -> Self {
        let (code, arguments) = command_parts(&message.command);
        let mut event = Event {
            code,
            raw: raw.to_string(),
            arguments,
            ..Event::default()
        };

        if let Some(prefix) = &message.prefix {
            event.source = prefix.to_string();
            if let Prefix::Nickname(nick, user, host) = prefix {
                event.nick = nick.clone();
                event.user = user.clone();
                event.host = host.clone();
            }
        }

        event.tags = message
            .tags
            .iter()
            .flatten()
            .map(|tag| (tag.0.clone(), tag.1.clone().unwrap_or_default()))
            .collect();

        event
    }

    pub fn kind(&self) -> EventKind {
        EventKind::from_code(&self.code)
    }

    /// The nick when present, otherwise the raw source.
    pub fn nick_or_source(&self) -> &str {
        if self.nick.is_empty() {
            &self.source
        } else {
            &self.nick
        }
    }

    pub fn argument(&self, index: usize) -> Option<&str> {
        self.arguments.get(index).map(String::as_str)
    }
}

/// Command name (numerics as three digits) and its parameters in wire order.
fn command_parts(command: &Command) -> (String, Vec<String>) {
    let owned = |name: &str, args: &[&String]| -> (String, Vec<String>) {
        (name.to_string(), args.iter().map(|a| a.to_string()).collect())
    };

    match command {
        Command::Response(response, args) => (format!("{:03}", *response as u16), args.clone()),
        Command::Raw(name, args) => (name.to_ascii_uppercase(), args.clone()),
        Command::PRIVMSG(target, text) => owned("PRIVMSG", &[target, text]),
        Command::NOTICE(target, text) => owned("NOTICE", &[target, text]),
        Command::JOIN(channel, keys, realname) => {
            let mut args = vec![channel.clone()];
            args.extend(keys.iter().chain(realname.iter()).cloned());
            ("JOIN".to_string(), args)
        }
        Command::PART(channel, reason) => {
            let mut args = vec![channel.clone()];
            args.extend(reason.iter().cloned());
            ("PART".to_string(), args)
        }
        Command::QUIT(reason) => ("QUIT".to_string(), reason.iter().cloned().collect()),
        Command::NICK(nick) => owned("NICK", &[nick]),
        Command::PING(server, other) => {
            let mut args = vec![server.clone()];
            args.extend(other.iter().cloned());
            ("PING".to_string(), args)
        }
        Command::PONG(server, other) => {
            let mut args = vec![server.clone()];
            args.extend(other.iter().cloned());
            ("PONG".to_string(), args)
        }
        other => split_serialized(&String::from(other)),
    }
}

/// Fallback for the commands this client never inspects: read the code and
/// parameters back out of the serializer's canonical form.
fn split_serialized(line: &str) -> (String, Vec<String>) {
    let (params, trailing) = match line.split_once(" :") {
        Some((params, trailing)) => (params, Some(trailing)),
        None => (line, None),
    };
    let mut words = params.split(' ').filter(|w| !w.is_empty());
    let code = words.next().unwrap_or_default().to_ascii_uppercase();
    let mut args: Vec<String> = words.map(str::to_string).collect();
    args.extend(trailing.map(str::to_string));
    (code, args)
}
