//! Event handlers that turn channel traffic into transcript lines.
//!
//! Each handler is a small value holding exactly what it needs, built once at
//! startup and shared across the tasks the read loop spawns.

use anyhow::Result;

use crate::config::Options;
use crate::format;
use crate::net::{Event, EventHandler, EventKind, HandlerRegistry};
use crate::tui::bridge::{UiBridge, CHAT_VIEW};

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("{code} is missing argument {index}")]
    MissingArgument { code: String, index: usize },
}

fn required(event: &Event, index: usize) -> Result<&str, HandlerError> {
    event
        .argument(index)
        .ok_or_else(|| HandlerError::MissingArgument {
            code: event.code.clone(),
            index,
        })
}

fn same_channel(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// `PRIVMSG` to the joined channel -> `nick: body`.
#[derive(Debug, Clone)]
pub struct MessageHandler {
    channel: String,
    bridge: UiBridge,
}

impl MessageHandler {
    pub fn new(channel: &str, bridge: UiBridge) -> Self {
        Self {
            channel: channel.to_string(),
            bridge,
        }
    }
}

impl EventHandler for MessageHandler {
    fn handle(&self, event: &Event) -> Result<()> {
        if !same_channel(required(event, 0)?, &self.channel) {
            return Ok(());
        }
        let body = required(event, 1)?;
        self.bridge
            .post(format::message_line(event.nick_or_source(), body), CHAT_VIEW)?;
        Ok(())
    }
}

/// `JOIN`/`PART` on the joined channel -> arrow lines.
#[derive(Debug, Clone)]
pub struct MembershipHandler {
    channel: String,
    bridge: UiBridge,
}

impl MembershipHandler {
    pub fn new(channel: &str, bridge: UiBridge) -> Self {
        Self {
            channel: channel.to_string(),
            bridge,
        }
    }
}

impl EventHandler for MembershipHandler {
    fn handle(&self, event: &Event) -> Result<()> {
        let channel = required(event, 0)?;
        if !same_channel(channel, &self.channel) {
            return Ok(());
        }
        let line = match event.kind() {
            EventKind::Join => format::join_line(event.nick_or_source(), channel),
            EventKind::Part => format::part_line(event.nick_or_source(), channel),
            _ => return Ok(()),
        };
        self.bridge.post(line, CHAT_VIEW)?;
        Ok(())
    }
}

/// Dumps every field of an event into the transcript.
///
/// With `global` set it fires for everything the server sends, otherwise only
/// for events whose first argument is the joined channel.
#[derive(Debug, Clone)]
pub struct DebugHandler {
    channel: String,
    global: bool,
    bridge: UiBridge,
}

impl DebugHandler {
    pub fn new(channel: &str, global: bool, bridge: UiBridge) -> Self {
        Self {
            channel: channel.to_string(),
            global,
            bridge,
        }
    }
}

impl EventHandler for DebugHandler {
    fn handle(&self, event: &Event) -> Result<()> {
        let ours = event
            .argument(0)
            .is_some_and(|target| same_channel(target, &self.channel));
        if !(self.global || ours) {
            return Ok(());
        }
        for line in format::debug_lines(event) {
            self.bridge.post(line, CHAT_VIEW)?;
        }
        Ok(())
    }
}

/// Register the display handlers the options ask for.
pub fn install(registry: &mut HandlerRegistry, opts: &Options, bridge: &UiBridge) {
    let channel = opts.channel();

    registry.register("PRIVMSG", MessageHandler::new(channel, bridge.clone()));

    if opts.show_joins {
        registry.register("JOIN", MembershipHandler::new(channel, bridge.clone()));
        registry.register("PART", MembershipHandler::new(channel, bridge.clone()));
    }

    if opts.debug_handler_enabled() {
        registry.register(
            "*",
            DebugHandler::new(channel, opts.global_verbose, bridge.clone()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::app::tests::harness;
    use clap::Parser;

    fn ev(line: &str) -> Event {
        Event::parse(line).unwrap()
    }

    fn opts(extra: &[&str]) -> Options {
        let base = ["nako", "-s", "h:6667", "-n", "nako", "-u", "nako", "-c", "#test"];
        Options::try_parse_from(base.iter().chain(extra.iter())).unwrap()
    }

    fn chat(h: &mut crate::tui::app::tests::Harness) -> Vec<String> {
        h.queue.drain(&mut h.app);
        h.app
            .view(CHAT_VIEW)
            .unwrap()
            .lines
            .iter()
            .map(|l| l.text.clone())
            .collect()
    }

    #[test]
    fn channel_messages_produce_exactly_one_line_each() {
        let mut h = harness();
        let handler = MessageHandler::new("#test", h.bridge.clone());

        handler.handle(&ev(":alice!a@h PRIVMSG #test :hello")).unwrap();
        handler.handle(&ev(":bob!b@h PRIVMSG #other :not for us")).unwrap();
        handler.handle(&ev(":irc.example.org PRIVMSG #test :from server")).unwrap();
        handler.handle(&ev(":alice!a@h PRIVMSG nako :private")).unwrap();

        assert_eq!(
            chat(&mut h),
            vec!["alice: hello", "irc.example.org: from server"]
        );
    }

    #[test]
    fn malformed_message_is_an_error_not_a_panic() {
        let h = harness();
        let handler = MessageHandler::new("#test", h.bridge.clone());

        let err = handler.handle(&ev(":alice!a@h PRIVMSG")).unwrap_err();
        assert!(err.downcast_ref::<HandlerError>().is_some());
        assert!(handler.handle(&ev(":alice!a@h PRIVMSG #test")).is_err());
    }

    #[test]
    fn membership_lines_use_arrows() {
        let mut h = harness();
        let handler = MembershipHandler::new("#test", h.bridge.clone());

        handler.handle(&ev(":bob!b@h JOIN #test")).unwrap();
        handler.handle(&ev(":bob!b@h PART #test :bye")).unwrap();
        handler.handle(&ev(":carol!c@h JOIN #elsewhere")).unwrap();

        assert_eq!(
            chat(&mut h),
            vec!["-> bob joined #test", "<- bob left #test"]
        );
    }

    #[test]
    fn debug_handler_scopes_to_channel_unless_global() {
        let mut h = harness();
        let local = DebugHandler::new("#test", false, h.bridge.clone());

        local.handle(&ev(":s 001 nako :Welcome")).unwrap();
        local.handle(&ev(":s QUIT")).unwrap();
        assert!(chat(&mut h).is_empty());

        local.handle(&ev(":a!b@c PRIVMSG #test :x")).unwrap();
        assert_eq!(chat(&mut h).len(), 8);

        let mut h = harness();
        let global = DebugHandler::new("#test", true, h.bridge.clone());
        global.handle(&ev(":s 001 nako :Welcome")).unwrap();
        let lines = chat(&mut h);
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "Code: 001");
    }

    #[test]
    fn install_respects_flags() {
        let h = harness();

        let mut reg = HandlerRegistry::new();
        install(&mut reg, &opts(&[]), &h.bridge);
        assert_eq!(reg.handlers_for("PRIVMSG").len(), 1);
        assert!(reg.handlers_for("JOIN").is_empty());
        assert!(reg.handlers_for("PART").is_empty());

        let mut reg = HandlerRegistry::new();
        install(&mut reg, &opts(&["-j", "-v"]), &h.bridge);
        assert_eq!(reg.handlers_for("JOIN").len(), 2);
        assert_eq!(reg.handlers_for("PART").len(), 2);
        assert_eq!(reg.handlers_for("PRIVMSG").len(), 2);
    }

    #[tokio::test]
    async fn joins_hidden_unless_enabled() {
        for (flags, expected) in [(vec![], 0), (vec!["-j"], 2)] {
            let mut h = harness();
            let mut reg = HandlerRegistry::new();
            install(&mut reg, &opts(&flags), &h.bridge);

            for line in [":bob!b@h JOIN #test", ":bob!b@h PART #test"] {
                for task in reg.dispatch(ev(line)) {
                    task.await.unwrap();
                }
            }

            assert_eq!(chat(&mut h).len(), expected);
        }
    }
}
