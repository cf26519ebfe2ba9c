//! IRC client plumbing on top of the `irc` wire types: events, the connection and retries.

pub mod client;
pub mod event;
pub mod retry;

pub use client::{ClientError, Connection, EventHandler, HandlerRegistry, IrcSender};
pub use event::{Event, EventKind};
pub use retry::{Exhausted, Retrier};
