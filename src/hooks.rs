use std::panic::{self, AssertUnwindSafe};

use log::*;

use crate::{
    channel::{Channel, Member},
    irc::Address,
    net::Connection,
};

/// who caused a channel event: a known member of the channel, or only an address if the sender is
/// not (or no longer) on the roster
#[derive(Debug, Clone, Copy)]
pub enum Actor<'a> {
    Member(&'a Member),
    Address(&'a Address),
}

impl<'a> Actor<'a> {
    pub fn address(&self) -> &'a Address {
        match self {
            Actor::Member(member) => member.address(),
            Actor::Address(address) => address,
        }
    }

    pub fn nick(&self) -> &'a str {
        self.address().nick().unwrap_or_default()
    }

    pub fn member(&self) -> Option<&'a Member> {
        match self {
            Actor::Member(member) => Some(member),
            Actor::Address(_) => None,
        }
    }
}

/// everything the engine reports to its consumers. channel scoped events are delivered after the
/// channel model has been updated.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    /// login completed and the initial channels were requested
    Connected,
    PrivateMessage {
        from: &'a Address,
        text: &'a str,
    },
    PrivateNotice {
        from: &'a Address,
        text: &'a str,
    },
    ChannelMessage {
        channel: &'a Channel,
        from: Actor<'a>,
        text: &'a str,
    },
    ChannelNotice {
        channel: &'a Channel,
        from: Actor<'a>,
        text: &'a str,
    },
    Join {
        channel: &'a Channel,
        member: &'a Member,
    },
    /// a member left by PART or QUIT. when it is our own member, the channel is dropped right
    /// after this event.
    Part {
        channel: &'a Channel,
        who: Actor<'a>,
    },
    /// the topic changed. `by` is absent when the topic came from a numeric reply.
    Topic {
        channel: &'a Channel,
        by: Option<Actor<'a>>,
    },
    /// the first WHO scan after joining finished, so the roster is complete
    ChannelInit {
        channel: &'a Channel,
    },
    ChannelCommand {
        channel: &'a Channel,
        handled: bool,
        from: Actor<'a>,
        command: &'a str,
        args: &'a [String],
    },
    ServerCommand {
        handled: bool,
        from: &'a Address,
        command: &'a str,
        args: &'a [String],
    },
    ChannelReply {
        channel: &'a Channel,
        code: u16,
        args: &'a [String],
    },
    ServerReply {
        code: u16,
        args: &'a [String],
    },
}

/// the subscription points, one per kind of [`Event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Connected,
    PrivateMessage,
    PrivateNotice,
    ChannelMessage,
    ChannelNotice,
    Join,
    Part,
    Topic,
    ChannelInit,
    ChannelCommand,
    ServerCommand,
    ChannelReply,
    ServerReply,
}

impl Event<'_> {
    pub fn kind(&self) -> HookKind {
        match self {
            Event::Connected => HookKind::Connected,
            Event::PrivateMessage { .. } => HookKind::PrivateMessage,
            Event::PrivateNotice { .. } => HookKind::PrivateNotice,
            Event::ChannelMessage { .. } => HookKind::ChannelMessage,
            Event::ChannelNotice { .. } => HookKind::ChannelNotice,
            Event::Join { .. } => HookKind::Join,
            Event::Part { .. } => HookKind::Part,
            Event::Topic { .. } => HookKind::Topic,
            Event::ChannelInit { .. } => HookKind::ChannelInit,
            Event::ChannelCommand { .. } => HookKind::ChannelCommand,
            Event::ServerCommand { .. } => HookKind::ServerCommand,
            Event::ChannelReply { .. } => HookKind::ChannelReply,
            Event::ServerReply { .. } => HookKind::ServerReply,
        }
    }
}

/// a consumer of engine events. hooks run on the connection's worker thread, in the order the
/// connection received the lines, so a hook may send a command and wait for the replies in later
/// events.
pub trait Hook: Send + Sync {
    fn call(&self, connection: &Connection, event: &Event<'_>) -> eyre::Result<()>;
}

impl<F> Hook for F
where
    F: Fn(&Connection, &Event<'_>) -> eyre::Result<()> + Send + Sync,
{
    fn call(&self, connection: &Connection, event: &Event<'_>) -> eyre::Result<()> {
        self(connection, event)
    }
}

/// the registered hooks, called in registration order
#[derive(Default)]
pub struct Hooks {
    hooks: Vec<(HookKind, Box<dyn Hook>)>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// registers a closure for one kind of event
    pub fn on<F>(&mut self, kind: HookKind, hook: F) -> &mut Self
    where
        F: Fn(&Connection, &Event<'_>) -> eyre::Result<()> + Send + Sync + 'static,
    {
        self.on_hook(kind, hook)
    }

    pub fn on_hook(&mut self, kind: HookKind, hook: impl Hook + 'static) -> &mut Self {
        self.hooks.push((kind, Box::new(hook)));
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// delivers an event to every hook registered for its kind. a hook that fails or panics is
    /// logged and does not stop the remaining hooks.
    pub fn dispatch(&self, connection: &Connection, event: &Event<'_>) {
        let kind = event.kind();
        for (idx, (_, hook)) in self
            .hooks
            .iter()
            .enumerate()
            .filter(|(_, (hook_kind, _))| *hook_kind == kind)
        {
            match panic::catch_unwind(AssertUnwindSafe(|| hook.call(connection, event))) {
                Ok(Ok(())) => {}
                Ok(Err(report)) => {
                    error!(
                        "[{}:{}] hook #{} for {:?} failed: {:?}",
                        connection.host(),
                        connection.port(),
                        idx,
                        kind,
                        report
                    );
                }
                Err(_) => {
                    error!(
                        "[{}:{}] hook #{} for {:?} panicked",
                        connection.host(),
                        connection.port(),
                        idx,
                        kind
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use eyre::bail;

    use super::*;
    use crate::config::ServerConfig;

    fn connection() -> Arc<Connection> {
        Connection::new(&ServerConfig::new("test", "irc.example.org", ["me"]))
    }

    #[test]
    fn order_and_isolation() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = Hooks::new();
        hooks
            .on(HookKind::ServerReply, {
                let calls = Arc::clone(&calls);
                move |_: &Connection, _: &Event<'_>| -> eyre::Result<()> {
                    calls.lock().unwrap().push("first");
                    bail!("first hook fails")
                }
            })
            .on(HookKind::ServerReply, |_, _| panic!("second hook panics"))
            .on(HookKind::PrivateMessage, {
                let calls = Arc::clone(&calls);
                move |_, _| {
                    calls.lock().unwrap().push("private");
                    Ok(())
                }
            })
            .on(HookKind::ServerReply, {
                let calls = Arc::clone(&calls);
                move |_, _| {
                    calls.lock().unwrap().push("third");
                    Ok(())
                }
            });
        assert_eq!(hooks.len(), 4);

        let args = vec![String::from("hello")];
        hooks.dispatch(
            &connection(),
            &Event::ServerReply {
                code: 1,
                args: &args,
            },
        );

        assert_eq!(*calls.lock().unwrap(), vec!["first", "third"]);
    }
}
