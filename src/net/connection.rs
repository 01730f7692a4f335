use core::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
};
use std::{
    io::{self, Write},
    sync::{Arc, Condvar, Mutex},
    thread,
};

use indexmap::IndexSet;
use log::*;
use thiserror::Error;

use crate::{
    config::ServerConfig,
    ext::MutexExt,
    hooks::Hooks,
    irc::{format_command, normalize},
    net::{registry::ConnectionRegistry, session::Session},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// connecting the socket and logging in
    Connecting,
    /// the last attempt failed, either during login or from a socket error
    Failed,
    /// logged in and receiving
    Running,
    /// a quit was requested, waiting for the server to close the connection
    Quitting,
    /// the worker has stopped and no further attempt will be made
    Closed,
}

#[derive(Debug, Error)]
pub enum ConnectErr {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("the connection was closed during login")]
    Closed,
    #[error("every candidate nick was rejected")]
    NicksExhausted,
}

/// a connection to one network. the model of the network (channels, members, modes) is owned by
/// the connection's worker thread and handed to hooks in events; this handle is the part that is
/// shared with the rest of the program, and is used to send commands and control the lifecycle.
pub struct Connection {
    name: String,
    host: String,
    port: u16,
    state: Mutex<ConnectionState>,
    auto_reconnect: AtomicBool,
    // the negotiated nick, once logged in
    nick: Mutex<Option<String>>,
    // case folded names of the channels the worker currently tracks
    joined: Mutex<IndexSet<String>>,
    writer: Mutex<Option<Box<dyn Write + Send>>>,
    // a QUIT line requested before there was a socket to send it on
    pending_quit: Mutex<Option<String>>,
    // set once the worker has exited
    done: Mutex<bool>,
    done_cond: Condvar,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Connection {
    pub(crate) fn new(config: &ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            name: config.name.clone(),
            host: config.host.clone(),
            port: config.port,
            state: Mutex::new(ConnectionState::Connecting),
            auto_reconnect: AtomicBool::new(config.auto_reconnect),
            nick: Mutex::new(None),
            joined: Mutex::new(IndexSet::new()),
            writer: Mutex::new(None),
            pending_quit: Mutex::new(None),
            done: Mutex::new(false),
            done_cond: Condvar::new(),
        })
    }

    /// starts a worker thread that connects to the server and processes it until the connection
    /// closes for good. the connection is in the registry until the worker exits.
    pub fn spawn(
        config: ServerConfig,
        hooks: Arc<Hooks>,
        registry: &Arc<ConnectionRegistry>,
    ) -> io::Result<Arc<Connection>> {
        let connection = Connection::new(&config);
        registry.add(Arc::clone(&connection));

        let spawned = thread::Builder::new().name(config.name.clone()).spawn({
            let connection = Arc::clone(&connection);
            let registry = Arc::clone(registry);
            move || {
                Session::new(Arc::clone(&connection), config, hooks).run();
                registry.remove(&connection);
                connection.finish();
            }
        });

        if let Err(e) = spawned {
            registry.remove(&connection);
            connection.set_state(ConnectionState::Failed);
            connection.finish();
            return Err(e);
        }

        Ok(connection)
    }

    /// the name of the server definition this connection was created from
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn host(&self) -> &str {
        self.host.as_str()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock_unpoisoned()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        let mut current = self.state.lock_unpoisoned();
        if *current != state {
            debug!("[{}:{}] {:?} -> {:?}", self.host, self.port, *current, state);
            *current = state;
        }
    }

    /// moves to `state` unless a quit was requested
    pub(crate) fn advance_state(&self, state: ConnectionState) -> bool {
        if self.state() == ConnectionState::Quitting {
            return false;
        }
        self.set_state(state);
        true
    }

    /// the nick the server accepted at login
    pub fn nick(&self) -> Option<String> {
        self.nick.lock_unpoisoned().clone()
    }

    pub(crate) fn set_nick(&self, nick: Option<&str>) {
        *self.nick.lock_unpoisoned() = nick.map(str::to_string);
    }

    pub fn auto_reconnect(&self) -> bool {
        self.auto_reconnect.load(Ordering::Relaxed)
    }

    pub fn set_auto_reconnect(&self, auto_reconnect: bool) {
        self.auto_reconnect.store(auto_reconnect, Ordering::Relaxed);
    }

    /// whether the worker currently tracks the channel
    pub fn is_joined(&self, channel: &str) -> bool {
        self.joined.lock_unpoisoned().contains(&normalize(channel))
    }

    /// the case folded names of the tracked channels
    pub fn channel_names(&self) -> Vec<String> {
        self.joined.lock_unpoisoned().iter().cloned().collect()
    }

    pub(crate) fn track_channel(&self, nname: &str) {
        self.joined.lock_unpoisoned().insert(nname.to_string());
    }

    pub(crate) fn forget_channel(&self, nname: &str) {
        self.joined.lock_unpoisoned().shift_remove(nname);
    }

    pub(crate) fn forget_channels(&self) {
        self.joined.lock_unpoisoned().clear();
    }

    /// installs the socket's write half. a QUIT requested before this is sent right away.
    pub(crate) fn attach_writer(&self, writer: Box<dyn Write + Send>) {
        let mut slot = self.writer.lock_unpoisoned();
        let writer = slot.insert(writer);
        if let Some(line) = self.pending_quit.lock_unpoisoned().take() {
            self.write_line(&mut **writer, "QUIT", &line);
        }
    }

    pub(crate) fn detach_writer(&self) {
        *self.writer.lock_unpoisoned() = None;
    }

    fn finish(&self) {
        *self.done.lock_unpoisoned() = true;
        self.done_cond.notify_all();
    }

    // =======================
    // sending
    // =======================

    /// sends a command to the server. the last argument is sent as the trailing parameter. returns
    /// false without sending anything unless the connection is running.
    pub fn cmd<S: AsRef<str>>(&self, command: &str, args: &[S]) -> bool {
        let state = self.state();
        if state != ConnectionState::Running {
            debug!(
                "[{}:{}] not sending {} while {:?}",
                self.host, self.port, command, state
            );
            return false;
        }
        self.send_raw(command, args)
    }

    /// sends a command regardless of the connection state, for the protocol's own traffic
    pub(crate) fn send_raw<S: AsRef<str>>(&self, command: &str, args: &[S]) -> bool {
        let line = match format_command(command, args) {
            Ok(line) => line,
            Err(e) => {
                warn!("[{}:{}] unable to send {}: {}", self.host, self.port, command, e);
                return false;
            }
        };

        let mut writer = self.writer.lock_unpoisoned();
        let Some(writer) = writer.as_mut() else {
            debug!("[{}:{}] not connected, dropping {}", self.host, self.port, command);
            return false;
        };
        self.write_line(&mut **writer, command, &line)
    }

    fn write_line(&self, writer: &mut dyn Write, command: &str, line: &str) -> bool {
        if command.eq_ignore_ascii_case("PASS") {
            debug!("<- PASS ****");
        } else {
            debug!("<- {}", line);
        }
        let written = writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.write_all(b"\r\n"))
            .and_then(|()| writer.flush());
        match written {
            Ok(()) => true,
            Err(e) => {
                warn!("[{}:{}] write failed: {}", self.host, self.port, e);
                false
            }
        }
    }

    pub fn privmsg(&self, target: &str, text: &str) -> bool {
        self.cmd("PRIVMSG", &[target, text])
    }

    pub fn notice(&self, target: &str, text: &str) -> bool {
        self.cmd("NOTICE", &[target, text])
    }

    /// sends a CTCP ACTION, shown by clients as `* nick text`
    pub fn action(&self, target: &str, text: &str) -> bool {
        self.privmsg(target, &format!("\u{1}ACTION {}\u{1}", text))
    }

    /// joins a channel, unless it is already joined and `force` is not set
    pub fn join(&self, channel: &str, force: bool) -> bool {
        if !force && self.is_joined(channel) {
            debug!("[{}:{}] already in {}", self.host, self.port, channel);
            return false;
        }
        self.cmd("JOIN", &[channel])
    }

    /// leaves a channel. a channel that is not joined is only parted when `force` is set.
    pub fn part(&self, channel: &str, reason: Option<&str>, force: bool) -> bool {
        if !force && !self.is_joined(channel) {
            debug!("[{}:{}] not in {}", self.host, self.port, channel);
            return false;
        }
        match reason {
            Some(reason) => self.cmd("PART", &[channel, reason]),
            None => self.cmd("PART", &[channel]),
        }
    }

    pub fn mode(&self, target: &str, modes: &str, args: &[&str]) -> bool {
        let mut all = vec![target, modes];
        all.extend_from_slice(args);
        self.cmd("MODE", &all)
    }

    /// asks the server to close the connection and disables reconnecting. the worker exits once
    /// the server closes the socket.
    pub fn quit(&self, reason: Option<&str>) {
        self.set_auto_reconnect(false);
        {
            let mut state = self.state.lock_unpoisoned();
            match *state {
                ConnectionState::Connecting | ConnectionState::Running => {
                    debug!("[{}:{}] {:?} -> Quitting", self.host, self.port, *state);
                    *state = ConnectionState::Quitting;
                }
                _ => return,
            }
        }
        info!("[{}:{}] quitting", self.host, self.port);
        let line = match reason {
            Some(reason) => format_command("QUIT", &[reason]),
            None => format_command::<&str>("QUIT", &[]),
        };
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("[{}:{}] unable to send QUIT: {}", self.host, self.port, e);
                return;
            }
        };

        let mut writer = self.writer.lock_unpoisoned();
        match writer.as_mut() {
            Some(writer) => {
                self.write_line(&mut **writer, "QUIT", &line);
            }
            None => {
                debug!("[{}:{}] not connected yet, holding QUIT", self.host, self.port);
                *self.pending_quit.lock_unpoisoned() = Some(line);
            }
        }
    }

    /// blocks until the worker has exited
    pub fn wait(&self) {
        let mut done = self.done.lock_unpoisoned();
        while !*done {
            done = self
                .done_cond
                .wait(done)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    pub fn is_finished(&self) -> bool {
        *self.done.lock_unpoisoned()
    }
}
