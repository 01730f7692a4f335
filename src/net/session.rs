use std::{mem, net::TcpStream, sync::Arc};

use eyre::eyre;
use indexmap::IndexMap;
use log::*;

use crate::{
    channel::{Channel, ChannelCtx, ChannelStatus, NickPrefixes, UserModes},
    config::ServerConfig,
    constants::{
        names::{CHANNEL_STATUS_CHARS, UNTARGETED_COMMANDS},
        numerics::*,
    },
    ext::StrExt,
    hooks::{Event, Hooks},
    irc::{normalize, Address, Command, IrcMessage},
    net::{
        connection::{ConnectErr, Connection, ConnectionState},
        server_io::ServerIo,
    },
};

/// how a login attempt ended, when the socket itself did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginOutcome {
    Welcome,
    Exhausted,
}

/// the model of one network, owned by the connection's worker thread
pub(crate) struct Session {
    conn: Arc<Connection>,
    config: ServerConfig,
    hooks: Arc<Hooks>,

    nick: String,
    nnick: String,
    user_modes: UserModes,
    // keyed by case folded name
    channels: IndexMap<String, Channel>,
    prefixes: NickPrefixes,
    // joined once the next login succeeds
    pending_channels: Vec<String>,
    // whether the current attempt got past login
    reached_running: bool,
}

macro_rules! channel_ctx {
    ($self:ident) => {
        ChannelCtx {
            connection: &$self.conn,
            hooks: &$self.hooks,
            own_nick: &$self.nnick,
            prefixes: &$self.prefixes,
        }
    };
}

impl Session {
    pub fn new(conn: Arc<Connection>, config: ServerConfig, hooks: Arc<Hooks>) -> Self {
        let pending_channels = config.channels.clone();
        Self {
            conn,
            config,
            hooks,
            nick: String::new(),
            nnick: String::new(),
            user_modes: UserModes::empty(),
            channels: IndexMap::new(),
            prefixes: NickPrefixes::default(),
            pending_channels,
            reached_running: false,
        }
    }

    fn set_nick(&mut self, nick: &str) {
        self.nick = nick.to_string();
        self.nnick = normalize(nick);
        self.conn.set_nick(Some(nick));
    }

    // =======================
    // lifecycle
    // =======================

    /// connects, and reconnects while allowed, until the connection is closed for good
    pub fn run(mut self) {
        loop {
            if !self.conn.advance_state(ConnectionState::Connecting) {
                // quit before the socket existed
                self.conn.set_state(ConnectionState::Closed);
                break;
            }
            self.reached_running = false;

            let result = self.attempt();
            self.conn.detach_writer();
            self.end_attempt();

            match &result {
                Ok(()) => info!("[{}:{}] connection closed", self.conn.host(), self.conn.port()),
                Err(e) => {
                    error!("[{}:{}] connection failed: {}", self.conn.host(), self.conn.port(), e);
                    self.conn.advance_state(ConnectionState::Failed);
                }
            }

            let quitting = self.conn.state() == ConnectionState::Quitting;
            if quitting || !(self.reached_running && self.conn.auto_reconnect()) {
                // a login that never succeeded stays failed
                if quitting || self.reached_running {
                    self.conn.set_state(ConnectionState::Closed);
                }
                break;
            }

            info!(
                "[{}:{}] reconnecting, rejoining {} channels",
                self.conn.host(),
                self.conn.port(),
                self.pending_channels.len()
            );
        }
    }

    fn attempt(&mut self) -> Result<(), ConnectErr> {
        info!("[{}:{}] connecting", self.conn.host(), self.conn.port());
        let stream = TcpStream::connect((self.conn.host(), self.conn.port()))?;
        // a quit requested while connecting is sent as soon as the writer is attached
        self.conn.attach_writer(Box::new(stream.try_clone()?));
        let mut io = ServerIo::new(Box::new(stream));
        if self.conn.state() == ConnectionState::Quitting {
            return self.receive(&mut io);
        }

        if self.login(&mut io)? == LoginOutcome::Exhausted {
            return Err(ConnectErr::NicksExhausted);
        }

        if !self.conn.advance_state(ConnectionState::Running) {
            // quit while logging in, wait for the server to close
            return self.receive(&mut io);
        }
        self.reached_running = true;
        info!(
            "[{}:{}] logged in as {}",
            self.conn.host(),
            self.conn.port(),
            self.nick
        );
        self.start_session();
        self.receive(&mut io)
    }

    /// registers with the server, trying each candidate nick in turn
    fn login(&mut self, io: &mut ServerIo) -> Result<LoginOutcome, ConnectErr> {
        if let Some(password) = &self.config.password {
            self.conn.send_raw("PASS", &[password]);
        }

        let nicks = self.config.nicks.clone();
        for (idx, candidate) in nicks.iter().enumerate() {
            self.set_nick(candidate);
            self.conn.send_raw("NICK", &[candidate]);
            if idx == 0 {
                let (user, realname) = (self.config.user.as_str(), self.config.realname.as_str());
                self.conn.send_raw("USER", &[user, "8", "*", realname]);
            }

            loop {
                let Some(line) = io.recv_line()? else {
                    return Err(ConnectErr::Closed);
                };
                let msg = match IrcMessage::parse(&line) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!("[{}:{}] dropping {:?}: {}", self.conn.host(), self.conn.port(), line, e);
                        continue;
                    }
                };

                match msg.command.numeric() {
                    Some(RPL_WELCOME) => {
                        self.process_message(&line, &msg);
                        return Ok(LoginOutcome::Welcome);
                    }
                    Some(code) if NICK_REJECTIONS.contains(&code) => {
                        info!(
                            "[{}:{}] nick {} rejected ({:03})",
                            self.conn.host(),
                            self.conn.port(),
                            candidate,
                            code
                        );
                        break;
                    }
                    _ => self.process_message(&line, &msg),
                }
            }
        }

        Ok(LoginOutcome::Exhausted)
    }

    /// everything done once after login, before receiving
    fn start_session(&mut self) {
        for channel in mem::take(&mut self.pending_channels) {
            self.conn.join(&channel, false);
        }

        if let Some(services) = &self.config.nickserv {
            info!("[{}:{}] identifying to {}", self.conn.host(), self.conn.port(), services.name);
            self.conn
                .privmsg(&services.name, &format!("IDENTIFY {}", services.password));
        }

        self.hooks.dispatch(&self.conn, &Event::Connected);
    }

    fn receive(&mut self, io: &mut ServerIo) -> Result<(), ConnectErr> {
        while let Some(line) = io.recv_line()? {
            self.process_line(&line);
        }
        Ok(())
    }

    /// drops the per-attempt model. tracked channels are joined again on the next attempt.
    fn end_attempt(&mut self) {
        if self.reached_running {
            let mut pending = self
                .channels
                .drain(..)
                .map(|(_, channel)| channel.name().to_string())
                .collect::<Vec<_>>();
            for configured in &self.config.channels {
                if !pending.iter().any(|name| normalize(name) == normalize(configured)) {
                    pending.push(configured.clone());
                }
            }
            self.pending_channels = pending;
        }
        self.channels.clear();
        self.conn.forget_channels();
        self.conn.set_nick(None);
        self.user_modes = UserModes::empty();
        self.prefixes = NickPrefixes::default();
    }

    // =======================
    // dispatch
    // =======================

    /// handles one line from the server. nothing that goes wrong here ends the connection.
    pub fn process_line(&mut self, line: &str) {
        match IrcMessage::parse(line) {
            Ok(msg) => self.process_message(line, &msg),
            Err(e) => warn!(
                "[{}:{}] dropping {:?}: {}",
                self.conn.host(),
                self.conn.port(),
                line,
                e
            ),
        }
    }

    fn process_message(&mut self, line: &str, msg: &IrcMessage) {
        let res = match &msg.command {
            Command::Numeric(code) => self.handle_reply(*code, &msg.params),
            Command::Named(command) => {
                let from = Address::with_link(msg.source.as_deref(), &self.conn);
                self.handle_command(&from, command, &msg.params)
            }
        };

        if let Err(e) = res {
            error!(
                "[{}:{}] error handling {:?}: {:?}",
                self.conn.host(),
                self.conn.port(),
                line,
                e
            );
        }
    }

    fn handle_reply(&mut self, code: u16, params: &[String]) -> eyre::Result<()> {
        if code == RPL_WELCOME {
            if let Some(nick) = params.first() {
                self.set_nick(nick);
            }
        }

        let Some((to, args)) = params.split_first() else {
            return Err(eyre!("reply {:03} has no target", code));
        };
        if normalize(to) != self.nnick {
            debug!("ignoring reply {:03} addressed to {}", code, to);
            return Ok(());
        }

        match code {
            RPL_UMODEIS => {
                self.user_modes = UserModes::empty();
                if let Some(modes) = args.first() {
                    self.user_modes.apply(modes);
                }
                debug!("user modes: {:?}", self.user_modes);
            }
            RPL_ISUPPORT => {
                for token in args {
                    let Some(value) = token.strip_prefix("PREFIX=") else {
                        continue;
                    };
                    match NickPrefixes::parse(value) {
                        Some(prefixes) => self.prefixes = prefixes,
                        None => warn!("invalid PREFIX token {:?}", value),
                    }
                }
            }
            _ => {
                if self.route_reply(code, args) {
                    return Ok(());
                }
            }
        }

        self.hooks
            .dispatch(&self.conn, &Event::ServerReply { code, args });
        Ok(())
    }

    /// forwards a reply to the channel it is about, if any. returns whether a channel took it.
    fn route_reply(&mut self, code: u16, args: &[String]) -> bool {
        let target = match args {
            [status, name, ..]
                if code == RPL_NAMREPLY
                    && status.len() == 1
                    && status.starts_with(CHANNEL_STATUS_CHARS) =>
            {
                name
            }
            [name, ..] => name,
            [] => return false,
        };
        if !target.is_channel_name() {
            return false;
        }

        let nname = normalize(target);
        let Some(channel) = self.channels.get_mut(&nname) else {
            debug!("reply {:03} for untracked channel {}", code, target);
            return false;
        };
        channel.handle_reply(&channel_ctx!(self), code, args);
        true
    }

    fn handle_command(
        &mut self,
        from: &Address,
        command: &str,
        params: &[String],
    ) -> eyre::Result<()> {
        // commands that target a tracked channel belong to it entirely
        if let Some(target) = params
            .first()
            .filter(|_| !UNTARGETED_COMMANDS.contains(&command))
        {
            let nname = normalize(target);
            if let Some(channel) = self.channels.get_mut(&nname) {
                let status = channel.handle_command(&channel_ctx!(self), from, command, &params[1..]);
                if status == ChannelStatus::Left {
                    self.drop_channel(&nname);
                }
                return Ok(());
            }
        }

        let from_self = from.normalized_nick() == self.nnick;
        let handled = match command {
            "PING" => {
                self.conn.send_raw("PONG", params);
                true
            }
            "NICK" => {
                let new_nick = params
                    .first()
                    .ok_or_else(|| eyre!("NICK without a nick"))?;
                self.rename(from, new_nick);
                true
            }
            "JOIN" if from_self => {
                let name = params
                    .first()
                    .ok_or_else(|| eyre!("JOIN without a channel"))?;
                self.join_channel(from, name, &params[1..]);
                return Ok(());
            }
            "QUIT" => {
                self.propagate_quit(from, params);
                true
            }
            "MODE" if params.first().is_some_and(|target| normalize(target) == self.nnick) => {
                if let Some(modes) = params.get(1) {
                    self.user_modes.apply(modes);
                }
                debug!("user modes: {:?}", self.user_modes);
                true
            }
            "PRIVMSG" | "NOTICE"
                if params.first().is_some_and(|target| normalize(target) == self.nnick) =>
            {
                let text = params.get(1).map(String::as_str).unwrap_or_default();
                let event = if command == "PRIVMSG" {
                    Event::PrivateMessage { from, text }
                } else {
                    Event::PrivateNotice { from, text }
                };
                self.hooks.dispatch(&self.conn, &event);
                true
            }
            "ERROR" => {
                warn!(
                    "[{}:{}] server error: {}",
                    self.conn.host(),
                    self.conn.port(),
                    params.last().map(String::as_str).unwrap_or_default()
                );
                true
            }
            _ => false,
        };

        self.hooks.dispatch(
            &self.conn,
            &Event::ServerCommand {
                handled,
                from,
                command,
                args: params,
            },
        );
        Ok(())
    }

    /// starts tracking a channel we joined, and asks for its modes and roster
    fn join_channel(&mut self, from: &Address, name: &str, rest: &[String]) {
        let nname = normalize(name);
        info!("[{}:{}] joined {}", self.conn.host(), self.conn.port(), name);
        let channel = self
            .channels
            .entry(nname.clone())
            .or_insert_with(|| Channel::new(name, &self.conn));
        self.conn.track_channel(&nname);
        channel.request_state();
        channel.handle_command(&channel_ctx!(self), from, "JOIN", rest);
    }

    fn drop_channel(&mut self, nname: &str) {
        if let Some(channel) = self.channels.shift_remove(nname) {
            info!("[{}:{}] left {}", self.conn.host(), self.conn.port(), channel.name());
        }
        self.conn.forget_channel(nname);
    }

    /// follows a nick change into our own nick and every channel
    fn rename(&mut self, from: &Address, new_nick: &str) {
        let old_nnick = from.normalized_nick();
        if old_nnick == self.nnick {
            info!("[{}:{}] now known as {}", self.conn.host(), self.conn.port(), new_nick);
            self.set_nick(new_nick);
        }
        for channel in self.channels.values_mut() {
            channel.rename(&old_nnick, new_nick);
        }
    }

    /// removes a user that quit from every channel they were in
    fn propagate_quit(&mut self, from: &Address, params: &[String]) {
        let nnick = from.normalized_nick();
        if nnick == self.nnick {
            return;
        }
        for channel in self.channels.values_mut() {
            if channel.members().contains_key(&nnick) {
                channel.handle_command(&channel_ctx!(self), from, "QUIT", params);
            }
        }
    }
}
