use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use log::*;

use crate::{
    channel::{
        mode::{mode_letters, ChannelModes, MemberModes, ModeErr, NickPrefixes},
        scan::{self, ListKind, RosterScanKind, Scans},
        Member,
    },
    constants::numerics::*,
    hooks::{Actor, Event, Hooks},
    irc::{normalize, Address},
    net::Connection,
};

/// the member status bits that NAMES and WHO prefixes describe
const PREFIX_STATUS: MemberModes = MemberModes::from_bits_truncate(
    MemberModes::OWNER.bits() | MemberModes::OPERATOR.bits() | MemberModes::VOICE.bits(),
);

/// what a channel needs from its connection while handling one event
pub(crate) struct ChannelCtx<'a> {
    pub connection: &'a Arc<Connection>,
    pub hooks: &'a Hooks,
    /// our own case folded nick
    pub own_nick: &'a str,
    pub prefixes: &'a NickPrefixes,
}

impl ChannelCtx<'_> {
    fn dispatch(&self, event: &Event<'_>) {
        self.hooks.dispatch(self.connection, event);
    }
}

/// whether the channel is still joined after handling an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChannelStatus {
    Joined,
    Left,
}

#[derive(Debug)]
pub struct Channel {
    // the name of the channel as first seen, including the kind prefix (so it is suitable for
    // direct use as a target)
    name: String,
    nname: String,
    link: Weak<Connection>,

    topic: Option<String>,
    previous_topic: Option<String>,
    topic_setter: Option<String>,
    topic_set_at: Option<DateTime<Utc>>,

    modes: ChannelModes,
    limit: Option<u32>,
    password: Option<String>,
    bans: IndexSet<String>,
    exceptions: IndexSet<String>,
    invites: IndexSet<String>,

    // keyed by case folded nick
    members: IndexMap<String, Member>,
    // true until the first WHO scan after joining completes
    booting: bool,
    scans: Scans,
}

impl Channel {
    pub(crate) fn new(name: &str, connection: &Arc<Connection>) -> Self {
        Self {
            name: name.to_string(),
            nname: normalize(name),
            link: Arc::downgrade(connection),
            topic: None,
            previous_topic: None,
            topic_setter: None,
            topic_set_at: None,
            modes: ChannelModes::empty(),
            limit: None,
            password: None,
            bans: IndexSet::new(),
            exceptions: IndexSet::new(),
            invites: IndexSet::new(),
            members: IndexMap::new(),
            booting: true,
            scans: Scans::default(),
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// the case folded name, which is also the channel's key in its connection
    pub fn normalized_name(&self) -> &str {
        self.nname.as_str()
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn previous_topic(&self) -> Option<&str> {
        self.previous_topic.as_deref()
    }

    pub fn topic_setter(&self) -> Option<&str> {
        self.topic_setter.as_deref()
    }

    pub fn topic_set_at(&self) -> Option<DateTime<Utc>> {
        self.topic_set_at
    }

    pub fn modes(&self) -> ChannelModes {
        self.modes
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn bans(&self) -> &IndexSet<String> {
        &self.bans
    }

    pub fn exceptions(&self) -> &IndexSet<String> {
        &self.exceptions
    }

    pub fn invites(&self) -> &IndexSet<String> {
        &self.invites
    }

    pub fn list(&self, kind: ListKind) -> &IndexSet<String> {
        match kind {
            ListKind::Bans => &self.bans,
            ListKind::Exceptions => &self.exceptions,
            ListKind::Invites => &self.invites,
        }
    }

    fn list_mut(&mut self, kind: ListKind) -> &mut IndexSet<String> {
        match kind {
            ListKind::Bans => &mut self.bans,
            ListKind::Exceptions => &mut self.exceptions,
            ListKind::Invites => &mut self.invites,
        }
    }

    /// the roster, keyed by case folded nick
    pub fn members(&self) -> &IndexMap<String, Member> {
        &self.members
    }

    pub fn member(&self, nick: &str) -> Option<&Member> {
        self.members.get(&normalize(nick))
    }

    pub fn is_booting(&self) -> bool {
        self.booting
    }

    /// whether a NAMES or WHO listing is being received
    pub fn roster_scan_active(&self, kind: RosterScanKind) -> bool {
        self.scans.roster_active(kind)
    }

    /// whether one of the mask lists is being received
    pub fn list_scan_active(&self, kind: ListKind) -> bool {
        self.scans.list_active(kind)
    }

    // =======================
    // sending
    // =======================

    fn cmd(&self, command: &str, args: &[&str]) -> bool {
        match self.link.upgrade() {
            Some(connection) => connection.cmd(command, args),
            None => false,
        }
    }

    pub fn privmsg(&self, text: &str) -> bool {
        self.cmd("PRIVMSG", &[self.name(), text])
    }

    pub fn notice(&self, text: &str) -> bool {
        self.cmd("NOTICE", &[self.name(), text])
    }

    pub fn action(&self, text: &str) -> bool {
        self.privmsg(&format!("\u{1}ACTION {}\u{1}", text))
    }

    /// sends a MODE change for this channel, e.g. `mode("+o", &["nick"])`. op and voice do not
    /// check that the nick is on the roster; use the methods on [`Member`] for that.
    pub fn mode(&self, modes: &str, args: &[&str]) -> bool {
        let mut all = vec![self.name(), modes];
        all.extend_from_slice(args);
        self.cmd("MODE", &all)
    }

    pub fn op(&self, nick: &str, set: bool) -> bool {
        self.mode(if set { "+o" } else { "-o" }, &[nick])
    }

    pub fn voice(&self, nick: &str, set: bool) -> bool {
        self.mode(if set { "+v" } else { "-v" }, &[nick])
    }

    pub fn part(&self, reason: Option<&str>) -> bool {
        match reason {
            Some(reason) => self.cmd("PART", &[self.name(), reason]),
            None => self.cmd("PART", &[self.name()]),
        }
    }

    /// asks for the channel modes and a WHO scan of the roster. sent right after joining, and may
    /// be sent again to refresh the roster.
    pub fn request_state(&self) -> bool {
        self.cmd("MODE", &[self.name()]) && self.cmd("WHO", &[self.name()])
    }

    pub fn request_names(&self) -> bool {
        self.cmd("NAMES", &[self.name()])
    }

    /// asks for one of the mask lists. the current list is replaced once the reply is complete.
    pub fn request_list(&self, kind: ListKind) -> bool {
        let letter = kind.letter().to_string();
        self.cmd("MODE", &[self.name(), letter.as_str()])
    }

    // =======================
    // model updates
    // =======================

    fn set_topic(&mut self, topic: Option<String>) {
        self.previous_topic = self.topic.take();
        self.topic = topic;
    }

    /// follows a nick change. the member keeps its modes.
    pub(crate) fn rename(&mut self, old_nnick: &str, new_nick: &str) -> bool {
        let Some(mut member) = self.members.shift_remove(old_nnick) else {
            return false;
        };
        let new_nnick = normalize(new_nick);
        member.address_mut().set_nick(new_nick);
        self.members.insert(new_nnick.clone(), member);
        self.scans.rename(old_nnick, &new_nnick);
        true
    }

    /// applies a mode change: the mode letters followed by their arguments, e.g.
    /// `["+ov-k", "alice", "bob", "key"]`. letters that come before a missing argument stay
    /// applied; the rest of the change is dropped.
    pub(crate) fn apply_modes(
        &mut self,
        args: &[String],
        prefixes: &NickPrefixes,
    ) -> Result<(), ModeErr> {
        let Some((modes, rest)) = args.split_first() else {
            return Ok(());
        };
        let mut params = rest.iter();

        for (set, letter) in mode_letters(modes) {
            let sign = if set { '+' } else { '-' };
            let mut next_param = || {
                params
                    .next()
                    .ok_or(ModeErr::MissingArgument { sign, letter })
            };

            // NOTE: prefix modes announced by the server win over the channel flags, since
            // UnrealIRCd uses `q` for channel owners instead of quiet channels.
            if letter == 'o' || letter == 'v' || prefixes.has_mode(letter) {
                let nick = next_param()?;
                let status = MemberModes::from_prefix_mode(letter);
                match (self.members.get_mut(&normalize(nick)), status) {
                    (Some(member), Some(status)) => member.change_modes(status, set),
                    (None, _) => debug!("{}: mode {}{} for unknown nick {}", self.name, sign, letter, nick),
                    (Some(_), None) => {}
                }
                continue;
            }

            match letter {
                'k' => {
                    let key = next_param()?;
                    self.password = set.then(|| key.clone());
                }
                'l' => {
                    // NOTE: removing the limit does not take an argument
                    if set {
                        let limit = next_param()?;
                        self.limit = limit.parse().ok();
                        if self.limit.is_none() {
                            warn!("{}: invalid channel limit {:?}", self.name, limit);
                        }
                    } else {
                        self.limit = None;
                    }
                }
                'b' | 'e' | 'I' => {
                    let mask = next_param()?.clone();
                    // UNWRAP: the match arm only covers list letters
                    let list = self.list_mut(ListKind::from_letter(letter).unwrap());
                    if set {
                        list.insert(mask);
                    } else {
                        list.shift_remove(&mask);
                    }
                }
                // channel creator status is not tracked
                'O' => {}
                other => {
                    if let Some(flag) = ChannelModes::from_letter(other) {
                        self.modes.set(flag, set);
                    }
                }
            }
        }

        Ok(())
    }

    /// the actor for a nick: the member if they are on the roster, otherwise the bare address
    fn actor<'a>(&'a self, nnick: &str, from: &'a Address) -> Actor<'a> {
        match self.members.get(nnick) {
            Some(member) => Actor::Member(member),
            None => Actor::Address(from),
        }
    }

    /// finds or creates the member for a nick seen in a NAMES or WHO reply
    fn scanned_member(&mut self, ctx: &ChannelCtx<'_>, nick: &str) -> &mut Member {
        let nnick = normalize(nick);
        let name = self.name.as_str();
        self.members
            .entry(nnick)
            .or_insert_with(|| Member::new(name, Address::with_link(Some(nick), ctx.connection)))
    }

    // =======================
    // inbound
    // =======================

    /// handles a named command addressed to this channel. `args` are the parameters after the
    /// channel name.
    pub(crate) fn handle_command(
        &mut self,
        ctx: &ChannelCtx<'_>,
        from: &Address,
        command: &str,
        args: &[String],
    ) -> ChannelStatus {
        let nnick = from.normalized_nick();
        let text = args.first().map(String::as_str).unwrap_or_default();
        let mut status = ChannelStatus::Joined;
        // the sender, if this command took them off the roster
        let mut departed = None;

        let handled = match command {
            "TOPIC" => {
                self.set_topic(args.first().cloned());
                self.topic_setter = from.nick().map(str::to_string);
                self.topic_set_at = Some(Utc::now());
                ctx.dispatch(&Event::Topic {
                    channel: self,
                    by: Some(self.actor(&nnick, from)),
                });
                true
            }
            "PRIVMSG" => {
                ctx.dispatch(&Event::ChannelMessage {
                    channel: self,
                    from: self.actor(&nnick, from),
                    text,
                });
                true
            }
            "NOTICE" => {
                ctx.dispatch(&Event::ChannelNotice {
                    channel: self,
                    from: self.actor(&nnick, from),
                    text,
                });
                true
            }
            "JOIN" => {
                let member = Member::new(&self.name, from.clone());
                self.members.insert(nnick.clone(), member);
                if let Some(member) = self.members.get(&nnick) {
                    ctx.dispatch(&Event::Join {
                        channel: self,
                        member,
                    });
                }
                true
            }
            "PART" | "QUIT" => {
                if nnick == ctx.own_nick {
                    ctx.dispatch(&Event::Part {
                        channel: self,
                        who: self.actor(&nnick, from),
                    });
                    status = ChannelStatus::Left;
                } else {
                    departed = self.members.shift_remove(&nnick);
                    ctx.dispatch(&Event::Part {
                        channel: self,
                        who: departed
                            .as_ref()
                            .map_or(Actor::Address(from), Actor::Member),
                    });
                }
                true
            }
            "KICK" => {
                match args.first().map(|victim| normalize(victim)) {
                    Some(victim) if victim == ctx.own_nick => status = ChannelStatus::Left,
                    Some(victim) => {
                        self.members.shift_remove(&victim);
                    }
                    None => warn!("{}: KICK without a nick", self.name),
                }
                false
            }
            "MODE" => {
                if let Err(e) = self.apply_modes(args, ctx.prefixes) {
                    warn!("{}: {} in MODE {:?}", self.name, e, args);
                }
                false
            }
            _ => false,
        };

        let from = match &departed {
            Some(member) => Actor::Member(member),
            None => self.actor(&nnick, from),
        };
        ctx.dispatch(&Event::ChannelCommand {
            channel: self,
            handled,
            from,
            command,
            args,
        });

        status
    }

    /// handles a numeric reply about this channel. `args` are the parameters after our own nick.
    pub(crate) fn handle_reply(&mut self, ctx: &ChannelCtx<'_>, code: u16, args: &[String]) {
        match code {
            RPL_TOPIC => {
                self.set_topic(args.get(1).cloned());
                ctx.dispatch(&Event::Topic {
                    channel: self,
                    by: None,
                });
            }
            RPL_NOTOPIC => {
                self.set_topic(None);
                ctx.dispatch(&Event::Topic {
                    channel: self,
                    by: None,
                });
            }
            RPL_TOPICWHOTIME => {
                self.topic_setter = args.get(1).cloned();
                self.topic_set_at = args
                    .get(2)
                    .and_then(|time| time.parse::<i64>().ok())
                    .and_then(|secs| DateTime::from_timestamp(secs, 0));
            }
            RPL_CHANNELMODEIS => {
                if let Err(e) = self.apply_modes(args.get(1..).unwrap_or_default(), ctx.prefixes) {
                    warn!("{}: {} in RPL_CHANNELMODEIS {:?}", self.name, e, args);
                }
                debug!("modes for {}: {:?}", self.name, self.modes);
            }

            // =======================
            // roster scans
            // =======================
            RPL_NAMREPLY => {
                // the names are trailing, after an optional channel status character
                let Some(names) = args.get(1..).and_then(<[String]>::last) else {
                    warn!("{}: RPL_NAMREPLY missing names", self.name);
                    return;
                };
                for entry in names.split_whitespace() {
                    let (status, nick) = ctx.prefixes.split_nick(entry);
                    if nick.is_empty() {
                        continue;
                    }
                    self.scans.saw_member(RosterScanKind::Names, normalize(nick));
                    let member = self.scanned_member(ctx, nick);
                    member.modes = (member.modes - PREFIX_STATUS) | status;
                }
            }
            RPL_ENDOFNAMES => {
                self.finish_roster_scan(RosterScanKind::Names);
            }
            RPL_WHOREPLY => {
                let [_, user, host, _server, nick, flags, ..] = args else {
                    warn!("{}: RPL_WHOREPLY missing params: {:?}", self.name, args);
                    return;
                };
                self.scans.saw_member(RosterScanKind::Who, normalize(nick));
                let prefixes = ctx.prefixes;
                let member = self.scanned_member(ctx, nick);
                member
                    .address_mut()
                    .set_mask(&format!("{}!{}@{}", nick, user, host));

                // flags look like `H*@`: here or gone, `*` for IRC operators, then prefixes
                let status = flags
                    .chars()
                    .filter_map(|c| prefixes.mode_for(c))
                    .filter_map(MemberModes::from_prefix_mode)
                    .fold(MemberModes::empty(), |acc, m| acc | m);
                member.modes = (member.modes - PREFIX_STATUS) | status;
                member.change_modes(MemberModes::IRC_OPERATOR, flags.contains('*'));
            }
            RPL_ENDOFWHO => {
                self.finish_roster_scan(RosterScanKind::Who);
                if self.booting {
                    self.booting = false;
                    info!("channel {} joined with {} members", self.name, self.members.len());
                    ctx.dispatch(&Event::ChannelInit { channel: self });
                }
            }

            // =======================
            // mask lists
            // =======================
            code => match ListKind::from_reply(code) {
                Some((kind, false)) => match args.get(1) {
                    Some(mask) => self.scans.push_list_item(kind, mask.clone()),
                    None => warn!("{}: {:?} list entry without a mask", self.name, kind),
                },
                Some((kind, true)) => {
                    let items = self.scans.finish_list(kind);
                    *self.list_mut(kind) = items.into_iter().collect();
                }
                None => {}
            },
        }

        ctx.dispatch(&Event::ChannelReply {
            channel: self,
            code,
            args,
        });
    }

    fn finish_roster_scan(&mut self, kind: RosterScanKind) {
        let seen = self.scans.finish_roster(kind);
        let dropped = scan::reconcile_roster(&mut self.members, &seen);
        if dropped > 0 {
            debug!("{}: {:?} scan dropped {} stale members", self.name, kind, dropped);
        }
        trace!(
            "{} members: {}",
            self.name,
            self.members
                .values()
                .map(|m| format!("{} ({:?})", m.nick(), m.modes))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
}
