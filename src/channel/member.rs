use crate::{channel::mode::MemberModes, irc::Address};

/// a user as seen in one channel. the same user in two channels is two members.
#[derive(Debug, Clone)]
pub struct Member {
    address: Address,
    pub modes: MemberModes,
    // the name of the channel that owns this member. members never outlive their channel, so the
    // name is enough to find it again.
    channel: String,
}

impl Member {
    pub(crate) fn new(channel: &str, address: Address) -> Self {
        Self {
            address,
            modes: MemberModes::empty(),
            channel: channel.to_string(),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub(crate) fn address_mut(&mut self) -> &mut Address {
        &mut self.address
    }

    pub fn nick(&self) -> &str {
        self.address.nick().unwrap_or_default()
    }

    pub fn channel_name(&self) -> &str {
        self.channel.as_str()
    }

    pub fn is_op(&self) -> bool {
        self.modes.contains(MemberModes::OPERATOR)
    }

    pub fn is_voiced(&self) -> bool {
        self.modes.contains(MemberModes::VOICE)
    }

    pub fn is_owner(&self) -> bool {
        self.modes.contains(MemberModes::OWNER)
    }

    pub fn is_irc_operator(&self) -> bool {
        self.modes.contains(MemberModes::IRC_OPERATOR)
    }

    pub(crate) fn change_modes(&mut self, modes: MemberModes, set: bool) {
        self.modes.set(modes, set);
    }

    pub fn op(&self) -> bool {
        self.change_channel_mode("+o")
    }

    pub fn deop(&self) -> bool {
        self.change_channel_mode("-o")
    }

    pub fn voice(&self) -> bool {
        self.change_channel_mode("+v")
    }

    pub fn unvoice(&self) -> bool {
        self.change_channel_mode("-v")
    }

    fn change_channel_mode(&self, mode: &str) -> bool {
        match self.address.connection() {
            Some(connection) => connection.cmd("MODE", &[self.channel.as_str(), mode, self.nick()]),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes() {
        let mut member = Member::new("#chan", Address::parse(Some("alice!a@host")));
        assert_eq!(member.nick(), "alice");
        assert_eq!(member.channel_name(), "#chan");
        assert!(!member.is_op());

        member.change_modes(MemberModes::OPERATOR | MemberModes::VOICE, true);
        assert!(member.is_op());
        assert!(member.is_voiced());

        member.change_modes(MemberModes::OPERATOR, false);
        assert!(!member.is_op());
        assert!(member.is_voiced());
    }

    #[test]
    fn mode_changes_without_a_connection_do_nothing() {
        let member = Member::new("#chan", Address::parse(Some("alice")));
        assert!(!member.op());
        assert!(!member.unvoice());
    }
}
