use core::fmt::{self, Display};
use std::sync::{Arc, Weak};

use crate::net::Connection;

/// normalizes a nick name using IRC case folding: ascii lowercase, and `[]\` become `{}|`.
pub fn normalize(nick: &str) -> String {
    nick.chars()
        .map(|c| match c {
            '[' => '{',
            ']' => '}',
            '\\' => '|',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// a mask-style address such as `nick!user@host`. a null address has no parts at all.
#[derive(Debug, Clone, Default)]
pub struct Address {
    nick: Option<String>,
    user: Option<String>,
    host: Option<String>,
    // the connection that messages to this address are sent through
    link: Option<Weak<Connection>>,
}

impl Address {
    /// parses a mask. tried in order: `nick!user@host`, then a host name (anything with a `.`),
    /// then a bare nick. an absent or empty mask is the null address.
    pub fn parse(mask: Option<&str>) -> Self {
        let mut address = Address::default();
        address.set_mask(mask.unwrap_or_default());
        address
    }

    /// parses a mask and attaches the connection that sends on this address' behalf
    pub fn with_link(mask: Option<&str>, connection: &Arc<Connection>) -> Self {
        let mut address = Address::parse(mask);
        address.link = Some(Arc::downgrade(connection));
        address
    }

    /// replaces the nick, user and host with the ones in `mask`, keeping the connection link
    pub fn set_mask(&mut self, mask: &str) {
        let full = mask.split_once('!').and_then(|(nick, rest)| {
            let (user, host) = rest.split_once('@')?;
            (!nick.is_empty() && !user.is_empty() && !host.is_empty()).then_some((nick, user, host))
        });

        (self.nick, self.user, self.host) = match full {
            Some((nick, user, host)) => (
                Some(nick.to_string()),
                Some(user.to_string()),
                Some(host.to_string()),
            ),
            None if mask.is_empty() => (None, None, None),
            // host style, typically a server
            None if mask.contains('.') => (Some(mask.to_string()), None, Some(mask.to_string())),
            None => (Some(mask.to_string()), None, None),
        };
    }

    /// reconstructs `nick!user@host`, leaving absent parts empty
    pub fn mask(&self) -> String {
        format!(
            "{}!{}@{}",
            self.nick().unwrap_or_default(),
            self.user().unwrap_or_default(),
            self.host().unwrap_or_default()
        )
    }

    pub fn nick(&self) -> Option<&str> {
        self.nick.as_deref()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// the case folded nick, empty for the null address
    pub fn normalized_nick(&self) -> String {
        normalize(self.nick().unwrap_or_default())
    }

    pub fn is_null(&self) -> bool {
        self.nick.is_none()
    }

    pub(crate) fn set_nick(&mut self, nick: &str) {
        self.nick = Some(nick.to_string());
    }

    /// the connection this address sends through, if it is still alive
    pub fn connection(&self) -> Option<Arc<Connection>> {
        self.link.as_ref().and_then(Weak::upgrade)
    }

    /// sends a PRIVMSG to this nick. does nothing without a connection.
    pub fn privmsg(&self, text: &str) -> bool {
        match (self.connection(), self.nick()) {
            (Some(connection), Some(nick)) => connection.privmsg(nick, text),
            _ => false,
        }
    }

    /// sends a NOTICE to this nick. does nothing without a connection.
    pub fn notice(&self, text: &str) -> bool {
        match (self.connection(), self.nick()) {
            (Some(connection), Some(nick)) => connection.notice(nick, text),
            _ => false,
        }
    }

    /// sends a CTCP ACTION to this nick. does nothing without a connection.
    pub fn action(&self, text: &str) -> bool {
        match (self.connection(), self.nick()) {
            (Some(connection), Some(nick)) => connection.action(nick, text),
            _ => false,
        }
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.nick().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_mask_round_trips() {
        for mask in [
            "cryo!cryo@cyan-FF40245A.cyanite.org",
            "a!b@c",
            "nick!~user@2001:db8::1",
            "weird!u@h@x",
        ] {
            assert_eq!(Address::parse(Some(mask)).mask(), mask);
        }
    }

    #[test]
    fn full_mask_parts() {
        let address = Address::parse(Some("nick!user@host.example"));
        assert_eq!(address.nick(), Some("nick"));
        assert_eq!(address.user(), Some("user"));
        assert_eq!(address.host(), Some("host.example"));
    }

    #[test]
    fn host_style() {
        let address = Address::parse(Some("irc.example.org"));
        assert_eq!(address.nick(), Some("irc.example.org"));
        assert_eq!(address.user(), None);
        assert_eq!(address.host(), Some("irc.example.org"));
        assert_eq!(address.mask(), "irc.example.org!@irc.example.org");
    }

    #[test]
    fn bare_nick() {
        let address = Address::parse(Some("alice"));
        assert_eq!(address.nick(), Some("alice"));
        assert_eq!(address.user(), None);
        assert_eq!(address.host(), None);
        assert_eq!(address.mask(), "alice!@");
    }

    #[test]
    fn null_address() {
        for address in [Address::parse(None), Address::parse(Some(""))] {
            assert!(address.is_null());
            assert_eq!(address.nick(), None);
            assert_eq!(address.mask(), "!@");
        }
    }

    #[test]
    fn sending_without_a_connection_is_a_no_op() {
        let address = Address::parse(Some("alice!a@host"));
        assert!(!address.privmsg("hi"));
        assert!(!address.notice("hi"));
        assert!(!address.action("waves"));
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize("A[]"), normalize("a{}"));
        assert_eq!(normalize("Nick\\Name"), "nick|name");
        for nick in ["MiXeD[Case]", "plain", "\\|[]{}", ""] {
            assert_eq!(normalize(&normalize(nick)), normalize(nick));
        }
    }
}
