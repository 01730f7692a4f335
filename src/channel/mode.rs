use bitflags::bitflags;
use thiserror::Error;

use crate::constants::names::{DEFAULT_PREFIX_CHARS, DEFAULT_PREFIX_MODES};

bitflags! {
    /// flags set on a channel
    pub struct ChannelModes: u16 {
        const ANONYMOUS = 0x001;
        const INVITE_ONLY = 0x002;
        const MODERATED = 0x004;
        const NO_MESSAGES = 0x008;
        const QUIET = 0x010;
        const PRIVATE = 0x020;
        const SECRET = 0x040;
        const RE_OP = 0x080;
        const TOPIC_OP_ONLY = 0x100;
    }
}

impl ChannelModes {
    /// the flag toggled by a mode letter that takes no argument
    pub fn from_letter(letter: char) -> Option<Self> {
        Some(match letter {
            'a' => ChannelModes::ANONYMOUS,
            'i' => ChannelModes::INVITE_ONLY,
            'm' => ChannelModes::MODERATED,
            'n' => ChannelModes::NO_MESSAGES,
            // NOTE: on UnrealIRCd `q` is the channel owner prefix instead. those servers send it
            // as a prefix in NAMES, which is handled separately.
            'q' => ChannelModes::QUIET,
            'p' => ChannelModes::PRIVATE,
            's' => ChannelModes::SECRET,
            'r' => ChannelModes::RE_OP,
            't' => ChannelModes::TOPIC_OP_ONLY,
            _ => return None,
        })
    }
}

bitflags! {
    /// the status a member has in one channel
    pub struct MemberModes: u16 {
        const OPERATOR = 0x001;
        const VOICE = 0x002;
        const IRC_OPERATOR = 0x004;
        const OWNER = 0x100;
    }
}

impl MemberModes {
    /// the status granted by a prefix mode letter from `PREFIX=`
    pub fn from_prefix_mode(letter: char) -> Option<Self> {
        match letter {
            'q' => Some(MemberModes::OWNER),
            'o' => Some(MemberModes::OPERATOR),
            'v' => Some(MemberModes::VOICE),
            _ => None,
        }
    }
}

bitflags! {
    /// the modes of our own user on the network
    pub struct UserModes: u16 {
        const AWAY = 0x01;
        const INVISIBLE = 0x02;
        const WALLOPS = 0x04;
        const RESTRICTED = 0x08;
        const OPERATOR = 0x10;
        const LOCAL_OPERATOR = 0x20;
        const SERVER_NOTICES = 0x40;
    }
}

impl UserModes {
    pub fn from_letter(letter: char) -> Option<Self> {
        Some(match letter {
            'a' => UserModes::AWAY,
            'i' => UserModes::INVISIBLE,
            'w' => UserModes::WALLOPS,
            'r' => UserModes::RESTRICTED,
            'o' => UserModes::OPERATOR,
            'O' => UserModes::LOCAL_OPERATOR,
            's' => UserModes::SERVER_NOTICES,
            _ => return None,
        })
    }

    /// applies a mode string such as `+iw-s`. unknown letters are ignored.
    pub fn apply(&mut self, modes: &str) {
        for (set, letter) in mode_letters(modes) {
            if let Some(flag) = UserModes::from_letter(letter) {
                self.set(flag, set);
            }
        }
    }
}

/// walks a mode string, yielding each letter with whether it is being set or cleared. `+` and `-`
/// switch the polarity for the letters after them; letters before any sign are set.
pub fn mode_letters(modes: &str) -> impl Iterator<Item = (bool, char)> + '_ {
    let mut set = true;
    modes.chars().filter_map(move |c| match c {
        '+' => {
            set = true;
            None
        }
        '-' => {
            set = false;
            None
        }
        letter => Some((set, letter)),
    })
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModeErr {
    #[error("mode {sign}{letter} is missing its argument")]
    MissingArgument { sign: char, letter: char },
}

/// the mapping between prefix mode letters and the characters shown before nicks in NAMES and
/// WHO replies, e.g. `o` and `@`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NickPrefixes {
    modes: Vec<char>,
    prefixes: Vec<char>,
}

impl Default for NickPrefixes {
    fn default() -> Self {
        Self {
            modes: DEFAULT_PREFIX_MODES.chars().collect(),
            prefixes: DEFAULT_PREFIX_CHARS.chars().collect(),
        }
    }
}

impl NickPrefixes {
    /// parses the value of a `PREFIX=` token, e.g. `(qov)~@+`
    pub fn parse(value: &str) -> Option<Self> {
        let rest = value.strip_prefix('(')?;
        let (modes, prefixes) = rest.split_once(')')?;
        let modes = modes.chars().collect::<Vec<_>>();
        let prefixes = prefixes.chars().collect::<Vec<_>>();
        (modes.len() == prefixes.len()).then_some(Self { modes, prefixes })
    }

    pub fn mode_for(&self, prefix: char) -> Option<char> {
        let idx = self.prefixes.iter().position(|&p| p == prefix)?;
        self.modes.get(idx).copied()
    }

    /// whether a mode letter is a prefix mode, and so takes a nick as its argument
    pub fn has_mode(&self, letter: char) -> bool {
        self.modes.contains(&letter)
    }

    pub fn is_prefix(&self, c: char) -> bool {
        self.prefixes.contains(&c)
    }

    /// splits the leading prefix characters off a nick, returning the member status they grant
    /// and the bare nick
    pub fn split_nick<'a>(&self, nick: &'a str) -> (MemberModes, &'a str) {
        let bare = nick.trim_start_matches(|c| self.is_prefix(c));
        let modes = nick[..nick.len() - bare.len()]
            .chars()
            .filter_map(|prefix| self.mode_for(prefix))
            .filter_map(MemberModes::from_prefix_mode)
            .fold(MemberModes::empty(), |acc, m| acc | m);
        (modes, bare)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polarity_switches() {
        let letters = mode_letters("+ov-k").collect::<Vec<_>>();
        assert_eq!(letters, vec![(true, 'o'), (true, 'v'), (false, 'k')]);
        assert_eq!(mode_letters("i").collect::<Vec<_>>(), vec![(true, 'i')]);
    }

    #[test]
    fn user_modes() {
        let mut modes = UserModes::empty();
        modes.apply("+iwx");
        assert_eq!(modes, UserModes::INVISIBLE | UserModes::WALLOPS);
        modes.apply("-w+o");
        assert_eq!(modes, UserModes::INVISIBLE | UserModes::OPERATOR);
    }

    #[test]
    fn default_prefixes() {
        let prefixes = NickPrefixes::default();
        assert_eq!(prefixes.mode_for('@'), Some('o'));
        assert_eq!(prefixes.mode_for('+'), Some('v'));
        assert_eq!(prefixes.mode_for('%'), None);
    }

    #[test]
    fn isupport_prefixes() {
        let prefixes = NickPrefixes::parse("(qaohv)~&@%+").unwrap();
        assert_eq!(prefixes.mode_for('~'), Some('q'));
        assert_eq!(prefixes.mode_for('%'), Some('h'));
        assert!(NickPrefixes::parse("(ov)@").is_none());
        assert!(NickPrefixes::parse("ov@+").is_none());
    }

    #[test]
    fn split_nick() {
        let prefixes = NickPrefixes::parse("(qov)~@+").unwrap();
        assert_eq!(
            prefixes.split_nick("~@alice"),
            (MemberModes::OWNER | MemberModes::OPERATOR, "alice")
        );
        assert_eq!(prefixes.split_nick("+bob"), (MemberModes::VOICE, "bob"));
        assert_eq!(prefixes.split_nick("carol"), (MemberModes::empty(), "carol"));
    }

    #[test]
    fn missing_argument_message() {
        let err = ModeErr::MissingArgument {
            sign: '-',
            letter: 'k',
        };
        assert_eq!(err.to_string(), "mode -k is missing its argument");
    }
}
