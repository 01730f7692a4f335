pub const CHANNEL_TYPES: &[char] = ['#', '&'].as_slice();

/// the nick prefixes servers use before announcing `PREFIX=` in RPL_ISUPPORT
pub const DEFAULT_PREFIX_MODES: &str = "ov";
pub const DEFAULT_PREFIX_CHARS: &str = "@+";

/// NAMES replies put one of these before the channel name to describe its visibility
pub const CHANNEL_STATUS_CHARS: &[char] = ['=', '*', '@'].as_slice();

pub const DEFAULT_PORT: u16 = 6667;
pub const DEFAULT_USER: &str = "ircbase";
pub const DEFAULT_REALNAME: &str = "IRC engine";
pub const DEFAULT_NICKSERV: &str = "NickServ";

/// commands whose first parameter is free text or a nick, never a channel to route to
pub const UNTARGETED_COMMANDS: &[&str] = &["PING", "PONG", "NICK", "QUIT", "ERROR"];
