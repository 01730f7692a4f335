pub const RPL_WELCOME: u16 = 1;
pub const RPL_ISUPPORT: u16 = 5;

pub const RPL_UMODEIS: u16 = 221;

pub const RPL_ENDOFWHO: u16 = 315;
pub const RPL_CHANNELMODEIS: u16 = 324;
pub const RPL_NOTOPIC: u16 = 331;
pub const RPL_TOPIC: u16 = 332;
pub const RPL_TOPICWHOTIME: u16 = 333;
pub const RPL_INVITELIST: u16 = 346;
pub const RPL_ENDOFINVITELIST: u16 = 347;
pub const RPL_EXCEPTLIST: u16 = 348;
pub const RPL_ENDOFEXCEPTLIST: u16 = 349;
pub const RPL_WHOREPLY: u16 = 352;
pub const RPL_NAMREPLY: u16 = 353;
pub const RPL_ENDOFNAMES: u16 = 366;
pub const RPL_BANLIST: u16 = 367;
pub const RPL_ENDOFBANLIST: u16 = 368;

pub const ERR_NONICKNAMEGIVEN: u16 = 431;
pub const ERR_ERRONEUSNICKNAME: u16 = 432;
pub const ERR_NICKNAMEINUSE: u16 = 433;
pub const ERR_NICKCOLLISION: u16 = 436;
pub const ERR_UNAVAILRESOURCE: u16 = 437;
// some servers answer an empty NICK with 413 instead of 431
pub const ERR_NOTOPLEVEL: u16 = 413;

/// replies that reject the nick sent during registration. the next candidate nick is tried when
/// one of these arrives.
pub const NICK_REJECTIONS: &[u16] = &[
    ERR_NOTOPLEVEL,
    ERR_NONICKNAMEGIVEN,
    ERR_ERRONEUSNICKNAME,
    ERR_NICKNAMEINUSE,
    ERR_NICKCOLLISION,
    ERR_UNAVAILRESOURCE,
];
