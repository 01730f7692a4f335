mod channel;
mod member;
mod mode;
mod scan;


pub(crate) use channel::{ChannelCtx, ChannelStatus};
pub use channel::Channel;
pub use member::Member;
pub use mode::{mode_letters, ChannelModes, MemberModes, ModeErr, NickPrefixes, UserModes};
pub use scan::{ListKind, RosterScanKind};
