mod address;
mod command;
mod message;
mod param;

pub use address::{normalize, Address};
pub use command::{format_command, CommandToStringErr};
pub use message::{Command, IrcMessage, IrcParseErr};
