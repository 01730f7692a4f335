//! an IRC client protocol engine: keeps connections to IRC networks alive, models their channels
//! and members, and reports what happens on them to registered hooks.

pub mod channel;
pub mod config;
pub mod constants;
pub mod ext;
pub mod hooks;
pub mod irc;
pub mod logging;
pub mod net;

pub use channel::{Channel, Member};
pub use config::{ConfigLookup, ConfigTree, ServerConfig};
pub use hooks::{Actor, Event, HookKind, Hooks};
pub use irc::Address;
pub use net::{Connection, ConnectionRegistry, ConnectionState};
