mod connection;
mod registry;
mod server_io;
mod session;

pub use connection::{ConnectErr, Connection, ConnectionState};
pub use registry::ConnectionRegistry;

#[cfg(test)]
pub(crate) use connection::tests as test_support;
