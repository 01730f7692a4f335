use std::{fs, io, path::Path};

use thiserror::Error;
use toml::{Table, Value};

use crate::constants::names::{DEFAULT_NICKSERV, DEFAULT_PORT, DEFAULT_REALNAME, DEFAULT_USER};

#[derive(Debug, Error)]
pub enum ConfigErr {
    #[error("failed to read config file: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing required key {0}")]
    Missing(String),
    #[error("key {key} should be {expected}")]
    WrongType { key: String, expected: &'static str },
}

/// read access to hierarchical configuration, addressed by slash separated paths such as
/// `servers/libera/services/nickserv/password`. empty path segments are ignored.
pub trait ConfigLookup {
    fn get(&self, path: &str) -> Option<&Value>;

    fn get_str(&self, path: &str) -> Result<Option<&str>, ConfigErr> {
        match self.get(path) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(wrong_type(path, "a string")),
        }
    }

    fn get_bool(&self, path: &str) -> Result<Option<bool>, ConfigErr> {
        match self.get(path) {
            None => Ok(None),
            Some(Value::Boolean(b)) => Ok(Some(*b)),
            Some(_) => Err(wrong_type(path, "a boolean")),
        }
    }

    /// a list of strings. a single string is a list of one.
    fn get_str_list(&self, path: &str) -> Result<Vec<String>, ConfigErr> {
        match self.get(path) {
            None => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    _ => Err(wrong_type(path, "a list of strings")),
                })
                .collect(),
            Some(_) => Err(wrong_type(path, "a string or a list of strings")),
        }
    }
}

fn wrong_type(key: &str, expected: &'static str) -> ConfigErr {
    ConfigErr::WrongType {
        key: key.to_string(),
        expected,
    }
}

/// configuration backed by a TOML document
#[derive(Debug, Clone, Default)]
pub struct ConfigTree {
    root: Table,
}

impl ConfigTree {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigErr> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigErr> {
        Ok(Self {
            root: content.parse::<Table>()?,
        })
    }

    /// the names of every server table under `servers`
    pub fn server_names(&self) -> Vec<String> {
        match self.get("servers") {
            Some(Value::Table(servers)) => servers
                .iter()
                .filter(|(_, server)| server.is_table())
                .map(|(name, _)| name.clone())
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl ConfigLookup for ConfigTree {
    fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let mut value = self.root.get(segments.next()?)?;
        for segment in segments {
            value = value.as_table()?.get(segment)?;
        }
        Some(value)
    }
}

/// the login sent to a services bot right after connecting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicesLogin {
    pub name: String,
    pub password: String,
}

/// everything needed to connect to one server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    /// tried in order at login
    pub nicks: Vec<String>,
    pub user: String,
    pub realname: String,
    pub password: Option<String>,
    /// joined after login
    pub channels: Vec<String>,
    pub auto_reconnect: bool,
    pub nickserv: Option<ServicesLogin>,
}

impl ServerConfig {
    pub fn new<I, S>(name: &str, host: &str, nicks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            host: host.to_string(),
            port: DEFAULT_PORT,
            nicks: nicks.into_iter().map(Into::into).collect(),
            user: DEFAULT_USER.to_string(),
            realname: DEFAULT_REALNAME.to_string(),
            password: None,
            channels: Vec::new(),
            auto_reconnect: false,
            nickserv: None,
        }
    }

    /// reads the server definition at `servers/<name>`
    pub fn from_lookup(name: &str, lookup: &impl ConfigLookup) -> Result<Self, ConfigErr> {
        let key = |rest: &str| format!("servers/{}/{}", name, rest);

        let host = lookup
            .get_str(&key("host"))?
            .ok_or_else(|| ConfigErr::Missing(key("host")))?;
        let nicks = lookup.get_str_list(&key("nicks"))?;
        if nicks.is_empty() {
            return Err(ConfigErr::Missing(key("nicks")));
        }

        let mut config = ServerConfig::new(name, host, nicks);

        if let Some(port) = lookup.get(&key("port")) {
            config.port = port
                .as_integer()
                .and_then(|port| u16::try_from(port).ok())
                .ok_or_else(|| wrong_type(&key("port"), "a port number"))?;
        }
        if let Some(user) = lookup.get_str(&key("user"))? {
            config.user = user.to_string();
        }
        if let Some(realname) = lookup.get_str(&key("realname"))? {
            config.realname = realname.to_string();
        }
        config.password = lookup.get_str(&key("password"))?.map(str::to_string);
        config.channels = lookup.get_str_list(&key("channels"))?;
        config.auto_reconnect = lookup.get_bool(&key("auto-reconnect"))?.unwrap_or(false);

        if let Some(password) = lookup.get_str(&key("services/nickserv/password"))? {
            let name = lookup
                .get_str(&key("services/nickserv/name"))?
                .unwrap_or(DEFAULT_NICKSERV);
            config.nickserv = Some(ServicesLogin {
                name: name.to_string(),
                password: password.to_string(),
            });
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const CONFIG: &str = r##"
        [servers.libera]
        host = "irc.libera.chat"
        nicks = ["engine", "engine_"]
        channels = ["#rust", "#irc"]
        auto-reconnect = true
        password = "hunter2"

        [servers.libera.services.nickserv]
        password = "secret"

        [servers.local]
        host = "localhost"
        port = 6697
        nicks = "solo"
        user = "bot"
        realname = "a bot"

        [servers.broken]
        host = "example.org"
        port = "six"
        nicks = "x"
    "##;

    #[test]
    fn lookup_paths() {
        let tree = ConfigTree::parse(CONFIG).unwrap();
        assert_eq!(
            tree.get_str("servers/libera/host").unwrap(),
            Some("irc.libera.chat")
        );
        assert_eq!(
            tree.get_str("/servers//libera/services/nickserv/password").unwrap(),
            Some("secret")
        );
        assert!(tree.get("servers/libera/nope").is_none());
        assert!(tree.get("servers/libera/host/deeper").is_none());
        assert!(tree.get("").is_none());
        let mut names = tree.server_names();
        names.sort();
        assert_eq!(names, vec!["broken", "libera", "local"]);
    }

    #[test]
    fn full_server() {
        let tree = ConfigTree::parse(CONFIG).unwrap();
        let config = ServerConfig::from_lookup("libera", &tree).unwrap();
        assert_eq!(config.host, "irc.libera.chat");
        assert_eq!(config.port, 6667);
        assert_eq!(config.nicks, vec!["engine", "engine_"]);
        assert_eq!(config.channels, vec!["#rust", "#irc"]);
        assert_eq!(config.password.as_deref(), Some("hunter2"));
        assert!(config.auto_reconnect);
        assert_eq!(
            config.nickserv,
            Some(ServicesLogin {
                name: String::from("NickServ"),
                password: String::from("secret"),
            })
        );
    }

    #[test]
    fn defaults_and_overrides() {
        let tree = ConfigTree::parse(CONFIG).unwrap();
        let config = ServerConfig::from_lookup("local", &tree).unwrap();
        assert_eq!(config.port, 6697);
        assert_eq!(config.nicks, vec!["solo"]);
        assert_eq!(config.user, "bot");
        assert_eq!(config.realname, "a bot");
        assert!(config.channels.is_empty());
        assert!(!config.auto_reconnect);
        assert!(config.nickserv.is_none());
    }

    #[test]
    fn errors() {
        let tree = ConfigTree::parse(CONFIG).unwrap();
        assert!(matches!(
            ServerConfig::from_lookup("missing", &tree),
            Err(ConfigErr::Missing(key)) if key == "servers/missing/host"
        ));
        assert!(matches!(
            ServerConfig::from_lookup("broken", &tree),
            Err(ConfigErr::WrongType { .. })
        ));
        assert!(matches!(
            ConfigTree::parse("servers = ["),
            Err(ConfigErr::Parse(_))
        ));
    }
}
