use core::fmt::{self, Display};

use thiserror::Error;

use crate::{ext::StrExt as _, irc::param};

/// the command part of a message: either a named command such as `PRIVMSG`, or a three digit
/// numeric reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// a named command, always stored in upper case
    Named(String),
    Numeric(u16),
}

impl Command {
    fn parse(token: &str) -> Result<Self, IrcParseErr> {
        if token.len() == 3 && token.bytes().all(|b| b.is_ascii_digit()) {
            // UNWRAP: three ascii digits always fit in a u16
            return Ok(Command::Numeric(token.parse().unwrap()));
        }

        if !token.is_empty() && token.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Ok(Command::Named(token.to_ascii_uppercase()));
        }

        Err(IrcParseErr::InvalidCommand(token.to_string()))
    }

    pub fn numeric(&self) -> Option<u16> {
        match self {
            Command::Numeric(num) => Some(*num),
            Command::Named(_) => None,
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Named(name) => write!(f, "{}", name),
            Command::Numeric(num) => write!(f, "{:03}", num),
        }
    }
}

/// one line received from the server, split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    /// the raw prefix, without the leading `:`
    pub source: Option<String>,
    pub command: Command,
    pub params: Vec<String>,
}

impl IrcMessage {
    /// parses a message from a string. the string must contain only a single message. the string
    /// must not contain CRLF.
    pub fn parse(s: &str) -> Result<Self, IrcParseErr> {
        if s.contains(['\r', '\n']) {
            return Err(IrcParseErr::InteriorCRLF);
        }

        // not sure if this is valid, but just in case, trim leading whitespace.
        let mut s = s.trim_start_matches(' ');

        // message tags are not supported, skip over them
        if s.starts_with('@') {
            // if there is no space found, then the command part of the message is missing
            let space = s.find(' ').ok_or(IrcParseErr::MissingCommand)?;
            s = s[space..].trim_start_matches(' ');
        }

        // optional source section
        let source = if let Some((_, rest)) = s.split_prefix(':') {
            let Some((source, rest)) = rest.split_once(' ') else {
                // if there's not a space after the source, the command is missing
                return Err(IrcParseErr::MissingCommand);
            };

            s = rest;
            Some(source.to_string())
        } else {
            None
        };

        s = s.trim_start_matches(' ');
        if s.is_empty() {
            return Err(IrcParseErr::MissingCommand);
        }

        let (command, args) = match s.split_once(' ') {
            Some(parts) => parts,
            // there was no space after the text, this is all one command
            None => (s, ""),
        };

        Ok(IrcMessage {
            source,
            command: Command::parse(command)?,
            params: param::parse_params(args),
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IrcParseErr {
    #[error("message contains interior CRLF")]
    InteriorCRLF,
    #[error("message is missing a command")]
    MissingCommand,
    #[error("{:?} is not a command or a numeric reply", .0)]
    InvalidCommand(String),
}
