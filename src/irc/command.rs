use thiserror::Error;

/// renders `COMMAND arg0 ... argN-1 :argN`. the final argument is free text: it is introduced with
/// a `:` whenever more than one argument is given, or when it could not be read back as a single
/// middle parameter. the returned line does not include the CRLF.
pub fn format_command<S: AsRef<str>>(
    command: &str,
    args: &[S],
) -> Result<String, CommandToStringErr> {
    if command.is_empty() || command.contains([' ', '\r', '\n', '\0']) {
        return Err(CommandToStringErr::InvalidCommand(command.to_string()));
    }

    let mut line = command.to_string();
    let Some((last, middle)) = args.split_last() else {
        return Ok(line);
    };

    for arg in middle {
        let arg = arg.as_ref();
        if arg.is_empty() || arg.starts_with(':') || arg.contains([' ', '\r', '\n', '\0']) {
            return Err(CommandToStringErr::InvalidParams);
        }
        line.push(' ');
        line.push_str(arg);
    }

    let last = last.as_ref();
    if last.contains(['\r', '\n', '\0']) {
        return Err(CommandToStringErr::InvalidParams);
    }
    line.push(' ');
    if !middle.is_empty() || last.is_empty() || last.starts_with(':') || last.contains(' ') {
        line.push(':');
    }
    line.push_str(last);

    Ok(line)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandToStringErr {
    #[error("{:?} is not a valid command name", .0)]
    InvalidCommand(String),
    #[error("message had invalid params")]
    InvalidParams,
}
