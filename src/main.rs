use std::{io, path::PathBuf, sync::Arc, thread};

use clap::Parser;
use color_eyre::eyre::Result;
use eyre::{bail, WrapErr};
use irc_engine::{
    config::{ConfigTree, ServerConfig},
    hooks::{Event, HookKind, Hooks},
    logging,
    net::{Connection, ConnectionRegistry},
};
use log::*;

#[derive(Parser, Debug)]
#[command(about = "connects to the IRC servers in a config file and logs what happens on them")]
struct Args {
    /// path to the TOML config file
    #[arg(short, long, default_value = "irc.toml")]
    config: PathBuf,

    /// names of the servers to connect to, defaults to every server in the config
    servers: Vec<String>,

    /// log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: LevelFilter,

    /// folder to write log files to
    #[arg(long, default_value = "./logs/")]
    log_dir: PathBuf,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let log_path = logging::init(&args.log_dir, "irc_engine", args.log_level)?;
    eprintln!("logging to {}", log_path.display());

    let config = ConfigTree::load(&args.config)
        .wrap_err_with(|| format!("could not load {}", args.config.display()))?;
    let names = if args.servers.is_empty() {
        config.server_names()
    } else {
        args.servers.clone()
    };
    if names.is_empty() {
        bail!("no servers configured in {}", args.config.display());
    }

    let hooks = Arc::new(hooks());
    let registry = ConnectionRegistry::new();
    for name in &names {
        let server = ServerConfig::from_lookup(name, &config)
            .wrap_err_with(|| format!("invalid config for server {}", name))?;
        Connection::spawn(server, Arc::clone(&hooks), &registry)?;
    }

    // user interaction using stdin
    let _ = thread::Builder::new().name(String::from("input")).spawn({
        let registry = Arc::clone(&registry);
        move || {
            for line in io::stdin().lines() {
                let Ok(line) = line else {
                    break;
                };
                if let Some(reason) = line.trim().strip_prefix("/quit") {
                    let reason = reason.trim();
                    registry.quit_all((!reason.is_empty()).then_some(reason));
                    return;
                }
            }
        }
    })?;

    registry.wait_all();
    info!("all connections closed");
    Ok(())
}

fn hooks() -> Hooks {
    let mut hooks = Hooks::new();
    hooks
        .on(HookKind::Connected, |connection, _| {
            info!(
                "connected to {} as {}",
                connection.name(),
                connection.nick().unwrap_or_default()
            );
            Ok(())
        })
        .on(HookKind::ChannelInit, |_, event| {
            if let Event::ChannelInit { channel } = event {
                info!(
                    "{}: {} members, topic {:?}",
                    channel.name(),
                    channel.members().len(),
                    channel.topic().unwrap_or_default()
                );
            }
            Ok(())
        })
        .on(HookKind::ChannelMessage, |_, event| {
            if let Event::ChannelMessage {
                channel,
                from,
                text,
            } = event
            {
                info!("{} <{}> {}", channel.name(), from.nick(), text);
            }
            Ok(())
        })
        .on(HookKind::PrivateMessage, |connection, event| {
            if let Event::PrivateMessage { from, text } = event {
                info!("[{}] <{}> {}", connection.name(), from.mask(), text);
                if text.trim() == "ping" {
                    from.notice("pong");
                }
            }
            Ok(())
        });
    hooks
}
