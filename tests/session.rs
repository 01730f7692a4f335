//! drives a real connection against a scripted server on localhost

use std::{
    io::{BufRead, BufReader, Write},
    net::{TcpListener, TcpStream},
    sync::{mpsc, Arc, Mutex},
    time::Duration,
};

use irc_engine::{
    config::ServerConfig,
    hooks::{Event, HookKind, Hooks},
    net::{Connection, ConnectionRegistry, ConnectionState},
};
use pretty_assertions::assert_eq;

/// the server side of one connection. every line the client sends is recorded.
struct Script {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    received: Vec<String>,
}

impl Script {
    fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = listener.accept().unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        Self {
            reader: BufReader::new(stream.try_clone().unwrap()),
            writer: stream,
            received: Vec::new(),
        }
    }

    /// reads client lines until one starts with `prefix`
    fn expect(&mut self, prefix: &str) -> String {
        loop {
            let mut line = String::new();
            let count = self.reader.read_line(&mut line).unwrap();
            assert!(count > 0, "client closed while waiting for {prefix}");
            let line = line.trim_end().to_string();
            self.received.push(line.clone());
            if line.starts_with(prefix) {
                return line;
            }
        }
    }

    fn send(&mut self, lines: &[&str]) {
        for line in lines {
            self.writer.write_all(line.as_bytes()).unwrap();
            self.writer.write_all(b"\r\n").unwrap();
        }
        self.writer.flush().unwrap();
    }
}

fn config(port: u16, nicks: &[&str]) -> ServerConfig {
    let mut config = ServerConfig::new("local", "127.0.0.1", nicks.iter().copied());
    config.port = port;
    config
}

#[test]
fn login_join_and_quit() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let (init_tx, init_rx) = mpsc::channel();
    let messages = Arc::new(Mutex::new(Vec::new()));
    let mut hooks = Hooks::new();
    hooks
        .on(HookKind::ChannelInit, move |_, event| {
            if let Event::ChannelInit { channel } = event {
                let mut members = channel
                    .members()
                    .values()
                    .map(|member| (member.nick().to_string(), member.is_op()))
                    .collect::<Vec<_>>();
                members.sort();
                init_tx.send((channel.name().to_string(), members))?;
            }
            Ok(())
        })
        .on(HookKind::ChannelMessage, {
            let messages = Arc::clone(&messages);
            move |connection, event| {
                if let Event::ChannelMessage { channel, text, .. } = event {
                    messages.lock().unwrap().push(text.to_string());
                    if *text == "!hello" {
                        channel.privmsg("hello yourself");
                    }
                    assert_eq!(connection.state(), ConnectionState::Running);
                }
                Ok(())
            }
        });

    let mut config = config(port, &["taken", "engine"]);
    config.channels = vec![String::from("#test")];
    let registry = ConnectionRegistry::new();
    let connection = Connection::spawn(config, Arc::new(hooks), &registry).unwrap();
    assert_eq!(registry.len(), 1);

    let mut server = Script::accept(&listener);
    server.expect("USER");
    server.send(&[":srv 433 * taken :Nickname is already in use"]);
    server.expect("NICK engine");
    server.send(&[
        ":srv 001 engine :Welcome",
        ":srv 005 engine PREFIX=(ov)@+ :are supported by this server",
    ]);

    server.expect("JOIN #test");
    server.send(&[
        ":engine!e@host JOIN #test",
        ":srv 332 engine #test :the topic",
        ":srv 353 engine = #test :engine @alice bob",
        ":srv 366 engine #test :End of /NAMES list.",
    ]);
    server.expect("MODE #test");
    server.expect("WHO #test");
    server.send(&[
        ":srv 324 engine #test +nt",
        ":srv 352 engine #test e host srv engine H :0 engine",
        ":srv 352 engine #test a host srv alice H@ :0 alice",
        ":srv 352 engine #test b host srv bob H :0 bob",
        ":srv 315 engine #test :End of /WHO list.",
    ]);

    let (name, members) = init_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(name, "#test");
    assert_eq!(
        members,
        vec![
            (String::from("alice"), true),
            (String::from("bob"), false),
            (String::from("engine"), false),
        ]
    );
    assert_eq!(connection.state(), ConnectionState::Running);
    assert_eq!(connection.nick().as_deref(), Some("engine"));
    assert!(connection.is_joined("#TEST"));

    server.send(&[
        ":srv.example",
        ":bob!b@host PRIVMSG #test :!hello",
        "PING :srv",
    ]);
    assert_eq!(
        server.expect("PRIVMSG"),
        "PRIVMSG #test :hello yourself"
    );
    server.expect("PONG srv");

    connection.quit(Some("bye"));
    assert_eq!(server.expect("QUIT"), "QUIT bye");
    drop(server);

    connection.wait();
    registry.wait_all();
    assert_eq!(connection.state(), ConnectionState::Closed);
    assert!(registry.is_empty());
    assert_eq!(*messages.lock().unwrap(), vec!["!hello"]);
}

#[test]
fn exhausted_nicks_fail() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let registry = ConnectionRegistry::new();
    let connection =
        Connection::spawn(config(port, &["a", "b"]), Arc::new(Hooks::new()), &registry).unwrap();

    let mut server = Script::accept(&listener);
    server.expect("USER");
    server.send(&[":srv 432 * a :Erroneous nickname"]);
    server.expect("NICK b");
    server.send(&[":srv 433 * b :Nickname is already in use"]);

    connection.wait();
    assert_eq!(connection.state(), ConnectionState::Failed);
    assert!(registry.is_empty());
    assert_eq!(server.received, vec!["NICK a", "USER ircbase 8 * :IRC engine", "NICK b"]);
}

#[test]
fn reconnects_and_rejoins() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let connected = Arc::new(Mutex::new(0));
    let mut hooks = Hooks::new();
    hooks.on(HookKind::Connected, {
        let connected = Arc::clone(&connected);
        move |_, _| {
            *connected.lock().unwrap() += 1;
            Ok(())
        }
    });

    let mut config = config(port, &["engine"]);
    config.auto_reconnect = true;
    let registry = ConnectionRegistry::new();
    let connection = Connection::spawn(config, Arc::new(hooks), &registry).unwrap();

    let mut first = Script::accept(&listener);
    first.expect("USER");
    first.send(&[":srv 001 engine :Welcome", ":engine!e@host JOIN #kept"]);
    first.expect("WHO #kept");
    // lose the connection
    drop(first);

    let mut second = Script::accept(&listener);
    second.expect("USER");
    second.send(&[":srv 001 engine :Welcome"]);
    second.expect("JOIN #kept");

    connection.quit(None);
    second.expect("QUIT");
    drop(second);

    connection.wait();
    assert_eq!(connection.state(), ConnectionState::Closed);
    assert_eq!(*connected.lock().unwrap(), 2);
}
