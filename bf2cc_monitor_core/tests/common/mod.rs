#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use bf2cc_monitor_core::rcon::{digest, EOT, STX};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
};

pub const SEED: &str = "1234abcd";
pub const PASSWORD: &str = "secret";

fn echo(command: &str) -> String {
    format!("ok {command}")
}

/// How the fake server treats its clients.
#[derive(Clone, Copy)]
pub struct Behaviour {
    /// Send the digest seed greeting. Without it the connection is closed
    /// straight away.
    pub greet: bool,
    /// Close the first connection upon receiving this many commands, without
    /// answering the last one.
    pub drop_after: Option<usize>,
    /// Close this many connections after the first without greeting them.
    pub ungreeted_reconnects: usize,
    /// Refuse the password on every connection after the first.
    pub reject_relogin: bool,
    /// Time spent on each command before answering.
    pub delay: Duration,
    pub respond: fn(&str) -> String,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            greet: true,
            drop_after: None,
            ungreeted_reconnects: 0,
            reject_relogin: false,
            delay: Duration::ZERO,
            respond: echo,
        }
    }
}

/// An in-process BF2CC remote console that records every command it gets.
pub struct FakeServer {
    pub address: String,
    commands: Arc<Mutex<Vec<String>>>,
    pipelined: Arc<AtomicBool>,
    connections: Arc<AtomicUsize>,
}

/// How one accepted connection is treated.
#[derive(Clone, Copy)]
struct Session {
    greet: bool,
    accept_login: bool,
    drop_after: Option<usize>,
}

impl FakeServer {
    pub async fn start(behaviour: Behaviour) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let pipelined = Arc::new(AtomicBool::new(false));
        let connections = Arc::new(AtomicUsize::new(0));

        let server = Self {
            address,
            commands: commands.clone(),
            pipelined: pipelined.clone(),
            connections: connections.clone(),
        };

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let accepted = connections.fetch_add(1, Ordering::SeqCst) + 1;
                let first = accepted == 1;
                let greeted = first || accepted > 1 + behaviour.ungreeted_reconnects;
                let session = Session {
                    greet: behaviour.greet && greeted,
                    accept_login: first || !behaviour.reject_relogin,
                    drop_after: if first { behaviour.drop_after } else { None },
                };
                tokio::spawn(serve(
                    stream,
                    behaviour,
                    session,
                    commands.clone(),
                    pipelined.clone(),
                ));
            }
        });

        server
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Connections accepted so far, refused ones included.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Whether a client ever sent a command before the previous one was
    /// answered.
    pub fn saw_pipelining(&self) -> bool {
        self.pipelined.load(Ordering::SeqCst)
    }
}

/// An address nothing is listening on.
pub async fn unused_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().to_string()
}

async fn serve(
    stream: TcpStream,
    behaviour: Behaviour,
    session: Session,
    commands: Arc<Mutex<Vec<String>>>,
    pipelined: Arc<AtomicBool>,
) {
    if !session.greet {
        return;
    }

    let mut stream = BufReader::new(stream);
    let greeting = format!("BF2CC remote console\n### Digest seed: {SEED}\n");
    if stream.get_mut().write_all(greeting.as_bytes()).await.is_err() {
        return;
    }

    let mut login = String::new();
    if stream.read_line(&mut login).await.unwrap_or(0) == 0 {
        return;
    }
    if !session.accept_login || login.trim() != format!("login {}", digest(SEED, PASSWORD)) {
        let _ = stream
            .get_mut()
            .write_all(b"Authentication failed.\n")
            .await;
        return;
    }
    if stream
        .get_mut()
        .write_all(b"Authentication successful, rcon ready.\n")
        .await
        .is_err()
    {
        return;
    }

    let mut served = 0;
    loop {
        let mut request = Vec::new();
        match stream.read_until(b'\n', &mut request).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }

        let command = String::from_utf8_lossy(&request)
            .trim_matches(|c: char| c == char::from(STX) || c.is_whitespace())
            .to_owned();
        commands.lock().unwrap().push(command.clone());

        served += 1;
        if session.drop_after == Some(served) {
            return;
        }

        // Anything arriving before the answer was sent is a pipelined request
        let waiting = tokio::time::timeout(behaviour.delay, stream.fill_buf()).await;
        if matches!(waiting, Ok(Ok(buf)) if !buf.is_empty()) {
            pipelined.store(true, Ordering::SeqCst);
        }

        let mut response = (behaviour.respond)(&command).into_bytes();
        response.push(b'\n');
        response.push(EOT);
        if stream.get_mut().write_all(&response).await.is_err() {
            return;
        }
    }
}
