#![allow(dead_code)]

use assert_cmd::cargo::CommandCargoExt;
use std::{
    io::{BufRead, BufReader, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{Arc, Mutex},
    thread,
};

/// Canned http responses, one route is `(path, status, body)`.
pub struct Server {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl Server {
    pub fn start(routes: &[(&str, u16, &str)]) -> Self {
        let routes = routes
            .iter()
            .map(|(path, status, body)| (path.to_string(), *status, body.to_string()))
            .collect::<Vec<_>>();

        Self::with_handler(move |path, _, stream| {
            let (status, body) = routes
                .iter()
                .find(|(x, _, _)| x == path)
                .map(|(_, status, body)| (*status, body.as_str()))
                .unwrap_or((404, "not found"));
            respond(stream, status, body);
        })
    }

    /// `handler` gets the request path, the 1-based request number and the connection.
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&str, usize, &mut TcpStream) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = requests.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut head = String::new();

                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
                        break;
                    }
                    head.push_str(&line);
                }

                let path = head
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("/")
                    .to_owned();
                let hit = {
                    let mut seen = seen.lock().unwrap();
                    seen.push(head);
                    seen.len()
                };

                handler(&path, hit, &mut stream);
                let _ = stream.flush();
            }
        });

        Self { addr, requests }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Raw request heads received so far, lowercased.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|x| x.to_lowercase())
            .collect()
    }
}

pub fn respond(stream: &mut TcpStream, status: u16, body: &str) {
    let _ = write!(
        stream,
        "HTTP/1.1 {} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
}

/// Announces `length` bytes but only sends `body`.
pub fn respond_short(stream: &mut TcpStream, length: usize, body: &str) {
    let _ = write!(
        stream,
        "HTTP/1.1 200 X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        length, body
    );
}

/// The binary with proxy variables of the surrounding environment removed.
pub fn crunchy_cli(config_dir: &std::path::Path) -> assert_cmd::Command {
    assert_cmd::Command::from_std(crunchy_cli_process(config_dir))
}

/// Same as [`crunchy_cli`] for tests that need the running child process.
pub fn crunchy_cli_process(config_dir: &std::path::Path) -> std::process::Command {
    let mut cmd = std::process::Command::cargo_bin("crunchy-cli").unwrap();

    for var in [
        "http_proxy",
        "HTTP_PROXY",
        "https_proxy",
        "HTTPS_PROXY",
        "all_proxy",
        "ALL_PROXY",
    ] {
        cmd.env_remove(var);
    }

    cmd.env("NO_PROXY", "127.0.0.1")
        .env("NO_COLOR", "1")
        .env("CRUNCHY_CLI_CONFIG_DIR", config_dir);
    cmd
}
