//! Minimal polled HTTP command listener.
//!
//! Serves the remote API routes: `GET /motor/{up,down,stop}`,
//! `GET /height/<cm>`, and `GET /height`. Commands are forwarded over a
//! bounded channel that the control loop drains each cycle, and the
//! height query is answered from the last published value — no request
//! ever touches the control path directly, so network traffic cannot
//! stall the safety checks.

use crossbeam_channel as xch;
use desk_core::Command;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::thread;
use std::time::Duration;

pub struct CommandListener {
    rx: xch::Receiver<Command>,
    local_addr: std::net::SocketAddr,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl CommandListener {
    /// Bind `addr` and start accepting on a background thread. The
    /// listener polls the shared shutdown flag so it winds down together
    /// with the control loop.
    pub fn spawn(
        addr: &str,
        height: Arc<AtomicI32>,
        shutdown: Arc<AtomicBool>,
    ) -> eyre::Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|e| eyre::eyre!("bind {addr}: {e}"))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let (tx, rx) = xch::bounded(16);
        let shutdown_clone = shutdown.clone();
        let join_handle = thread::spawn(move || {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                match listener.accept() {
                    Ok((stream, peer)) => {
                        tracing::debug!(%peer, "client connected");
                        if let Err(e) = handle_client(stream, &tx, &height) {
                            tracing::warn!(error = %e, "client handling failed");
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        thread::sleep(Duration::from_millis(5));
                    }
                }
            }
            tracing::trace!("command listener exiting");
        });

        Ok(Self {
            rx,
            local_addr,
            shutdown,
            join_handle: Some(join_handle),
        })
    }

    pub fn receiver(&self) -> &xch::Receiver<Command> {
        &self.rx
    }

    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }
}

impl Drop for CommandListener {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take()
            && handle.join().is_err()
        {
            tracing::warn!("command listener thread panicked");
        }
    }
}

fn handle_client(
    stream: TcpStream,
    tx: &xch::Sender<Command>,
    height: &AtomicI32,
) -> std::io::Result<()> {
    // The accepted socket is blocking; bound it so a stalled client
    // cannot pin the listener thread.
    stream.set_read_timeout(Some(Duration::from_millis(500)))?;
    stream.set_write_timeout(Some(Duration::from_millis(500)))?;

    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut stream = reader.into_inner();

    let Some(path) = parse_request_path(&request_line) else {
        return respond(&mut stream, "400 Bad Request", "bad request\n");
    };
    route(&path, tx, height, &mut stream)
}

/// Extract the path of a `GET <path> HTTP/x` request line, tolerating a
/// trailing slash.
fn parse_request_path(line: &str) -> Option<String> {
    let mut parts = line.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    Some(parts.next()?.trim_end_matches('/').to_string())
}

fn route(
    path: &str,
    tx: &xch::Sender<Command>,
    height: &AtomicI32,
    stream: &mut TcpStream,
) -> std::io::Result<()> {
    if path.is_empty() {
        return respond(stream, "200 OK", "desk controller\n");
    }
    if path == "/height" {
        let h = height.load(Ordering::Relaxed);
        return respond(stream, "200 OK", &format!("{h}"));
    }
    if let Some(action) = path.strip_prefix("/motor/") {
        let cmd = match action {
            "up" => Command::Up,
            "down" => Command::Down,
            "stop" => Command::Stop,
            _ => {
                tracing::warn!(action, "unknown motor action");
                return respond(stream, "404 Not Found", "unknown action\n");
            }
        };
        forward(tx, cmd);
        return redirect_home(stream);
    }
    if let Some(arg) = path.strip_prefix("/height/") {
        return match arg.parse::<i32>() {
            Ok(h) => {
                forward(tx, Command::GotoHeight(h));
                redirect_home(stream)
            }
            Err(_) => {
                tracing::warn!(arg, "height is not a number");
                respond(stream, "404 Not Found", "bad height\n")
            }
        };
    }
    respond(stream, "404 Not Found", "no such route\n")
}

fn forward(tx: &xch::Sender<Command>, cmd: Command) {
    // Bounded queue: if the control loop is behind, drop rather than block.
    if let Err(e) = tx.try_send(cmd) {
        tracing::warn!(error = %e, "command queue full, dropping request");
    }
}

/// Clients are sent back to the homepage after a state change, matching
/// what the remote UI expects.
fn redirect_home(stream: &mut TcpStream) -> std::io::Result<()> {
    write_response(stream, "303 See Other", &[("Location", "/")], "")
}

fn respond(stream: &mut TcpStream, status: &str, body: &str) -> std::io::Result<()> {
    write_response(stream, status, &[("Content-Type", "text/plain")], body)
}

fn write_response(
    stream: &mut TcpStream,
    status: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> std::io::Result<()> {
    let mut resp = format!("HTTP/1.1 {status}\r\n");
    for (k, v) in headers {
        resp.push_str(&format!("{k}: {v}\r\n"));
    }
    resp.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    ));
    stream.write_all(resp.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::parse_request_path;

    #[test]
    fn parses_get_paths() {
        assert_eq!(
            parse_request_path("GET /motor/up HTTP/1.1\r\n").as_deref(),
            Some("/motor/up")
        );
        assert_eq!(
            parse_request_path("GET /motor/up/ HTTP/1.1\r\n").as_deref(),
            Some("/motor/up")
        );
        assert_eq!(parse_request_path("GET / HTTP/1.1\r\n").as_deref(), Some(""));
    }

    #[test]
    fn rejects_non_get_requests() {
        assert_eq!(parse_request_path("POST /motor/up HTTP/1.1\r\n"), None);
        assert_eq!(parse_request_path("\r\n"), None);
    }
}
