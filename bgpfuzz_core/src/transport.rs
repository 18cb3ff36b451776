//! Delivery of encoded test cases to the system under test.

use crate::bgp::{self, MessageType};
use slog::{Logger, debug};
use std::fs;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

const READ_BUFFER_LEN: usize = 4096;
/// Upper bound on handshake bytes read before the case is sent anyway.
const MAX_HANDSHAKE_LEN: usize = 64 * 1024;

/// Outcome of delivering one test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendStatus {
    /// The peer kept the session up and answered with these bytes.
    Accepted(Vec<u8>),
    /// The peer closed or reset the connection.
    Closed,
    /// The peer said nothing within the read timeout.
    Timeout,
    /// No connection could be established.
    Unreachable(String),
    Other(String),
}

impl SendStatus {
    /// Coarse class name, stable across runs.
    pub fn class(&self) -> &'static str {
        match self {
            SendStatus::Accepted(_) => "accepted",
            SendStatus::Closed => "closed",
            SendStatus::Timeout => "timeout",
            SendStatus::Unreachable(_) => "unreachable",
            SendStatus::Other(_) => "other",
        }
    }

    pub fn response(&self) -> &[u8] {
        match self {
            SendStatus::Accepted(bytes) => bytes,
            _ => &[],
        }
    }
}

pub trait Transport {
    fn send(&mut self, bytes: &[u8]) -> SendStatus;
}

fn classify(e: &io::Error) -> SendStatus {
    match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => SendStatus::Timeout,
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
            SendStatus::Closed
        }
        _ => SendStatus::Other(e.to_string()),
    }
}

/// Opens a fresh TCP session per test case.
pub struct TcpTransport {
    address: SocketAddr,
    timeout: Duration,
    preamble: Vec<u8>,
    log: Logger,
}

impl TcpTransport {
    pub fn new(address: SocketAddr, timeout: Duration, log: Logger) -> Self {
        Self {
            address,
            timeout,
            preamble: Vec::new(),
            log,
        }
    }

    /// Bytes written, and whose answer is discarded, before every case.
    pub fn with_preamble(mut self, preamble: Vec<u8>) -> Self {
        self.preamble = preamble;
        self
    }

    fn connect(&self) -> Result<TcpStream, SendStatus> {
        let stream = TcpStream::connect_timeout(&self.address, self.timeout)
            .map_err(|e| SendStatus::Unreachable(e.to_string()))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .and_then(|_| stream.set_write_timeout(Some(self.timeout)))
            .and_then(|_| stream.set_nodelay(true))
            .map_err(|e| SendStatus::Other(e.to_string()))?;
        Ok(stream)
    }

    /// Writes the preamble and consumes the peer's answer up to its
    /// KEEPALIVE, so the case response holds only what the case provoked.
    /// A peer that stays silent until the read timeout is accepted.
    fn handshake(&self, stream: &mut TcpStream) -> Result<(), SendStatus> {
        stream.write_all(&self.preamble).map_err(|e| classify(&e))?;
        let mut received = Vec::new();
        let mut buf = vec![0u8; READ_BUFFER_LEN];
        while received.len() < MAX_HANDSHAKE_LEN {
            match stream.read(&mut buf) {
                Ok(0) => return Err(SendStatus::Closed),
                Ok(n) => received.extend_from_slice(&buf[..n]),
                Err(e) => {
                    return match classify(&e) {
                        SendStatus::Timeout => Ok(()),
                        status => Err(status),
                    };
                }
            }
            for message in bgp::framed_messages(&received) {
                match bgp::message_type_of(message) {
                    Some(MessageType::KeepAlive) => return Ok(()),
                    Some(MessageType::Notification) => {
                        return Err(SendStatus::Other("peer refused the session".into()));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn exchange(&self, stream: &mut TcpStream, bytes: &[u8]) -> Result<Vec<u8>, SendStatus> {
        stream.write_all(bytes).map_err(|e| classify(&e))?;
        let mut buf = vec![0u8; READ_BUFFER_LEN];
        match stream.read(&mut buf) {
            Ok(0) => Err(SendStatus::Closed),
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) => Err(classify(&e)),
        }
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, bytes: &[u8]) -> SendStatus {
        let mut stream = match self.connect() {
            Ok(stream) => stream,
            Err(status) => {
                debug!(self.log, "connect failed"; "address" => %self.address, "status" => ?status);
                return status;
            }
        };
        if !self.preamble.is_empty() {
            if let Err(status) = self.handshake(&mut stream) {
                debug!(self.log, "preamble rejected"; "status" => ?status);
                return status;
            }
        }
        match self.exchange(&mut stream, bytes) {
            Ok(response) => SendStatus::Accepted(response),
            Err(status) => status,
        }
    }
}

/// Writes every case to `case_<n>.bin` under a directory for later replay.
pub struct FileTransport {
    dir: PathBuf,
    count: u64,
}

impl FileTransport {
    pub fn new(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            count: 0,
        })
    }

    pub fn case_path(&self, n: u64) -> PathBuf {
        self.dir.join(format!("case_{n}.bin"))
    }
}

impl Transport for FileTransport {
    fn send(&mut self, bytes: &[u8]) -> SendStatus {
        let path = self.case_path(self.count);
        match fs::write(&path, bytes) {
            Ok(()) => {
                self.count += 1;
                SendStatus::Accepted(Vec::new())
            }
            Err(e) => SendStatus::Other(format!("failed to write {path:?}: {e}")),
        }
    }
}

/// Keeps every case in memory and answers with a fixed status.
#[derive(Debug, Clone)]
pub struct RecordingTransport {
    pub sent: Vec<Vec<u8>>,
    reply: SendStatus,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new(SendStatus::Accepted(Vec::new()))
    }
}

impl RecordingTransport {
    pub fn new(reply: SendStatus) -> Self {
        Self {
            sent: Vec::new(),
            reply,
        }
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, bytes: &[u8]) -> SendStatus {
        self.sent.push(bytes.to_vec());
        self.reply.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log;
    use std::net::TcpListener;
    use std::thread;

    const TIMEOUT: Duration = Duration::from_millis(200);

    fn listener() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    #[test]
    fn tcp_transport_returns_the_peer_response() {
        let (listener, addr) = listener();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 3];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(&[buf[2], buf[1], buf[0]]).unwrap();
        });
        let mut transport = TcpTransport::new(addr, TIMEOUT, log::discard());
        assert_eq!(transport.send(&[1, 2, 3]), SendStatus::Accepted(vec![3, 2, 1]));
        server.join().unwrap();
    }

    fn framed(typ: MessageType, body: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0xff; bgp::MARKER_LEN];
        bytes.extend_from_slice(&((bgp::HEADER_LEN + body.len()) as u16).to_be_bytes());
        bytes.push(typ.into());
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn tcp_transport_sends_the_preamble_first() {
        let (listener, addr) = listener();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut preamble = [0u8; 2];
            stream.read_exact(&mut preamble).unwrap();
            stream.write_all(&framed(MessageType::Open, &[0; 10])).unwrap();
            thread::sleep(TIMEOUT / 4);
            stream.write_all(&framed(MessageType::KeepAlive, &[])).unwrap();
            let mut case = [0u8; 1];
            stream.read_exact(&mut case).unwrap();
            stream.write_all(&case).unwrap();
            preamble
        });
        let mut transport =
            TcpTransport::new(addr, TIMEOUT, log::discard()).with_preamble(vec![0xaa, 0xbb]);
        assert_eq!(transport.send(&[7]), SendStatus::Accepted(vec![7]));
        assert_eq!(server.join().unwrap(), [0xaa, 0xbb]);
    }

    #[test]
    fn tcp_transport_tolerates_a_silent_handshake() {
        let (listener, addr) = listener();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut preamble = [0u8; 1];
            stream.read_exact(&mut preamble).unwrap();
            let mut case = [0u8; 2];
            stream.read_exact(&mut case).unwrap();
            stream.write_all(b"!").unwrap();
        });
        let mut transport =
            TcpTransport::new(addr, TIMEOUT, log::discard()).with_preamble(vec![0xaa]);
        assert_eq!(transport.send(&[1, 2]), SendStatus::Accepted(b"!".to_vec()));
        server.join().unwrap();
    }

    #[test]
    fn tcp_transport_reports_a_refused_handshake() {
        let (listener, addr) = listener();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut preamble = [0u8; 1];
            stream.read_exact(&mut preamble).unwrap();
            stream.write_all(&framed(MessageType::Notification, &[2, 2])).unwrap();
        });
        let mut transport =
            TcpTransport::new(addr, TIMEOUT, log::discard()).with_preamble(vec![0xaa]);
        assert_eq!(transport.send(&[1]).class(), "other");
        server.join().unwrap();
    }

    #[test]
    fn tcp_transport_reports_closed_sessions() {
        let (listener, addr) = listener();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });
        let mut transport = TcpTransport::new(addr, TIMEOUT, log::discard());
        assert_eq!(transport.send(&[0; 19]), SendStatus::Closed);
        server.join().unwrap();
    }

    #[test]
    fn tcp_transport_reports_silence_as_timeout() {
        let (listener, addr) = listener();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).unwrap();
            thread::sleep(TIMEOUT * 3);
        });
        let mut transport = TcpTransport::new(addr, TIMEOUT, log::discard());
        assert_eq!(transport.send(&[0; 4]), SendStatus::Timeout);
        server.join().unwrap();
    }

    #[test]
    fn tcp_transport_reports_unreachable_targets() {
        let (listener, addr) = listener();
        drop(listener);
        let mut transport = TcpTransport::new(addr, TIMEOUT, log::discard());
        assert_eq!(transport.send(&[1]).class(), "unreachable");
    }

    #[test]
    fn file_transport_numbers_cases() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("cases");
        let mut transport = FileTransport::new(&out).unwrap();
        assert_eq!(transport.send(&[1, 2]), SendStatus::Accepted(vec![]));
        assert_eq!(transport.send(&[3]), SendStatus::Accepted(vec![]));
        assert_eq!(fs::read(out.join("case_0.bin")).unwrap(), vec![1, 2]);
        assert_eq!(fs::read(transport.case_path(1)).unwrap(), vec![3]);
    }

    #[test]
    fn recording_transport_keeps_what_was_sent() {
        let mut transport = RecordingTransport::new(SendStatus::Closed);
        assert_eq!(transport.send(&[9]), SendStatus::Closed);
        assert_eq!(transport.sent, vec![vec![9]]);
        assert_eq!(SendStatus::Accepted(vec![1]).response(), &[1]);
        assert!(SendStatus::Timeout.response().is_empty());
    }
}
