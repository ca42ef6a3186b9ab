//! SSH shell to a Cisco IOS switch. Opens a PTY-backed interactive shell,
//! tracks the prompt, answers `--More--` and bounds every read by a timeout.

use std::borrow::Cow;
use std::io::{ErrorKind, Read, Write};
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use ssh2::{Channel, Session};
use tracing::{debug, info};

use super::error::ScraperError;
use super::transport::{
    Connector, ShellTransport, clean_output, detect_prompt, ends_with_prompt, is_more_prompt,
    is_password_prompt,
};
use crate::config::SwitchConfig;

const PTY_WIDTH: u32 = 511;
const PTY_HEIGHT: u32 = 24;
const READ_CHUNK: usize = 8192;
const IDLE_WAIT: Duration = Duration::from_millis(50);
/// Extra `Password:` prompts answered with an empty line after a bad secret
const MAX_ENABLE_RETRIES: usize = 3;

/// Opens [`SshTransport`]s with the switch credentials from configuration
pub struct SshConnector<'a> {
    config: &'a SwitchConfig,
}

impl<'a> SshConnector<'a> {
    pub fn new(config: &'a SwitchConfig) -> Self {
        Self { config }
    }
}

impl Connector for SshConnector<'_> {
    type Transport = SshTransport;

    fn connect(&self, host: IpAddr) -> Result<SshTransport, ScraperError> {
        let addr = SocketAddr::new(host, self.config.port);
        let failed = |reason: String| ScraperError::Connection {
            host: addr.to_string(),
            reason,
        };

        let tcp = TcpStream::connect_timeout(&addr, self.config.connect_timeout)
            .map_err(|e| failed(e.to_string()))?;

        let mut session = Session::new().map_err(|e| failed(e.to_string()))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(timeout_millis(self.config.read_timeout));
        session.handshake().map_err(|e| failed(e.to_string()))?;
        session
            .userauth_password(&self.config.username, self.config.password.expose())
            .map_err(|e| failed(format!("authentication failed: {}", e)))?;
        if !session.authenticated() {
            return Err(failed("authentication rejected".to_string()));
        }

        let mut channel = session.channel_session().map_err(|e| failed(e.to_string()))?;
        channel
            .request_pty("vt100", None, Some((PTY_WIDTH, PTY_HEIGHT, 0, 0)))
            .map_err(|e| failed(e.to_string()))?;
        channel.shell().map_err(|e| failed(e.to_string()))?;

        let mut transport = SshTransport {
            session,
            channel,
            hostname: String::new(),
            privileged: false,
            read_timeout: self.config.read_timeout,
            closed: false,
        };

        let banner = transport
            .read_until(|buffer| detect_prompt(buffer).is_some())
            .map_err(|e| failed(e.to_string()))?;
        let prompt = detect_prompt(&banner)
            .ok_or_else(|| failed("no CLI prompt after login".to_string()))?;
        info!(%addr, hostname = %prompt.hostname, "SSH shell opened");
        transport.hostname = prompt.hostname;
        transport.privileged = prompt.privileged;

        Ok(transport)
    }
}

fn timeout_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

/// Shell output as received. Decoding always covers the whole buffer, so a
/// multi-byte character split across two reads comes out intact.
#[derive(Default)]
struct ShellBuffer {
    raw: Vec<u8>,
}

impl ShellBuffer {
    fn push(&mut self, bytes: &[u8]) {
        self.raw.extend_from_slice(bytes);
    }

    fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.raw)
    }
}

/// Interactive IOS shell over SSH
pub struct SshTransport {
    session: Session,
    channel: Channel,
    hostname: String,
    privileged: bool,
    read_timeout: Duration,
    closed: bool,
}

impl SshTransport {
    fn write_line(&mut self, line: &str) -> Result<(), ScraperError> {
        self.channel
            .write_all(format!("{}\n", line).as_bytes())
            .and_then(|_| self.channel.flush())
            .map_err(|e| ScraperError::Transport(e.to_string()))
    }

    /// Read until `done` accepts the accumulated output. Continuation prompts
    /// are answered with a space and reading goes on.
    fn read_until<F: Fn(&str) -> bool>(&mut self, done: F) -> Result<String, ScraperError> {
        let deadline = Instant::now() + self.read_timeout;
        let mut received = ShellBuffer::default();
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if Instant::now() >= deadline {
                return Err(ScraperError::Timeout(self.read_timeout));
            }

            match self.channel.read(&mut chunk) {
                Ok(0) => {
                    if self.channel.eof() {
                        return Err(ScraperError::Transport(
                            "switch closed the channel".to_string(),
                        ));
                    }
                    thread::sleep(IDLE_WAIT);
                    continue;
                }
                Ok(n) => received.push(&chunk[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(ScraperError::Timeout(self.read_timeout));
                }
                Err(e) => return Err(ScraperError::Transport(e.to_string())),
            }

            let output = received.text();
            if is_more_prompt(&output) {
                self.channel
                    .write_all(b" ")
                    .map_err(|e| ScraperError::Transport(e.to_string()))?;
                continue;
            }
            if done(&output) {
                return Ok(output.into_owned());
            }
        }
    }

    fn read_prompt(&mut self) -> Result<String, ScraperError> {
        let hostname = self.hostname.clone();
        let output = self.read_until(|buffer| ends_with_prompt(buffer, &hostname))?;
        if let Some(prompt) = detect_prompt(&output) {
            self.privileged = prompt.privileged;
        }
        Ok(output)
    }
}

impl ShellTransport for SshTransport {
    fn execute(&mut self, command: &str) -> Result<String, ScraperError> {
        if self.closed {
            return Err(ScraperError::NotConnected);
        }
        self.write_line(command)?;
        let raw = self.read_prompt()?;
        Ok(clean_output(&raw, command, &self.hostname))
    }

    fn enable(&mut self, secret: &str) -> Result<bool, ScraperError> {
        if self.privileged {
            return Ok(true);
        }

        self.write_line("enable")?;
        let hostname = self.hostname.clone();
        let waiting = |buffer: &str| is_password_prompt(buffer) || ends_with_prompt(buffer, &hostname);

        let mut response = self.read_until(waiting)?;
        if is_password_prompt(&response) {
            self.write_line(secret)?;
            response = self.read_until(waiting)?;

            let mut retries = 0;
            while is_password_prompt(&response) && retries < MAX_ENABLE_RETRIES {
                self.write_line("")?;
                response = self.read_until(waiting)?;
                retries += 1;
            }
        }

        self.privileged = detect_prompt(&response).is_some_and(|p| p.privileged);
        debug!(hostname = %self.hostname, privileged = self.privileged, "enable finished");
        Ok(self.privileged)
    }

    fn close(&mut self) -> Result<(), ScraperError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // Best effort: the switch may already have dropped the channel
        let _ = self.write_line("exit");
        let channel_result = self
            .channel
            .send_eof()
            .and_then(|_| self.channel.close())
            .and_then(|_| self.channel.wait_close());
        let session_result = self.session.disconnect(None, "session closed", None);

        channel_result
            .and(session_result)
            .map_err(|e| ScraperError::Transport(e.to_string()))
    }
}
