//! Test fixtures: canned IOS output, a scripted shell, an in-memory identity
//! backend and a one-shot HTTP responder on a loopback socket.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::ise::{EndpointGroup, GroupLookup, IdentityBackend, IseError, UpdateOutcome};
use crate::mac::{MacFormat, normalize};
use crate::switch::transport::ShellTransport;
use crate::switch::{Connector, ScraperError};

/// Six sessions; every one but the last is not authorized
pub const SUMMARY_FIVE_FAILED: &str = "
Interface                MAC Address    Method  Domain  Status Fg  Session ID
--------------------------------------------------------------------------------------------
Gi1/0/1                  0050.5699.0001 mab     DATA    Unauth      0A0A0A0B000000125ABCDEF0
Gi1/0/2                  0050.5699.0002 dot1x   DATA    Unauth      0A0A0A0B000000135ABCDEF0
Gi1/0/3                  0050.5699.0003 mab     DATA    Authz Failed 0A0A0A0B000000145ABCDEF0
Gi1/0/4                  b827.eb12.3456 mab     DATA    Unauth      0A0A0A0B000000155ABCDEF0
Gi1/0/5                  0015.5d00.0005 dot1x   DATA    Unauth  D   0A0A0A0B000000165ABCDEF0
Gi1/0/6                  0050.5699.0006 dot1x   DATA    Auth        0A0A0A0B000000175ABCDEF0

Session count = 6

Key to Session Events Blocked Status Flags:

  A - Applying Policy (multi-line status for details)
  D - Awaiting Removal
  F - Final Removal in progress
  I - Awaiting IIF ID allocation
  P - Pushed Session
  R - Removing User Profile (multi-line status for details)
  U - Applying User Profile (multi-line status for details)
  X - Unknown Blocker
";

pub const DETAIL_MAB_UNAUTHORIZED: &str = r"
            Interface:  GigabitEthernet1/0/1
               IIF-ID:  0x1A2B3C4D
          MAC Address:  0050.5699.0001
         IPv6 Address:  Unknown
         IPv4 Address:  10.20.30.41
            User-Name:  00-50-56-99-00-01
               Status:  Unauthorized
               Domain:  DATA
       Oper host mode:  multi-auth
     Oper control dir:  both
      Session timeout:  N/A
    Common Session ID:  0A0A0A0B000000125ABCDEF0
      Acct Session ID:  0x00000012
               Handle:  0x8b000012
       Current Policy:  POLICY_Gi1/0/1

Local Policies:
        Service Template: DEFAULT_LINKSEC_POLICY_SHOULD_SECURE (priority 150)
      Security Policy:  Should Secure

Method status list:
       Method           State
        dot1x           Stopped
          mab           Authc Failed
";

pub const DETAIL_DOT1X_FAILED: &str = r"
            Interface:  GigabitEthernet1/0/2
               IIF-ID:  0x1A2B3C4E
          MAC Address:  0050.5699.0002
         IPv6 Address:  Unknown
         IPv4 Address:  Unknown
            User-Name:  CORP\jdoe
               Status:  Unauthorized
               Domain:  DATA
       Oper host mode:  multi-auth
    Common Session ID:  0A0A0A0B000000135ABCDEF0
       Current Policy:  POLICY_Gi1/0/2

Method status list:
       Method           State
        dot1x           Authc Failed
          mab           Not run
";

pub fn detail_command(dot_mac: &str) -> String {
    format!("show access-session mac {} details", dot_mac)
}

/// Minimal detail block for a session whose `method` failed
pub fn failed_detail(interface: &str, dot_mac: &str, method: &str) -> String {
    format!(
        "
            Interface:  {interface}
          MAC Address:  {dot_mac}
               Status:  Unauthorized
               Domain:  DATA

Method status list:
       Method           State
        {method}           Authc Failed
"
    )
}

/// The [`SUMMARY_FIVE_FAILED`] switch with detail output for all five
/// non-authorized sessions
pub fn five_failed_switch() -> ScriptedTransport {
    ScriptedTransport::new()
        .with_output("show access-session", SUMMARY_FIVE_FAILED)
        .with_output(&detail_command("0050.5699.0001"), DETAIL_MAB_UNAUTHORIZED)
        .with_output(&detail_command("0050.5699.0002"), DETAIL_DOT1X_FAILED)
        .with_output(
            &detail_command("0050.5699.0003"),
            &failed_detail("GigabitEthernet1/0/3", "0050.5699.0003", "mab"),
        )
        .with_output(
            &detail_command("b827.eb12.3456"),
            &failed_detail("GigabitEthernet1/0/4", "b827.eb12.3456", "mab"),
        )
        .with_output(
            &detail_command("0015.5d00.0005"),
            &failed_detail("GigabitEthernet1/0/5", "0015.5d00.0005", "dot1x"),
        )
}

/// Shared view of what a [`ScriptedTransport`] was asked to do
#[derive(Clone, Default)]
pub struct TransportLog {
    commands: Rc<RefCell<Vec<String>>>,
    closes: Rc<Cell<usize>>,
}

impl TransportLog {
    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.get()
    }
}

/// Shell that answers from a command → output table. Commands with no entry
/// produce empty output.
pub struct ScriptedTransport {
    outputs: HashMap<String, String>,
    failing: HashSet<String>,
    enable_ok: bool,
    log: TransportLog,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            outputs: HashMap::new(),
            failing: HashSet::new(),
            enable_ok: true,
            log: TransportLog::default(),
        }
    }

    pub fn with_output(mut self, command: &str, output: &str) -> Self {
        self.outputs.insert(command.to_string(), output.to_string());
        self
    }

    pub fn failing_on(mut self, command: &str) -> Self {
        self.failing.insert(command.to_string());
        self
    }

    pub fn refusing_enable(mut self) -> Self {
        self.enable_ok = false;
        self
    }

    pub fn log(&self) -> TransportLog {
        self.log.clone()
    }
}

impl ShellTransport for ScriptedTransport {
    fn execute(&mut self, command: &str) -> Result<String, ScraperError> {
        self.log.commands.borrow_mut().push(command.to_string());
        if self.failing.contains(command) {
            return Err(ScraperError::Transport("connection reset by peer".to_string()));
        }
        Ok(self.outputs.get(command).cloned().unwrap_or_default())
    }

    fn enable(&mut self, _secret: &str) -> Result<bool, ScraperError> {
        Ok(self.enable_ok)
    }

    fn close(&mut self) -> Result<(), ScraperError> {
        self.log.closes.set(self.log.closes.get() + 1);
        Ok(())
    }
}

/// Hands out one scripted transport, or refuses every connection
pub struct ScriptedConnector {
    transport: RefCell<Option<ScriptedTransport>>,
}

impl ScriptedConnector {
    pub fn new(transport: ScriptedTransport) -> Self {
        Self {
            transport: RefCell::new(Some(transport)),
        }
    }

    pub fn refusing() -> Self {
        Self {
            transport: RefCell::new(None),
        }
    }
}

impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    fn connect(&self, host: IpAddr) -> Result<ScriptedTransport, ScraperError> {
        self.transport
            .borrow_mut()
            .take()
            .ok_or_else(|| ScraperError::Connection {
                host: host.to_string(),
                reason: "connection refused".to_string(),
            })
    }
}

/// Identity backend held in memory. Endpoints are keyed by their bare digits.
pub struct InMemoryBackend {
    groups: Vec<EndpointGroup>,
    endpoints: RefCell<HashMap<String, String>>,
}

impl InMemoryBackend {
    pub fn new(groups: Vec<EndpointGroup>) -> Self {
        Self {
            groups,
            endpoints: RefCell::new(HashMap::new()),
        }
    }
}

impl IdentityBackend for InMemoryBackend {
    fn list_groups(&self) -> Result<Vec<EndpointGroup>, IseError> {
        Ok(self.groups.clone())
    }

    fn group_id_for_mac(&self, mac: &str) -> Result<GroupLookup, IseError> {
        let mac = normalize(mac, MacFormat::Colon)?;
        Ok(self
            .endpoints
            .borrow()
            .get(&mac.to_string())
            .map(|group| GroupLookup::Found(group.clone()))
            .unwrap_or(GroupLookup::NotFound))
    }

    fn update_group(&self, mac: &str, group_id: &str) -> Result<UpdateOutcome, IseError> {
        let mac = normalize(mac, MacFormat::Colon)?;
        if !self.groups.iter().any(|g| g.id == group_id) {
            return Err(IseError::BackendRejected {
                status: 400,
                body: format!("group {} does not exist", group_id),
            });
        }
        let previous = self
            .endpoints
            .borrow_mut()
            .insert(mac.to_string(), group_id.to_string());
        let created = previous.is_none();
        Ok(UpdateOutcome {
            status: if created { 201 } else { 200 },
            endpoint_id: Some(format!("ep-{}", mac)),
            created,
            body: String::new(),
        })
    }
}

/// Response served by [`serve`]
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CannedResponse {
    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn json(status: u16, body: &str) -> Self {
        Self {
            content_type: "application/json",
            ..Self::text(status, body)
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Request target, including any query string
    pub path: String,
    /// Lowercased header names
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

pub struct CannedServer {
    addr: SocketAddr,
    queue: Arc<Mutex<VecDeque<CannedResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl CannedServer {
    /// `http://127.0.0.1:<port>/`
    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn push(&self, response: CannedResponse) {
        self.queue.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Answer each incoming HTTP/1.1 request with the next queued response, then
/// close the connection. Requests past the end of the queue get a 500.
pub fn serve(responses: Vec<CannedResponse>) -> CannedServer {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let queue = Arc::new(Mutex::new(VecDeque::from(responses)));
    let requests = Arc::new(Mutex::new(Vec::new()));

    let (thread_queue, thread_requests) = (queue.clone(), requests.clone());
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { continue };
            answer(stream, &thread_queue, &thread_requests);
        }
    });

    CannedServer {
        addr,
        queue,
        requests,
    }
}

fn answer(
    mut stream: TcpStream,
    queue: &Mutex<VecDeque<CannedResponse>>,
    requests: &Mutex<Vec<RecordedRequest>>,
) {
    let Ok(reader_stream) = stream.try_clone() else {
        return;
    };
    let mut reader = BufReader::new(reader_stream);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).unwrap_or(0) == 0 {
        return;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_lowercase(), value.trim().to_string()));
        }
    }

    let length = headers
        .iter()
        .find(|(name, _)| name == "content-length")
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    let _ = reader.read_exact(&mut body);

    requests.lock().unwrap().push(RecordedRequest {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    let response = queue
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| CannedResponse::text(500, "no canned response left"));

    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        reason_phrase(response.status),
        response.content_type,
        response.body.len()
    );
    for (name, value) in &response.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");

    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(response.body.as_bytes());
    let _ = stream.flush();
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}
