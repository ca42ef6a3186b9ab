//! Parsers for IOS `show access-session` output. The summary is a whitespace
//! aligned table; the per-MAC detail is a block of `Key: value` lines followed
//! by a two-column method status list.

use std::fmt;
use std::net::IpAddr;

use serde::Serialize;

use super::types::{AuthMethod, Session};
use crate::mac::{MacFormat, is_dot_quartet, normalize};

/// Continuation prompt IOS prints when the terminal length is not zero
const MORE_PROMPT: &str = "--More--";

/// Backspace used by IOS to erase the continuation prompt
const ERASE: char = '\u{8}';

/// Shape of the text a command produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Tabular,
    KeyValueBlock,
    Ignored,
}

/// Parsed command output, tagged by the kind of parser that produced it
#[derive(Debug, Clone)]
pub enum ParsedOutput {
    Tabular(SessionTable),
    KeyValueBlock(Result<SessionDetail, ParseIssue>),
    Ignored,
}

/// Parse `text` with the parser registered for `kind`
pub fn parse(kind: OutputKind, text: &str) -> ParsedOutput {
    match kind {
        OutputKind::Tabular => ParsedOutput::Tabular(parse_session_table(text)),
        OutputKind::KeyValueBlock => ParsedOutput::KeyValueBlock(parse_session_detail(text)),
        OutputKind::Ignored => ParsedOutput::Ignored,
    }
}

/// A line that could not be turned into session data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseIssue {
    /// 1-based line number in the cleaned output
    pub line: usize,
    pub text: String,
    pub reason: String,
}

impl fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} ({:?})", self.line, self.reason, self.text)
    }
}

/// Result of parsing the session summary table
#[derive(Debug, Clone, Default)]
pub struct SessionTable {
    pub sessions: Vec<Session>,
    /// Value of the trailing `Session count = N` line, when present
    pub reported_count: Option<usize>,
    pub issues: Vec<ParseIssue>,
}

/// One row of the `Method status list` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodState {
    pub method: String,
    pub state: String,
}

/// Fields of interest from `show access-session mac <mac> details`
#[derive(Debug, Clone, Default)]
pub struct SessionDetail {
    pub interface: Option<String>,
    pub mac: Option<String>,
    pub ipv4_address: Option<IpAddr>,
    pub ipv6_address: Option<IpAddr>,
    pub user_name: Option<String>,
    pub status: Option<String>,
    pub domain: Option<String>,
    pub host_mode: Option<String>,
    pub session_id: Option<String>,
    pub current_policy: Option<String>,
    pub methods: Vec<MethodState>,
}

impl SessionDetail {
    /// No attribute and no method state was recognised
    pub fn is_empty(&self) -> bool {
        self.interface.is_none()
            && self.mac.is_none()
            && self.ipv4_address.is_none()
            && self.ipv6_address.is_none()
            && self.user_name.is_none()
            && self.status.is_none()
            && self.domain.is_none()
            && self.host_mode.is_none()
            && self.session_id.is_none()
            && self.current_policy.is_none()
            && self.methods.is_empty()
    }

    /// The method whose state reports an authentication attempt (`Authc ...`)
    pub fn authenticating_method(&self) -> Option<&str> {
        self.methods
            .iter()
            .find(|m| m.state.starts_with("Authc"))
            .map(|m| m.method.as_str())
    }

    /// First method state that reports a failure, as `method: state`
    pub fn failure_reason(&self) -> Option<String> {
        self.methods
            .iter()
            .find(|m| m.state.to_lowercase().contains("fail"))
            .map(|m| format!("{}: {}", m.method, m.state))
    }

    fn apply(&mut self, key: &str, value: &str) {
        let value = value.trim();
        match key.to_lowercase().as_str() {
            "interface" => self.interface = Some(value.to_string()),
            "mac address" => self.mac = Some(value.to_string()),
            "ipv4 address" | "ip address" => self.ipv4_address = value.parse().ok(),
            "ipv6 address" => self.ipv6_address = value.parse().ok(),
            "user-name" | "user name" | "username" => self.user_name = Some(value.to_string()),
            "status" => self.status = Some(value.to_string()),
            "domain" => self.domain = Some(value.to_string()),
            "oper host mode" => self.host_mode = Some(value.to_string()),
            "common session id" => self.session_id = Some(value.to_string()),
            "current policy" => self.current_policy = Some(value.to_string()),
            _ => {}
        }
    }
}

/// Remove `--More--` continuation prompts and their backspace erase runs.
/// A line left empty by the removal is dropped.
pub fn strip_pagination(text: &str) -> String {
    text.lines()
        .filter_map(|line| {
            let had_prompt = line.contains(MORE_PROMPT);
            let mut cleaned = line.replace(MORE_PROMPT, "");
            cleaned.retain(|c| c != ERASE && c != '\r');
            if had_prompt && cleaned.trim().is_empty() {
                None
            } else {
                Some(cleaned)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse the `show access-session` summary table
pub fn parse_session_table(text: &str) -> SessionTable {
    let cleaned = strip_pagination(text);
    let mut table = SessionTable::default();

    for (index, line) in cleaned.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || is_table_header(trimmed) || is_separator(trimmed) {
            continue;
        }
        if let Some(count) = parse_session_count(trimmed) {
            table.reported_count = Some(count);
            continue;
        }
        // Flag legend and trailing sections end the table
        if trimmed.starts_with("Key to Session Events") || trimmed.ends_with(':') {
            break;
        }
        if trimmed.starts_with("No sessions") {
            continue;
        }

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        match parse_row(&tokens) {
            Ok(session) => table.sessions.push(session),
            Err(reason) => table.issues.push(ParseIssue {
                line: index + 1,
                text: trimmed.to_string(),
                reason: reason.to_string(),
            }),
        }
    }

    table
}

fn is_table_header(line: &str) -> bool {
    line.starts_with("Interface") && line.contains("MAC")
}

fn is_separator(line: &str) -> bool {
    line.chars().all(|c| c == '-' || c == '=')
}

fn parse_session_count(line: &str) -> Option<usize> {
    let rest = line.strip_prefix("Session count")?;
    rest.trim().strip_prefix('=')?.trim().parse().ok()
}

fn looks_like_session_id(token: &str) -> bool {
    token.len() >= 16 && token.chars().all(|c| c.is_ascii_hexdigit())
}

fn looks_like_flags(token: &str) -> bool {
    token.len() <= 2 && token.chars().all(|c| c.is_ascii_uppercase())
}

/// Columns: interface, MAC, method, domain, status (may span words), flags, session id.
/// Everything after the MAC is optional.
fn parse_row(tokens: &[&str]) -> Result<Session, &'static str> {
    let interface = tokens.first().ok_or("empty row")?;
    let mac_token = tokens.get(1).ok_or("missing MAC address column")?;
    if !is_dot_quartet(mac_token) {
        return Err("missing or truncated MAC address");
    }
    let mac = normalize(mac_token, MacFormat::Dot).map_err(|_| "malformed MAC address")?;

    let mut session = Session::new(interface, mac);
    if let Some(method) = tokens.get(2) {
        session.method = AuthMethod::from_raw(method);
    }
    if let Some(domain) = tokens.get(3) {
        session.domain = Some(domain.to_string());
    }

    let mut rest: Vec<&str> = tokens.iter().skip(4).copied().collect();
    if rest.last().is_some_and(|t| looks_like_session_id(t)) {
        session.session_id = rest.pop().map(str::to_string);
    }
    // Also covers a flag column next to an empty status
    if rest.last().is_some_and(|t| looks_like_flags(t)) {
        rest.pop();
    }
    session.set_status(&rest.join(" "));

    Ok(session)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DetailSection {
    Attributes,
    MethodList,
    Other,
}

/// Parse a `show access-session mac <mac> details` block. IOS error lines
/// (`% ...`) and output with no recognised field are reported as issues.
pub fn parse_session_detail(text: &str) -> Result<SessionDetail, ParseIssue> {
    let cleaned = strip_pagination(text);
    let mut detail = SessionDetail::default();
    let mut section = DetailSection::Attributes;

    for (index, line) in cleaned.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('%') {
            return Err(ParseIssue {
                line: index + 1,
                text: trimmed.to_string(),
                reason: "switch rejected the detail command".to_string(),
            });
        }

        // Section headers start at column 0; attribute keys are right-aligned
        let is_header = !line.starts_with(char::is_whitespace)
            && trimmed.ends_with(':')
            && !trimmed.contains(": ");
        if is_header {
            section = if trimmed.eq_ignore_ascii_case("Method status list:") {
                DetailSection::MethodList
            } else {
                DetailSection::Other
            };
            continue;
        }

        match section {
            DetailSection::Attributes => {
                if let Some((key, value)) = trimmed.split_once(':')
                    && !value.trim().is_empty()
                {
                    detail.apply(key.trim(), value);
                }
            }
            DetailSection::MethodList => {
                let tokens: Vec<&str> = trimmed.split_whitespace().collect();
                if tokens.len() < 2 || (tokens[0] == "Method" && tokens[1] == "State") {
                    continue;
                }
                detail.methods.push(MethodState {
                    method: tokens[0].to_string(),
                    state: tokens[1..].join(" "),
                });
            }
            DetailSection::Other => {}
        }
    }

    if detail.is_empty() {
        return Err(ParseIssue {
            line: 1,
            text: cleaned
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .unwrap_or_default()
                .to_string(),
            reason: "no session detail in output".to_string(),
        });
    }
    Ok(detail)
}
