//! Session records scraped from `show access-session` and the values they carry.

use std::fmt;
use std::net::IpAddr;

use serde::{Serialize, Serializer};

use super::parser::SessionDetail;
use crate::mac::NormalizedMac;
use crate::vendor::Vendor;

/// How the switch authenticated (or tried to authenticate) an endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Mab,
    Dot1x,
    Other(String),
    Unknown,
}

impl AuthMethod {
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_lowercase().as_str() {
            "" | "n/a" | "unknown" => AuthMethod::Unknown,
            "mab" => AuthMethod::Mab,
            "dot1x" => AuthMethod::Dot1x,
            _ => AuthMethod::Other(trimmed.to_string()),
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Mab => write!(f, "mab"),
            AuthMethod::Dot1x => write!(f, "dot1x"),
            AuthMethod::Other(raw) => write!(f, "{}", raw),
            AuthMethod::Unknown => write!(f, "unknown"),
        }
    }
}

impl Serialize for AuthMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Authorization state of a session.
/// Summary output abbreviates (`Auth`, `Unauth`); detail output spells it out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Authorized,
    Unauthorized,
    Failed,
    Other(String),
    Unknown,
}

impl SessionStatus {
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lower = trimmed.to_lowercase();
        if lower.is_empty() {
            SessionStatus::Unknown
        } else if lower.contains("fail") {
            SessionStatus::Failed
        } else if lower.starts_with("unauth") {
            SessionStatus::Unauthorized
        } else if matches!(
            lower.as_str(),
            "auth" | "authorized" | "authz success" | "auth success"
        ) {
            SessionStatus::Authorized
        } else {
            SessionStatus::Other(trimmed.to_string())
        }
    }

    pub fn is_authorized(&self) -> bool {
        matches!(self, SessionStatus::Authorized)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Authorized => write!(f, "authorized"),
            SessionStatus::Unauthorized => write!(f, "unauthorized"),
            SessionStatus::Failed => write!(f, "failed"),
            SessionStatus::Other(raw) => write!(f, "{}", raw),
            SessionStatus::Unknown => write!(f, "unknown"),
        }
    }
}

impl Serialize for SessionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One authentication session on the switch.
/// `mac` is the join key for detail lookup, vendor resolution and ISE.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub interface: String,
    pub mac: NormalizedMac,
    pub ip_address: Option<IpAddr>,
    pub user_name: Option<String>,
    pub method: AuthMethod,
    pub domain: Option<String>,
    pub status: SessionStatus,
    /// Status exactly as the switch printed it
    pub status_text: String,
    pub session_id: Option<String>,
    pub failure_reason: Option<String>,
    pub vendor: Option<Vendor>,
    pub enriched: bool,
}

impl Session {
    pub fn new(interface: &str, mac: NormalizedMac) -> Self {
        Self {
            interface: interface.to_string(),
            mac,
            ip_address: None,
            user_name: None,
            method: AuthMethod::Unknown,
            domain: None,
            status: SessionStatus::Unknown,
            status_text: String::new(),
            session_id: None,
            failure_reason: None,
            vendor: None,
            enriched: false,
        }
    }

    pub fn set_status(&mut self, raw: &str) {
        self.status = SessionStatus::from_raw(raw);
        self.status_text = raw.trim().to_string();
    }

    /// Fold the per-session detail block into this summary record
    pub fn merge_detail(&mut self, detail: SessionDetail) {
        if let Some(method) = detail.authenticating_method() {
            self.method = AuthMethod::from_raw(method);
        }
        self.failure_reason = detail.failure_reason();
        if let Some(status) = detail.status.as_deref() {
            self.set_status(status);
        }

        if let Some(interface) = detail.interface {
            self.interface = interface;
        }
        if let Some(ip) = detail.ipv4_address.or(detail.ipv6_address) {
            self.ip_address = Some(ip);
        }
        if detail.user_name.is_some() {
            self.user_name = detail.user_name;
        }
        self.domain = detail.domain.or(self.domain.take());
        self.session_id = detail.session_id.or(self.session_id.take());
        self.enriched = true;
    }
}
