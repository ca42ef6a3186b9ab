//! Stateful scraper for one switch. Owns the shell for its lifetime, keeps every
//! session parsed so far, and closes the shell exactly once.

use std::fmt;
use std::net::IpAddr;

use tracing::{debug, info, warn};

use super::command::ShowCommand;
use super::error::ScraperError;
use super::parser::{ParseIssue, ParsedOutput};
use super::transport::{Connector, ShellTransport};
use super::types::Session;
use crate::config::Secret;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScraperState {
    Disconnected,
    Connecting,
    Connected { privileged: bool },
    Collecting,
}

impl fmt::Display for ScraperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScraperState::Disconnected => write!(f, "disconnected"),
            ScraperState::Connecting => write!(f, "connecting"),
            ScraperState::Connected { privileged: true } => write!(f, "connected (enable)"),
            ScraperState::Connected { privileged: false } => write!(f, "connected"),
            ScraperState::Collecting => write!(f, "collecting"),
        }
    }
}

pub struct SwitchScraper<T: ShellTransport> {
    host: IpAddr,
    transport: Option<T>,
    state: ScraperState,
    privileged: bool,
    sessions: Vec<Session>,
    issues: Vec<ParseIssue>,
}

impl<T: ShellTransport> SwitchScraper<T> {
    /// Open a shell to `host` and try to enter enable mode.
    /// A refused secret leaves the scraper usable for unprivileged commands.
    pub fn connect<C>(connector: &C, host: IpAddr, secret: &Secret) -> Result<Self, ScraperError>
    where
        C: Connector<Transport = T>,
    {
        debug!(%host, state = %ScraperState::Connecting, "opening switch session");
        let mut transport = connector.connect(host).inspect_err(|e| {
            warn!(%host, error = %e, "switch connection failed");
        })?;

        let privileged = match transport.enable(secret.expose()) {
            Ok(true) => true,
            Ok(false) => {
                warn!(%host, "enable secret refused; privileged commands will be skipped");
                false
            }
            Err(e) => {
                warn!(%host, error = %e, "privilege escalation failed");
                false
            }
        };

        let state = ScraperState::Connected { privileged };
        info!(%host, %state, "switch session ready");
        Ok(Self {
            host,
            transport: Some(transport),
            state,
            privileged,
            sessions: Vec::new(),
            issues: Vec::new(),
        })
    }

    pub fn state(&self) -> ScraperState {
        self.state
    }

    pub fn is_privileged(&self) -> bool {
        self.privileged
    }

    /// Sessions parsed so far, enriched or not
    pub fn results(&self) -> &[Session] {
        &self.sessions
    }

    /// Summary rows and detail blocks that could not be parsed
    pub fn issues(&self) -> &[ParseIssue] {
        &self.issues
    }

    fn run(&mut self, command: &ShowCommand) -> Result<ParsedOutput, ScraperError> {
        let text = command.text();
        if command.requires_privilege() && !self.privileged {
            return Err(ScraperError::InsufficientPrivilege { command: text });
        }
        let transport = self.transport.as_mut().ok_or(ScraperError::NotConnected)?;

        debug!(host = %self.host, command = %text, "sending command");
        let output = transport.execute(&text)?;
        Ok(super::parser::parse(command.output_kind(), &output))
    }

    /// Enumerate every active session. Returns the number of sessions parsed.
    pub fn collect_sessions(&mut self) -> Result<usize, ScraperError> {
        self.state = ScraperState::Collecting;

        if let Err(e) = self.run(&ShowCommand::TerminalLength) {
            debug!(host = %self.host, error = %e, "could not disable paging");
        }

        let ParsedOutput::Tabular(table) = self.run(&ShowCommand::SessionSummary)? else {
            return Ok(0);
        };

        for issue in &table.issues {
            warn!(host = %self.host, %issue, "skipping unparseable session row");
        }
        if let Some(reported) = table.reported_count
            && reported != table.sessions.len()
        {
            warn!(
                host = %self.host,
                reported,
                parsed = table.sessions.len(),
                "session count differs from parsed rows"
            );
        }

        self.sessions = table.sessions;
        self.issues.extend(table.issues);
        info!(host = %self.host, count = self.sessions.len(), "collected access sessions");
        Ok(self.sessions.len())
    }

    /// Fetch and merge detail for every session that is not authorized.
    /// Stops at the first command failure; sessions enriched before it keep
    /// their detail. Unparseable detail is recorded as an issue and skipped.
    pub fn enrich_unauthorized(&mut self) -> Result<usize, ScraperError> {
        let pending: Vec<usize> = self
            .sessions
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.status.is_authorized() && !s.enriched)
            .map(|(i, _)| i)
            .collect();

        let mut enriched = 0;
        for index in pending {
            let mac = self.sessions[index].mac.clone();
            match self.run(&ShowCommand::SessionDetail(mac.clone()))? {
                ParsedOutput::KeyValueBlock(Ok(detail)) => {
                    self.sessions[index].merge_detail(detail);
                    enriched += 1;
                }
                ParsedOutput::KeyValueBlock(Err(mut issue)) => {
                    warn!(host = %self.host, %mac, %issue, "session detail not merged");
                    issue.reason = format!("{}: {}", mac, issue.reason);
                    self.issues.push(issue);
                }
                _ => {}
            }
        }

        debug!(host = %self.host, enriched, "session detail merged");
        Ok(enriched)
    }

    /// Release the shell. Later calls do nothing; close errors are only logged.
    pub fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            match transport.close() {
                Ok(()) => debug!(host = %self.host, "switch session closed"),
                Err(e) => warn!(host = %self.host, error = %e, "error while closing switch session"),
            }
        }
        self.state = ScraperState::Disconnected;
    }

    /// Close the shell and hand back the accumulated sessions and parse issues
    pub fn finish(mut self) -> (Vec<Session>, Vec<ParseIssue>) {
        self.close();
        (
            std::mem::take(&mut self.sessions),
            std::mem::take(&mut self.issues),
        )
    }
}

impl<T: ShellTransport> Drop for SwitchScraper<T> {
    fn drop(&mut self) {
        self.close();
    }
}
