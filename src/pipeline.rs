//! One collection run against one switch: connect, enumerate sessions, enrich
//! the ones that are not authorized, resolve vendors for MAB endpoints and
//! report. Whatever was gathered before a failure is kept in the report.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, SwitchConfig};
use crate::mac::MacFormat;
use crate::switch::parser::ParseIssue;
use crate::switch::{AuthMethod, Connector, ScraperError, Session, SshConnector, SwitchScraper};
use crate::vendor::VendorResolver;

#[derive(Debug, Clone, Serialize)]
pub struct CollectionReport {
    pub switch: IpAddr,
    pub collected_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// Enable mode was reached; without it no session was enriched
    pub privileged: bool,
    /// Non-authorized sessions keyed by switch-notation MAC
    pub sessions: BTreeMap<String, Session>,
    /// Set when the run stopped early or degraded; `sessions` still holds
    /// everything gathered before that
    pub error: Option<String>,
    /// Summary rows skipped and detail blocks left unmerged
    pub issues: Vec<ParseIssue>,
}

impl CollectionReport {
    /// No command failed and every line parsed
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.issues.is_empty()
    }

    pub fn enriched_count(&self) -> usize {
        self.sessions.values().filter(|s| s.enriched).count()
    }
}

pub struct SessionCollector<'a, C: Connector> {
    config: &'a SwitchConfig,
    connector: C,
    vendors: &'a VendorResolver,
}

impl<'a, C: Connector> SessionCollector<'a, C> {
    pub fn new(config: &'a SwitchConfig, connector: C, vendors: &'a VendorResolver) -> Self {
        Self {
            config,
            connector,
            vendors,
        }
    }

    /// Connection failures are returned as errors. Anything that fails after
    /// the shell is open is recorded in `CollectionReport::error` instead.
    pub fn collect(&self, switch: IpAddr) -> Result<CollectionReport, ScraperError> {
        let started = Instant::now();
        let collected_at = Utc::now();
        info!(%switch, "collecting access sessions");

        let mut scraper = SwitchScraper::connect(&self.connector, switch, &self.config.secret)?;
        let privileged = scraper.is_privileged();

        let outcome = scraper
            .collect_sessions()
            .and_then(|_| scraper.enrich_unauthorized());
        let error = match outcome {
            Ok(_) => None,
            Err(e) => {
                warn!(%switch, error = %e, "collection incomplete; keeping partial results");
                Some(e.to_string())
            }
        };

        debug!(
            %switch,
            state = %scraper.state(),
            issues = scraper.issues().len(),
            "releasing switch session"
        );

        // The shell is released before any vendor lookups go out
        let (sessions, issues) = scraper.finish();
        let sessions = self.build_report_sessions(sessions);

        let report = CollectionReport {
            switch,
            collected_at,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            privileged,
            sessions,
            error,
            issues,
        };
        info!(
            %switch,
            sessions = report.sessions.len(),
            enriched = report.enriched_count(),
            issues = report.issues.len(),
            elapsed_ms = report.elapsed_ms,
            "collection finished"
        );
        Ok(report)
    }

    fn build_report_sessions(&self, sessions: Vec<Session>) -> BTreeMap<String, Session> {
        sessions
            .into_iter()
            .filter(|s| !s.status.is_authorized())
            .map(|mut session| {
                if session.method == AuthMethod::Mab {
                    session.vendor = Some(self.vendors.resolve(&session.mac));
                }
                (session.mac.to_format(MacFormat::Dot).to_string(), session)
            })
            .collect()
    }
}

/// Run a collection over SSH with the configured switch credentials
pub fn collect_from_switch(
    config: &AppConfig,
    vendors: &VendorResolver,
    switch: IpAddr,
) -> Result<CollectionReport, ScraperError> {
    let connector = SshConnector::new(&config.switch);
    SessionCollector::new(&config.switch, connector, vendors).collect(switch)
}
