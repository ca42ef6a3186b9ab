//! Commands issued to the switch. Each command knows its CLI text, whether it
//! needs enable mode, and which parser reads its output.

use super::parser::OutputKind;
use crate::mac::{MacFormat, NormalizedMac};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowCommand {
    /// Disable paging for the rest of the session
    TerminalLength,
    SessionSummary,
    SessionDetail(NormalizedMac),
}

impl ShowCommand {
    pub fn text(&self) -> String {
        match self {
            ShowCommand::TerminalLength => "terminal length 0".to_string(),
            ShowCommand::SessionSummary => "show access-session".to_string(),
            ShowCommand::SessionDetail(mac) => format!(
                "show access-session mac {} details",
                mac.to_format(MacFormat::Dot)
            ),
        }
    }

    pub fn output_kind(&self) -> OutputKind {
        match self {
            ShowCommand::TerminalLength => OutputKind::Ignored,
            ShowCommand::SessionSummary => OutputKind::Tabular,
            ShowCommand::SessionDetail(_) => OutputKind::KeyValueBlock,
        }
    }

    pub fn requires_privilege(&self) -> bool {
        matches!(self, ShowCommand::SessionDetail(_))
    }
}
