//! Interactive shell seam between the scraper and the wire, plus the prompt
//! handling shared by shell implementations.

use std::net::IpAddr;

use super::error::ScraperError;

/// An open interactive CLI session on one switch
pub trait ShellTransport {
    /// Run one command and return its output without the echoed command or
    /// the trailing prompt
    fn execute(&mut self, command: &str) -> Result<String, ScraperError>;

    /// Enter enable mode. `Ok(false)` means the switch refused the secret.
    fn enable(&mut self, secret: &str) -> Result<bool, ScraperError>;

    /// Release the underlying connection
    fn close(&mut self) -> Result<(), ScraperError>;
}

/// Opens shells to switches
pub trait Connector {
    type Transport: ShellTransport;

    fn connect(&self, host: IpAddr) -> Result<Self::Transport, ScraperError>;
}

/// A CLI prompt such as `access-sw1>` or `access-sw1#`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub hostname: String,
    pub privileged: bool,
}

const MAX_PROMPT_LEN: usize = 64;

fn last_line(buffer: &str) -> &str {
    let trimmed = buffer.trim_end_matches([' ', '\r', '\n']);
    trimmed.rsplit('\n').next().unwrap_or("").trim()
}

/// Detect a prompt on the last line of `buffer`
pub fn detect_prompt(buffer: &str) -> Option<Prompt> {
    let line = last_line(buffer);
    if line.len() < 2 || line.len() > MAX_PROMPT_LEN {
        return None;
    }
    let privileged = match line.chars().last()? {
        '#' => true,
        '>' => false,
        _ => return None,
    };
    let hostname = &line[..line.len() - 1];
    if hostname.is_empty() || hostname.contains(char::is_whitespace) {
        return None;
    }
    Some(Prompt {
        hostname: hostname.to_string(),
        privileged,
    })
}

/// True once `buffer` ends with the prompt of `hostname` in either mode
pub fn ends_with_prompt(buffer: &str, hostname: &str) -> bool {
    detect_prompt(buffer).is_some_and(|p| p.hostname == hostname)
}

/// True when the switch is waiting for the enable secret
pub fn is_password_prompt(buffer: &str) -> bool {
    last_line(buffer).ends_with("assword:")
}

/// True when the switch paused output with a continuation prompt
pub fn is_more_prompt(buffer: &str) -> bool {
    last_line(buffer).ends_with("--More--")
}

/// Strip carriage returns, the echoed command and the trailing prompt
pub fn clean_output(raw: &str, command: &str, hostname: &str) -> String {
    let normalized = raw.replace('\r', "");
    let mut lines: Vec<&str> = normalized.lines().collect();

    if lines
        .first()
        .is_some_and(|first| first.trim_end().ends_with(command.trim()))
    {
        lines.remove(0);
    }
    if lines
        .last()
        .is_some_and(|last| ends_with_prompt(last, hostname))
    {
        lines.pop();
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_prompt() {
        assert_eq!(
            detect_prompt("banner\r\naccess-sw1>"),
            Some(Prompt {
                hostname: "access-sw1".to_string(),
                privileged: false
            })
        );
        assert_eq!(
            detect_prompt("access-sw1#  "),
            Some(Prompt {
                hostname: "access-sw1".to_string(),
                privileged: true
            })
        );
        assert_eq!(detect_prompt("Password:"), None);
        assert_eq!(detect_prompt("Status: Auth > 3"), None);
        assert_eq!(detect_prompt(""), None);
        assert_eq!(detect_prompt("#"), None);
    }

    #[test]
    fn test_ends_with_prompt_ignores_other_hosts() {
        assert!(ends_with_prompt("output\nsw1#", "sw1"));
        assert!(ends_with_prompt("output\nsw1>", "sw1"));
        assert!(!ends_with_prompt("output\nsw2#", "sw1"));
        assert!(!ends_with_prompt("output still coming", "sw1"));
    }

    #[test]
    fn test_password_and_more_prompts() {
        assert!(is_password_prompt("enable\r\nPassword: "));
        assert!(!is_password_prompt("sw1>"));
        assert!(is_more_prompt("row\n --More-- "));
        assert!(!is_more_prompt("row\nsw1#"));
    }

    #[test]
    fn test_clean_output() {
        let raw = "show access-session\r\nInterface  MAC Address\r\nGi1/0/1    0050.5699.0001\r\nsw1#";
        assert_eq!(
            clean_output(raw, "show access-session", "sw1"),
            "Interface  MAC Address\nGi1/0/1    0050.5699.0001"
        );
    }

    #[test]
    fn test_clean_output_with_hostname_in_echo() {
        let raw = "sw1#terminal length 0\nsw1#";
        assert_eq!(clean_output(raw, "terminal length 0", "sw1"), "");
    }
}
