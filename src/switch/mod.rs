//! Access-session scraping for Cisco IOS switches: the shell transport, the
//! commands sent over it, the parsers for their output and the stateful
//! scraper that ties them together.

pub mod command;
pub mod error;
pub mod parser;
pub mod scraper;
pub mod ssh;
pub mod transport;
pub mod types;

pub use error::ScraperError;
pub use scraper::SwitchScraper;
pub use ssh::SshConnector;
pub use transport::Connector;
pub use types::{AuthMethod, Session};
