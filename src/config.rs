//! Session configuration
//!
//! Unlike the environment-driven configuration this crate is descended
//! from, `imap-watch` never consults the process environment: a
//! [`Config`] is built programmatically by the caller and validated
//! synchronously before a session starts.

use crate::error::{Error, Result};
use crate::folder::Folder;

/// How the TLS peer certificate is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslVerify {
    /// Verify the server certificate against the platform's native
    /// trust store (via `rustls-native-certs`). The default.
    #[default]
    Peer,
    /// Accept any certificate. Only appropriate against a known host,
    /// e.g. a local bridge presenting a self-signed certificate.
    None,
}

/// Configuration for a single persistent IMAP session.
#[derive(Debug, Clone)]
pub struct Config {
    /// Hostname or IP address to connect to.
    pub server: String,
    /// TCP port. Defaults to 993 (implicit TLS).
    pub port: u16,
    /// Whether to negotiate TLS (implicit if connecting on 993,
    /// otherwise via STARTTLS once the connection is established).
    pub tls: bool,
    /// Login username.
    pub username: String,
    /// Login password. Cleared from the session as soon as the LOGIN
    /// command has been written to the transport.
    pub password: String,
    /// A caller-chosen label for this session, used only in log
    /// output (never sent on the wire).
    pub name: String,
    /// The single mailbox this session selects and watches.
    pub mailbox: String,
    /// Peer certificate verification policy.
    pub ssl_verify: SslVerify,
}

impl Config {
    /// Start building a configuration with the required fields filled
    /// in and every optional field at its documented default.
    #[must_use]
    pub fn new(
        server: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            port: 993,
            tls: true,
            username: username.into(),
            password: password.into(),
            name: name.into(),
            mailbox: "INBOX".to_string(),
            ssl_verify: SslVerify::Peer,
        }
    }

    /// Select a mailbox other than the default `INBOX`.
    #[must_use]
    pub fn with_mailbox(mut self, mailbox: impl Into<Folder>) -> Self {
        self.mailbox = mailbox.into().as_str().to_string();
        self
    }

    /// Validate the configuration synchronously, failing with a
    /// precise reason rather than discovering the problem mid-connect.
    pub fn validate(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            return Err(Error::Config("server must not be empty".to_string()));
        }
        if self.username.is_empty() {
            return Err(Error::Config("username must not be empty".to_string()));
        }
        if self.mailbox.trim().is_empty() {
            return Err(Error::Config("mailbox must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::Config("port must be nonzero".to_string()));
        }
        Ok(())
    }
}
