//! Error types for imap-watch

use thiserror::Error;

/// Where in a response packet a parse failure occurred, plus what the
/// parser expected there. Carried by [`Error::Parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Byte offset into the packet being parsed.
    pub offset: usize,
    /// Short description of what the parser was attempting.
    pub context: String,
}

impl ParseError {
    #[must_use]
    pub fn new(offset: usize, context: impl Into<String>) -> Self {
        Self {
            offset,
            context: context.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "at offset {}: {}", self.offset, self.context)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed wire data: a packet the framer assembled could not be
    /// parsed into actions.
    #[error("IMAP parse error {0}")]
    Parse(ParseError),

    /// A tagged BAD/NO at a lifecycle step (CAPABILITY, STARTTLS, LOGIN,
    /// SELECT), or any other condition that forces session shutdown.
    #[error("IMAP protocol error: {0}")]
    Protocol(String),

    /// Transport closed, or a read/write on it failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// STARTTLS negotiation or the TLS handshake itself failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// `Config::validate` rejected the configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}
