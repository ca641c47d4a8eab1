//! Message-shaped types shared by the parser, the fetch pipeline, and
//! delivered records.

use std::collections::BTreeMap;

/// An address as it appears in an ENVELOPE address list: an optional
/// display name plus a mailbox address. Mailbox and host are
/// lower-cased by the parser (see design notes on address
/// normalization); the display name is preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub display_name: Option<String>,
    pub email: String,
}

impl Address {
    #[must_use]
    pub fn new(display_name: Option<String>, mailbox: &str, host: &str) -> Self {
        Self {
            display_name,
            email: format!("{}@{}", mailbox.to_lowercase(), host.to_lowercase()),
        }
    }
}

/// The decoded ENVELOPE of a message, per RFC 3501 §7.4.2.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    pub date: Option<chrono::DateTime<chrono::Utc>>,
    pub subject: Option<String>,
    pub from: Vec<Address>,
    pub sender: Vec<Address>,
    pub reply_to: Vec<Address>,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
    pub in_reply_to: Option<String>,
    pub message_id: Option<String>,
}

/// The content-transfer-encoding declared in a BODYSTRUCTURE onepart
/// entry. Decoding of `Base64` and `QuotedPrintable` is performed by
/// [`crate::decode`]; all other variants pass bytes through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoding {
    SevenBit,
    EightBit,
    Binary,
    Base64,
    QuotedPrintable,
    Other(String),
}

impl Encoding {
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        match token.to_ascii_uppercase().as_str() {
            "7BIT" => Self::SevenBit,
            "8BIT" => Self::EightBit,
            "BINARY" => Self::Binary,
            "BASE64" => Self::Base64,
            "QUOTED-PRINTABLE" => Self::QuotedPrintable,
            _ => Self::Other(token.to_string()),
        }
    }
}

/// A recursive BODYSTRUCTURE tree (RFC 3501 §7.4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStructure {
    Onepart {
        mime_type: String,
        mime_subtype: String,
        params: BTreeMap<String, String>,
        content_id: Option<String>,
        description: Option<String>,
        encoding: Encoding,
        octets: u32,
    },
    Multipart {
        children: Vec<BodyStructure>,
        mime_subtype: String,
    },
}

impl BodyStructure {
    /// Enumerate every leaf part's dotted path, in left-to-right,
    /// depth-first order (`"1"`, `"1.1"`, `"1.2"`, `"2"`, ...).
    #[must_use]
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        Self::collect_paths(self, &mut Vec::new(), &mut out);
        out
    }

    fn collect_paths(node: &Self, prefix: &mut Vec<u32>, out: &mut Vec<String>) {
        match node {
            Self::Onepart { .. } => {
                let path = if prefix.is_empty() {
                    "1".to_string()
                } else {
                    prefix
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(".")
                };
                out.push(path);
            }
            Self::Multipart { children, .. } => {
                for (i, child) in children.iter().enumerate() {
                    prefix.push(u32::try_from(i + 1).unwrap_or(u32::MAX));
                    Self::collect_paths(child, prefix, out);
                    prefix.pop();
                }
            }
        }
    }
}

/// A single fetched and decoded body part, addressed by its dotted
/// BODYSTRUCTURE path (e.g. `"1.3.2"`; `"1"` for a onepart message).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyLeaf {
    pub mime_type: String,
    pub mime_subtype: String,
    pub params: BTreeMap<String, String>,
    pub bytes: Vec<u8>,
}

/// The fully-assembled body of a delivered message, tree-shaped to
/// mirror the [`BodyStructure`] it was fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Leaf(BodyLeaf),
    Nested(Vec<Body>),
}

/// A fully decoded message, as delivered to subscribers whose filter
/// accepted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredMessage {
    pub seqnum: u32,
    pub flags: Vec<crate::flag::Flag>,
    pub date: Option<chrono::DateTime<chrono::Utc>>,
    pub subject: Option<String>,
    pub from: Vec<Address>,
    pub sender: Vec<Address>,
    pub reply_to: Vec<Address>,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
    pub in_reply_to: Option<String>,
    pub message_id: Option<String>,
    pub body: Body,
}
