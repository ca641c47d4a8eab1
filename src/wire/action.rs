//! The closed set of semantic events the response parser can produce
//! from a single packet. Unknown shapes become [`Action::Unparsed`]
//! rather than an error — only malformed shapes the parser actually
//! attempted to interpret are errors (see the session-layer handling
//! of [`crate::error::ParseError`]).

use crate::message::{BodyStructure, Envelope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    No,
    Bad,
    Preauth,
    Bye,
}

impl Status {
    #[must_use]
    pub fn parse(token: &[u8]) -> Option<Self> {
        match token.to_ascii_uppercase().as_slice() {
            b"OK" => Some(Self::Ok),
            b"NO" => Some(Self::No),
            b"BAD" => Some(Self::Bad),
            b"PREAUTH" => Some(Self::Preauth),
            b"BYE" => Some(Self::Bye),
            _ => None,
        }
    }
}

/// One `FETCH` message-attribute, one per attribute named in the
/// parenthesized list (so a single `FETCH` line for one sequence
/// number can yield several [`Action::Fetch`] entries).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttr {
    Flags(Vec<String>),
    Uid(u32),
    Envelope(Box<Envelope>),
    Body(Box<BodyStructure>),
    /// `BODY[<path>] <nstring>`. `path` is empty only for the
    /// degenerate top-level request, in which case it is normalized
    /// to `[1]` per the response parser's contract.
    BodyContent { path: Vec<u32>, data: Option<Vec<u8>> },
}

/// A single semantic server event produced by the response parser
/// from one packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Capabilities(Vec<String>),
    ApplicableFlags(Vec<String>),
    PermanentFlags(Vec<String>),
    Exists(u32),
    Recent(u32),
    Expunge(u32),
    UidValidity(u32),
    UidNext(u32),
    Unseen(u32),
    ListEntry {
        flags: Vec<String>,
        delimiter: Option<char>,
        mailbox: String,
    },
    CopyUid {
        validity: u32,
        src: Vec<u32>,
        dst: Vec<u32>,
    },
    /// An untagged `OK`/`NO`/`BAD`/`PREAUTH`/`BYE` whose response text
    /// carried no bracketed code this parser recognizes, or whose
    /// recognized code was handled into one of the variants above
    /// (in which case this is still emitted so the raw text is not
    /// lost).
    UntaggedStatus { status: Status, text: String },
    TaggedResponse {
        tag: u32,
        status: Status,
        text: String,
    },
    Fetch {
        seq: u32,
        attr: FetchAttr,
    },
    Continuation,
    /// A recognized top-level shape whose content this parser does
    /// not interpret further, logged at the session layer and
    /// otherwise ignored.
    Unparsed { raw: String },
}
