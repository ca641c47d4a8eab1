//! The durable record for one session: everything the state machine
//! and fetch pipeline read and mutate between packets.

use crate::config::Config;
use crate::error::Result;
use crate::flag::Flag;
use crate::message::{BodyStructure, Envelope};
use crate::session::subscriber::Subscriber;
use crate::session::transport::Connection;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Connection lifecycle phase. `Selected` additionally carries
/// whether the mailbox was opened read-only or read-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotAuthenticated,
    Authenticated,
    Selected(Access),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// Metadata for the single selected mailbox, mutated only by applying
/// parser actions.
#[derive(Debug, Clone, Default)]
pub struct MailboxSnapshot {
    pub uid_validity: u32,
    pub uid_next: u32,
    pub exists: u32,
    pub recent: u32,
    pub first_unseen: Option<u32>,
    pub permanent_flags: Vec<String>,
    pub applicable_flags: Vec<String>,
}

/// How far a sequence number's fetch has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    None,
    Filter,
    PreBody,
    Full,
}

/// An index entry for a sequence number whose data is being
/// accumulated across fetch stages.
#[derive(Debug, Clone, Default)]
pub struct PartialMessage {
    pub seq: u32,
    pub stage: FetchStage,
    pub flags: Option<Vec<Flag>>,
    pub envelope: Option<Envelope>,
    pub body_structure: Option<BodyStructure>,
    pub parts: HashMap<Vec<u32>, Vec<u8>>,
}

impl Default for FetchStage {
    fn default() -> Self {
        Self::None
    }
}

impl PartialMessage {
    #[must_use]
    pub fn new(seq: u32) -> Self {
        Self {
            seq,
            stage: FetchStage::None,
            flags: None,
            envelope: None,
            body_structure: None,
            parts: HashMap::new(),
        }
    }
}

/// The closed set of things an outstanding tag is waiting for. The
/// state machine's response-handling is a single `match` on this
/// variant plus the arrived status, rather than a boxed callback —
/// the "tag-callback registry" reformulated as a type-safe enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagKind {
    AwaitCapability,
    AwaitStarttls,
    AwaitLogin,
    AwaitSelect,
    AwaitFetch { seq: u32, next_stage: FetchStage },
    AwaitList,
    /// Outstanding from the moment `IDLE` is sent until the tagged
    /// response to the matching `DONE` arrives. Invariant (d): while
    /// `idling` is `true`, exactly one tag carries this kind.
    AwaitIdleDone,
    Generic,
}

/// One matched entry from a `LIST` response, accumulated across the
/// untagged `ListEntry` actions that precede the tagged completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub name: String,
    pub delimiter: Option<char>,
    pub flags: Vec<String>,
}

/// State for an in-flight `LIST` command: where to send the result
/// and what has been accumulated so far.
pub struct PendingList {
    pub reply: oneshot::Sender<Result<Vec<ListEntry>>>,
    pub entries: Vec<ListEntry>,
}

/// An outstanding command: its serialized text (kept for diagnostics)
/// and what the state machine should do when its tagged response
/// arrives.
#[derive(Debug, Clone)]
pub struct TagEntry {
    pub command_text: String,
    pub kind: TagKind,
}

/// The durable record for one session.
pub struct Session {
    pub transport: Connection,
    pub config: Config,
    pub next_tag: u32,
    pub tags: HashMap<u32, TagEntry>,
    pub capabilities: std::collections::HashSet<String>,
    pub phase: Phase,
    pub selected: Option<MailboxSnapshot>,
    pub subscribers: Vec<Subscriber>,
    pub unprocessed: BTreeMap<u32, PartialMessage>,
    pub idling: bool,
    pub tls_active: bool,
    /// Deadline of the current IDLE period; armed whenever `idling`
    /// is `true` (invariant (d)).
    pub idle_deadline: Option<Instant>,
    /// The in-flight `LIST` command's accumulator, if any.
    pub pending_list: Option<PendingList>,
}

impl Session {
    #[must_use]
    pub fn new(transport: Connection, config: Config) -> Self {
        Self {
            transport,
            tls_active: config.port == 993,
            config,
            next_tag: 0,
            tags: HashMap::new(),
            capabilities: std::collections::HashSet::new(),
            phase: Phase::NotAuthenticated,
            selected: None,
            subscribers: Vec::new(),
            unprocessed: BTreeMap::new(),
            idling: false,
            idle_deadline: None,
            pending_list: None,
        }
    }

    #[must_use]
    pub fn supports_idle(&self) -> bool {
        self.capabilities.contains("IDLE")
    }

    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.capabilities.contains("STARTTLS")
    }

    /// Whether any fetch-pipeline command is currently outstanding.
    #[must_use]
    pub fn fetch_in_flight(&self) -> bool {
        self.tags.values().any(|t| matches!(t.kind, TagKind::AwaitFetch { .. }))
    }
}
