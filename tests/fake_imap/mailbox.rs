//! Test data model for the fake IMAP server
//!
//! Provides a builder-style API for constructing mailbox state:
//!
//! ```ignore
//! let mailbox = MailboxBuilder::new()
//!     .folder("INBOX")
//!         .email("Hello", "alice@example.com", "hi there")
//!         .email_flagged("Re: hello", "bob@example.com", "hi back", &["\\Seen"])
//!     .folder("Sent")
//!     .build();
//! ```
//!
//! The `Mailbox` is shared with the fake IMAP server via `Arc<Mutex<_>>`
//! so a test can append a message to the selected folder after the
//! session is already idling and observe it pushed through to a
//! subscriber.

/// A complete mailbox: a collection of named folders, each holding
/// zero or more test emails in sequence-number order (index 0 is
/// sequence number 1).
#[derive(Debug, Clone)]
pub struct Mailbox {
    pub folders: Vec<Folder>,
}

impl Mailbox {
    /// Look up a folder by name (case-sensitive, matching real IMAP).
    pub fn get_folder(&self, name: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.name == name)
    }

    pub fn get_folder_mut(&mut self, name: &str) -> Option<&mut Folder> {
        self.folders.iter_mut().find(|f| f.name == name)
    }
}

/// A single IMAP folder (e.g. "INBOX", "Sent", "Trash").
#[derive(Debug, Clone)]
pub struct Folder {
    pub name: String,
    pub messages: Vec<TestEmail>,
}

/// A test email stored in a folder. Rather than synthesizing a real
/// RFC 2822 message and handing it to a MIME parser, the fake server
/// builds `ENVELOPE`/`BODY`/`BODY[1]` responses directly from these
/// fields -- every test email is a single `TEXT/PLAIN` part.
#[derive(Debug, Clone)]
pub struct TestEmail {
    pub flags: Vec<String>,
    pub subject: String,
    pub from: String,
    pub body: String,
}

/// Builder for constructing a `Mailbox` step by step.
///
/// Call `.folder(name)` to start a new folder, then chain `.email(...)`
/// calls to add messages to it. Finish with `.build()`.
pub struct MailboxBuilder {
    folders: Vec<Folder>,
}

impl MailboxBuilder {
    pub fn new() -> Self {
        Self { folders: Vec::new() }
    }

    /// Add a new folder. Subsequent `.email()` calls add to this folder.
    pub fn folder(mut self, name: &str) -> Self {
        self.folders.push(Folder {
            name: name.to_string(),
            messages: Vec::new(),
        });
        self
    }

    /// Add an unflagged email to the most recently added folder.
    ///
    /// # Panics
    ///
    /// Panics if called before any `.folder()` call.
    pub fn email(self, subject: &str, from: &str, body: &str) -> Self {
        self.email_flagged(subject, from, body, &[])
    }

    /// Add an email carrying the given IMAP flags (e.g. `&["\\Seen"]`).
    ///
    /// # Panics
    ///
    /// Panics if called before any `.folder()` call.
    pub fn email_flagged(mut self, subject: &str, from: &str, body: &str, flags: &[&str]) -> Self {
        self.folders
            .last_mut()
            .expect("call .folder() before .email()")
            .messages
            .push(TestEmail {
                flags: flags.iter().map(|s| (*s).to_string()).collect(),
                subject: subject.to_string(),
                from: from.to_string(),
                body: body.to_string(),
            });
        self
    }

    /// Consume the builder and return the finished `Mailbox`.
    pub fn build(self) -> Mailbox {
        Mailbox { folders: self.folders }
    }
}
