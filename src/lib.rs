//! A client library for watching a single IMAP4rev1 mailbox: a
//! streaming response parser plus a persistent session that logs in,
//! selects one mailbox, and pushes newly observed messages to
//! in-process subscribers whose [`Filter`] accepts them.
//!
//! ```no_run
//! use imap_watch::{Config, Filter};
//!
//! # async fn run() -> imap_watch::Result<()> {
//! let config = Config::new("imap.example.com", "alice", "hunter2", "inbox-watcher");
//! let handle = imap_watch::start(config).await?;
//!
//! let (tx, mut rx) = tokio::sync::mpsc::channel(16);
//! handle.subscribe(Filter::accept_all(), tx).await?;
//!
//! while let Some(message) = rx.recv().await {
//!     println!("{:?}", message.subject);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

mod config;
mod decode;
mod error;
mod filter;
mod flag;
mod folder;
mod message;
mod session;
mod wire;

pub use config::{Config, SslVerify};
pub use error::{Error, ParseError, Result};
pub use filter::{Filter, FilterError};
pub use flag::Flag;
pub use folder::Folder;
pub use message::{Address, Body, BodyLeaf, BodyStructure, DeliveredMessage, Encoding, Envelope};
pub use session::state::ListEntry;
pub use session::SubscriberId;

use session::machine::ControlMsg;
use session::state::Session;
use session::transport::Connection;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

/// Connect, authenticate, and select the mailbox named in `config`,
/// then spawn the session's background task. Returns as soon as the
/// mailbox is selected; a [`Handle`] to it can be used immediately —
/// anything sent before the task's steady-state loop starts draining
/// its control channel simply waits there.
///
/// # Errors
///
/// Returns an error if `config` fails [`Config::validate`], if the
/// TCP connection or TLS handshake fails, or if the session ends
/// before the handshake through `SELECT` completes (e.g. a rejected
/// login).
pub async fn start(config: Config) -> Result<Handle> {
    config.validate()?;
    info!(server = %config.server, mailbox = %config.mailbox, "starting session");
    let transport = Connection::connect(&config).await?;
    let session = Session::new(transport, config);
    let (control_tx, control_rx) = mpsc::channel(32);
    let task = tokio::spawn(session::run(session, control_rx));
    Ok(Handle {
        control: control_tx,
        task: std::sync::Arc::new(task),
    })
}

/// A handle to a running session's background task. Cloning a handle
/// is cheap (it wraps a channel sender and a shared join handle) and
/// every clone talks to the same session.
#[derive(Clone)]
pub struct Handle {
    control: mpsc::Sender<ControlMsg>,
    task: std::sync::Arc<tokio::task::JoinHandle<()>>,
}

impl Handle {
    fn channel_closed() -> Error {
        Error::Protocol("session task has stopped".to_string())
    }

    /// Whether the background task has already ended, e.g. after
    /// [`Handle::stop`] or a fatal protocol error.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Subscribe `sink` to every delivered message `filter` accepts.
    /// Delivery is non-blocking: if `sink`'s channel is full, the
    /// message is dropped for this subscriber rather than stalling
    /// the session.
    pub async fn subscribe(
        &self,
        filter: Filter,
        sink: mpsc::Sender<DeliveredMessage>,
    ) -> Result<SubscriberId> {
        let (reply, reply_rx) = oneshot::channel();
        self.control
            .send(ControlMsg::Subscribe { filter, sink, reply })
            .await
            .map_err(|_| Self::channel_closed())?;
        reply_rx.await.map_err(|_| Self::channel_closed())
    }

    /// Remove a previously registered subscriber. A no-op if `id` is
    /// not currently registered (e.g. it was already removed).
    pub async fn unsubscribe(&self, id: SubscriberId) -> Result<()> {
        self.control
            .send(ControlMsg::Unsubscribe { id })
            .await
            .map_err(|_| Self::channel_closed())
    }

    /// The capabilities most recently advertised by the server (from
    /// the `CAPABILITY` issued right after login).
    pub async fn capabilities(&self) -> Result<Vec<String>> {
        let (reply, reply_rx) = oneshot::channel();
        self.control
            .send(ControlMsg::Capabilities { reply })
            .await
            .map_err(|_| Self::channel_closed())?;
        reply_rx.await.map_err(|_| Self::channel_closed())
    }

    /// Issue a `LIST reference pattern` and collect the matched
    /// mailboxes.
    pub async fn list(
        &self,
        reference: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Result<Vec<ListEntry>> {
        let (reply, reply_rx) = oneshot::channel();
        self.control
            .send(ControlMsg::List {
                reference: reference.into(),
                pattern: pattern.into(),
                reply,
            })
            .await
            .map_err(|_| Self::channel_closed())?;
        reply_rx.await.map_err(|_| Self::channel_closed())?
    }

    /// Log out and end the session. The background task exits after
    /// this; further calls on this (or any cloned) handle fail.
    pub async fn stop(&self) {
        let _ = self.control.send(ControlMsg::Stop).await;
    }
}
