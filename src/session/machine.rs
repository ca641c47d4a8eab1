//! Connection lifecycle state machine (§4.3): Greeting ->
//! `UnauthCapability` -> [`STARTTLS` -> TLS] -> Login ->
//! `AuthCapability` -> Select -> Steady, then alternates between IDLE
//! (or NOOP polling) and draining the fetch pipeline.

use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::message::DeliveredMessage;
use crate::session::dispatcher::{quote_astring, send, send_raw};
use crate::session::fetch;
use crate::session::state::{
    Access, ListEntry, PartialMessage, PendingList, Phase, Session, TagKind,
};
use crate::session::subscriber::{Subscriber, SubscriberId};
use crate::wire::{self, Action, FetchAttr, Status};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const IDLE_TIMEOUT: Duration = Duration::from_secs(27 * 60);
const NOOP_INTERVAL: Duration = Duration::from_secs(5);

/// Messages a [`crate::Handle`] sends to the session task's inbox.
pub enum ControlMsg {
    Subscribe {
        filter: Filter,
        sink: mpsc::Sender<DeliveredMessage>,
        reply: oneshot::Sender<SubscriberId>,
    },
    Unsubscribe {
        id: SubscriberId,
    },
    Capabilities {
        reply: oneshot::Sender<Vec<String>>,
    },
    List {
        reference: String,
        pattern: String,
        reply: oneshot::Sender<Result<Vec<ListEntry>>>,
    },
    Stop,
}

/// Run one session to completion: negotiate the connection, then loop
/// until a control-channel `Stop`, a fatal protocol error, or the
/// transport closing.
pub async fn run(mut session: Session, mut control_rx: mpsc::Receiver<ControlMsg>) {
    if let Err(err) = negotiate(&mut session).await {
        error!(session = %session.config.name, "session negotiation failed: {err}");
        return;
    }

    if let Err(err) = steady_loop(&mut session, &mut control_rx).await {
        error!(session = %session.config.name, "session terminated: {err}");
    }
}

/// Greeting through Select: a strictly sequential handshake with no
/// concurrent control-channel handling (no subscriber could exist
/// yet — the caller only receives a [`crate::Handle`] after `start`
/// returns, and `start` returns only after this completes... actually
/// it returns immediately and this runs in the background, so any
/// `subscribe` issued before Select completes simply waits in the
/// channel until `steady_loop` starts draining it).
async fn negotiate(session: &mut Session) -> Result<()> {
    // Greeting: ignore content.
    let packet = wire::framer::read_packet(&mut session.transport)
        .await
        .map_err(Error::Io)?;
    let _ = wire::parse_packet(&packet)?;

    send(session, "CAPABILITY", TagKind::AwaitCapability).await?;
    await_tagged(session, TagKind::AwaitCapability).await?;

    if !session.transport.is_tls() && session.config.tls && session.supports_starttls() {
        send(session, "STARTTLS", TagKind::AwaitStarttls).await?;
        await_tagged(session, TagKind::AwaitStarttls).await?;
        let transport = std::mem::replace(&mut session.transport, crate::session::transport::Connection::Empty);
        session.transport = transport.upgrade_tls(&session.config).await?;
    } else if !session.transport.is_tls() && session.config.tls {
        return Err(Error::Protocol(
            "server did not advertise STARTTLS and implicit TLS was not used".to_string(),
        ));
    }

    let user = quote_astring(&session.config.username)?;
    let pass = quote_astring(&session.config.password)?;
    send(session, &format!("LOGIN {user} {pass}"), TagKind::AwaitLogin).await?;
    session.config.password.clear();
    await_tagged(session, TagKind::AwaitLogin).await?;
    session.phase = Phase::Authenticated;

    send(session, "CAPABILITY", TagKind::AwaitCapability).await?;
    await_tagged(session, TagKind::AwaitCapability).await?;

    let mailbox = quote_astring(&session.config.mailbox)?;
    // Installed before sending SELECT: the untagged mailbox data
    // (EXISTS, FLAGS, OK [UIDVALIDITY ...], ...) that precedes the
    // tagged completion needs somewhere to land.
    session.selected = Some(crate::session::state::MailboxSnapshot::default());
    send(session, &format!("SELECT {mailbox}"), TagKind::AwaitSelect).await?;
    await_tagged(session, TagKind::AwaitSelect).await?;

    info!(session = %session.config.name, mailbox = %session.config.mailbox, "session ready");
    Ok(())
}

/// Read and apply packets until the tagged response for `kind`
/// arrives with a status this lifecycle step accepts (`OK`, or
/// `PREAUTH` in place of `LOGIN`'s `OK`). Any other status is fatal,
/// per §7 ("on responses to lifecycle commands... fatal").
async fn await_tagged(session: &mut Session, kind: TagKind) -> Result<()> {
    loop {
        let packet = wire::framer::read_packet(&mut session.transport)
            .await
            .map_err(Error::Io)?;
        let actions = wire::parse_packet(&packet)?;
        for action in actions {
            if let Action::TaggedResponse { tag, status, text } = &action {
                if let Some(entry) = session.tags.get(tag) {
                    if entry.kind == kind {
                        session.tags.remove(tag);
                        return match status {
                            Status::Ok | Status::Preauth => {
                                apply_select_text(session, &kind, text);
                                Ok(())
                            }
                            _ => Err(Error::Protocol(format!(
                                "lifecycle command failed: {text}"
                            ))),
                        };
                    }
                }
            }
            apply_action(session, action)?;
        }
    }
}

/// Inspect a `SELECT` tagged response's text for `[READ-ONLY]`.
fn apply_select_text(session: &mut Session, kind: &TagKind, text: &str) {
    if matches!(kind, TagKind::AwaitSelect) {
        let access = if text.to_uppercase().contains("READ-ONLY") {
            Access::ReadOnly
        } else {
            Access::ReadWrite
        };
        session.phase = Phase::Selected(access);
    }
}

/// The Steady phase: alternate between IDLE (or a NOOP poll timer)
/// and draining the fetch pipeline, while servicing the control
/// channel (subscribe/unsubscribe/capabilities/list/stop).
async fn steady_loop(
    session: &mut Session,
    control_rx: &mut mpsc::Receiver<ControlMsg>,
) -> Result<()> {
    fetch::pump(session).await?;
    enter_idle_if_quiescent(session).await?;

    loop {
        // Computed up front as plain values so the `select!` branches
        // below never need to hold a borrow of `session` itself — only
        // of the specific field each branch actually touches.
        let idle_deadline = session.idle_deadline;
        let should_poll_noop = !session.idling
            && !session.supports_idle()
            && matches!(session.phase, Phase::Selected(_));

        tokio::select! {
            biased;

            msg = control_rx.recv() => {
                match msg {
                    None | Some(ControlMsg::Stop) => {
                        return shutdown(session).await;
                    }
                    Some(other) => {
                        handle_control(session, other).await?;
                        fetch::pump(session).await?;
                        enter_idle_if_quiescent(session).await?;
                    }
                }
            }

            () = async move {
                match idle_deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            } => {
                cancel_idle(session).await?;
            }

            () = async move {
                if should_poll_noop {
                    tokio::time::sleep(NOOP_INTERVAL).await;
                } else {
                    std::future::pending().await;
                }
            } => {
                send(session, "NOOP", TagKind::Generic).await?;
            }

            packet = wire::framer::read_packet(&mut session.transport) => {
                let packet = packet.map_err(Error::Io)?;
                let actions = wire::parse_packet(&packet)?;
                let grows_unprocessed = actions.iter().any(|a| matches!(a, Action::Exists(_)));
                if session.idling && grows_unprocessed {
                    cancel_idle(session).await?;
                }
                for action in actions {
                    apply_action(session, action)?;
                }
                fetch::pump(session).await?;
                enter_idle_if_quiescent(session).await?;
            }
        }
    }
}

/// Enter IDLE if the server supports it, nothing is in flight, and
/// there is no unprocessed work to drain first.
async fn enter_idle_if_quiescent(session: &mut Session) -> Result<()> {
    if session.idling
        || !session.supports_idle()
        || !session.tags.is_empty()
        || !session.unprocessed.is_empty()
        || !matches!(session.phase, Phase::Selected(_))
    {
        return Ok(());
    }
    send(session, "IDLE", TagKind::AwaitIdleDone).await?;
    session.idling = true;
    session.idle_deadline = Some(Instant::now() + IDLE_TIMEOUT);
    Ok(())
}

/// Write `DONE` to end the current IDLE period. The matching tagged
/// `OK` (or a `BAD ... Expected DONE`, per §7) is handled generically
/// in [`apply_action`] once it arrives.
async fn cancel_idle(session: &mut Session) -> Result<()> {
    session.idling = false;
    session.idle_deadline = None;
    send_raw(session, "DONE\r\n").await
}

async fn shutdown(session: &mut Session) -> Result<()> {
    if !matches!(session.phase, Phase::NotAuthenticated) {
        let _ = send(session, "LOGOUT", TagKind::Generic).await;
    }
    Ok(())
}

async fn handle_control(session: &mut Session, msg: ControlMsg) -> Result<()> {
    match msg {
        ControlMsg::Subscribe { filter, sink, reply } => {
            static NEXT_ID: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);
            let id = NEXT_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            session.subscribers.push(Subscriber {
                id,
                sink: sink.downgrade(),
                filter,
            });
            let _ = reply.send(id);
        }
        ControlMsg::Unsubscribe { id } => {
            session.subscribers.retain(|s| s.id != id);
        }
        ControlMsg::Capabilities { reply } => {
            let mut caps: Vec<String> = session.capabilities.iter().cloned().collect();
            caps.sort();
            let _ = reply.send(caps);
        }
        ControlMsg::List {
            reference,
            pattern,
            reply,
        } => {
            if session.idling {
                cancel_idle(session).await?;
                // The DONE's tagged OK will arrive before LIST's, so
                // list still resolves correctly once we send it below
                // — reading loop processes both tags in order.
            }
            let reference = quote_astring(&reference)?;
            let pattern = quote_astring(&pattern)?;
            send(session, &format!("LIST {reference} {pattern}"), TagKind::AwaitList).await?;
            session.pending_list = Some(PendingList {
                reply,
                entries: Vec::new(),
            });
        }
        ControlMsg::Stop => unreachable!("handled by the caller before dispatch"),
    }
    Ok(())
}

/// Apply one parser [`Action`] to session state. Never performs I/O;
/// callers that need a follow-up command (e.g. completing a fetch
/// stage) issue it themselves once this returns.
#[allow(clippy::too_many_lines)]
fn apply_action(session: &mut Session, action: Action) -> Result<()> {
    match action {
        Action::Capabilities(caps) => {
            session.capabilities = caps.into_iter().collect();
        }
        Action::ApplicableFlags(flags) => {
            if let Some(snap) = &mut session.selected {
                snap.applicable_flags = flags;
            }
        }
        Action::PermanentFlags(flags) => {
            if let Some(snap) = &mut session.selected {
                snap.permanent_flags = flags;
            }
        }
        Action::Exists(n) => {
            let previous = session.selected.as_ref().map_or(0, |s| s.exists);
            if let Some(snap) = &mut session.selected {
                snap.exists = n;
            }
            for seq in (previous + 1)..=n {
                session
                    .unprocessed
                    .entry(seq)
                    .or_insert_with(|| PartialMessage::new(seq));
            }
        }
        Action::Recent(n) => {
            if let Some(snap) = &mut session.selected {
                snap.recent = n;
            }
        }
        Action::Expunge(seq) => {
            session.unprocessed.remove(&seq);
            let shifted: std::collections::BTreeMap<u32, PartialMessage> = session
                .unprocessed
                .split_off(&(seq + 1))
                .into_iter()
                .map(|(k, mut v)| {
                    v.seq = k - 1;
                    (k - 1, v)
                })
                .collect();
            session.unprocessed.retain(|k, _| *k < seq);
            session.unprocessed.extend(shifted);
            if let Some(snap) = &mut session.selected {
                snap.exists = snap.exists.saturating_sub(1);
            }
            // Renumber in-flight fetches the same way: the expunged
            // sequence's result is discarded, everything after it
            // shifts down by one.
            session
                .tags
                .retain(|_, entry| !matches!(entry.kind, TagKind::AwaitFetch { seq: s, .. } if s == seq));
            for entry in session.tags.values_mut() {
                if let TagKind::AwaitFetch { seq: s, .. } = &mut entry.kind {
                    if *s > seq {
                        *s -= 1;
                    }
                }
            }
        }
        Action::UidValidity(v) => {
            if let Some(snap) = &mut session.selected {
                snap.uid_validity = v;
            }
        }
        Action::UidNext(v) => {
            if let Some(snap) = &mut session.selected {
                snap.uid_next = v;
            }
        }
        Action::Unseen(v) => {
            if let Some(snap) = &mut session.selected {
                snap.first_unseen = Some(v);
            }
        }
        Action::ListEntry {
            flags,
            delimiter,
            mailbox,
        } => {
            if let Some(pending) = &mut session.pending_list {
                pending.entries.push(ListEntry {
                    name: mailbox,
                    delimiter,
                    flags,
                });
            }
        }
        Action::CopyUid { .. } => {}
        Action::UntaggedStatus { status, text } => {
            if matches!(status, Status::Bye) {
                return Err(Error::Protocol(format!("server sent BYE: {text}")));
            }
            debug!(?status, %text, "untagged status");
        }
        Action::Fetch { seq, attr } => apply_fetch_attr(session, seq, attr),
        Action::Continuation => {}
        Action::TaggedResponse { tag, status, text } => {
            handle_tagged(session, tag, status, &text)?;
        }
        Action::Unparsed { raw } => {
            info!(%raw, "ignored unrecognized response shape");
        }
    }
    Ok(())
}

fn apply_fetch_attr(session: &mut Session, seq: u32, attr: FetchAttr) {
    let Some(msg) = session.unprocessed.get_mut(&seq) else {
        // The server may push updates for an already-processed
        // sequence number; ignore it.
        return;
    };
    match attr {
        FetchAttr::Flags(flags) => {
            msg.flags = Some(flags.iter().map(|f| crate::flag::Flag::from_imap_token(f)).collect());
        }
        FetchAttr::Uid(_) => {}
        FetchAttr::Envelope(envelope) => msg.envelope = Some(*envelope),
        FetchAttr::Body(structure) => msg.body_structure = Some(*structure),
        FetchAttr::BodyContent { path, data } => {
            msg.parts.insert(path, data.unwrap_or_default());
        }
    }
}

fn handle_tagged(session: &mut Session, tag: u32, status: Status, text: &str) -> Result<()> {
    let Some(entry) = session.tags.remove(&tag) else {
        warn!(tag, "tagged response for an unknown tag, ignoring");
        return Ok(());
    };

    match entry.kind {
        TagKind::AwaitFetch { seq, next_stage } => {
            if matches!(status, Status::Ok) {
                fetch::complete_stage(session, seq, next_stage);
            }
        }
        TagKind::AwaitList => {
            if let Some(pending) = session.pending_list.take() {
                let result = match status {
                    Status::Ok => Ok(pending.entries),
                    _ => Err(Error::Protocol(format!("LIST failed: {text}"))),
                };
                let _ = pending.reply.send(result);
            }
        }
        TagKind::AwaitIdleDone => {
            let cancel_ack = matches!(status, Status::Ok)
                || (matches!(status, Status::Bad) && text.to_lowercase().contains("expected done"));
            if !cancel_ack {
                return Err(Error::Protocol(format!("IDLE failed: {text}")));
            }
            session.idling = false;
            session.idle_deadline = None;
        }
        TagKind::Generic => {
            if matches!(status, Status::Bad | Status::No) {
                debug!(tag, text, "user-requested command failed");
            }
        }
        TagKind::AwaitCapability
        | TagKind::AwaitStarttls
        | TagKind::AwaitLogin
        | TagKind::AwaitSelect => {
            // Only reachable if a second tagged response arrives for
            // an already-consumed lifecycle tag; nothing to do.
        }
    }
    Ok(())
}
