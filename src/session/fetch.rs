//! The per-message fetch pipeline (§4.4): for each newly observed
//! sequence number, walk filter-attributes -> BODY+missing-metadata ->
//! `BODY.PEEK[path...]`, at most one stage command in flight per
//! session at a time, lowest sequence number first.

use crate::decode;
use crate::error::Result;
use crate::message::{Body, BodyLeaf, BodyStructure, DeliveredMessage};
use crate::session::dispatcher::send;
use crate::session::state::{FetchStage, Session, TagKind};
use std::collections::HashMap;

fn any_subscriber_could_still_accept(session: &Session, seq: u32) -> bool {
    session
        .unprocessed
        .get(&seq)
        .is_some_and(|msg| session.subscribers.iter().any(|s| s.filter.accepts(msg)))
}

/// Advance the lowest-sequence, not-yet-`Full` message by exactly one
/// stage, provided no fetch command is already outstanding. A no-op
/// when there is nothing to do.
pub async fn pump(session: &mut Session) -> Result<()> {
    if session.fetch_in_flight() {
        return Ok(());
    }
    let Some(seq) = session
        .unprocessed
        .iter()
        .find(|(_, m)| m.stage != FetchStage::Full)
        .map(|(seq, _)| *seq)
    else {
        return Ok(());
    };

    let needs_flags = session.subscribers.iter().any(|s| s.filter.needs_flags());
    let needs_envelope = session.subscribers.iter().any(|s| s.filter.needs_envelope());
    let stage = session.unprocessed[&seq].stage;

    match stage {
        FetchStage::None => {
            if needs_flags || needs_envelope {
                send_filter_fetch(session, seq, needs_flags, needs_envelope).await
            } else {
                send_prebody_fetch(session, seq).await
            }
        }
        FetchStage::Filter => {
            if any_subscriber_could_still_accept(session, seq) {
                send_prebody_fetch(session, seq).await
            } else {
                session.unprocessed.remove(&seq);
                Ok(())
            }
        }
        FetchStage::PreBody => send_full_fetch(session, seq).await,
        FetchStage::Full => unreachable!("filtered out by the search above"),
    }
}

async fn send_filter_fetch(
    session: &mut Session,
    seq: u32,
    needs_flags: bool,
    needs_envelope: bool,
) -> Result<()> {
    let msg = &session.unprocessed[&seq];
    let mut attrs = Vec::new();
    if needs_flags && msg.flags.is_none() {
        attrs.push("FLAGS");
    }
    if needs_envelope && msg.envelope.is_none() {
        attrs.push("ENVELOPE");
    }
    let cmd = format!("FETCH {seq} ({})", attrs.join(" "));
    send(
        session,
        &cmd,
        TagKind::AwaitFetch {
            seq,
            next_stage: FetchStage::Filter,
        },
    )
    .await?;
    Ok(())
}

async fn send_prebody_fetch(session: &mut Session, seq: u32) -> Result<()> {
    let msg = &session.unprocessed[&seq];
    let mut attrs = vec!["BODY"];
    if msg.flags.is_none() {
        attrs.push("FLAGS");
    }
    if msg.envelope.is_none() {
        attrs.push("ENVELOPE");
    }
    let cmd = format!("FETCH {seq} ({})", attrs.join(" "));
    send(
        session,
        &cmd,
        TagKind::AwaitFetch {
            seq,
            next_stage: FetchStage::PreBody,
        },
    )
    .await?;
    Ok(())
}

async fn send_full_fetch(session: &mut Session, seq: u32) -> Result<()> {
    let Some(body_structure) = &session.unprocessed[&seq].body_structure else {
        // PreBody is only reached once BODY has been fetched; a
        // missing structure here means the server never sent one.
        // Drop the entry rather than stall the pipeline forever.
        session.unprocessed.remove(&seq);
        return Ok(());
    };
    let paths = body_structure.leaf_paths();
    let parts: Vec<String> = paths.iter().map(|p| format!("BODY.PEEK[{p}]")).collect();
    let cmd = format!("FETCH {seq} ({})", parts.join(" "));
    send(
        session,
        &cmd,
        TagKind::AwaitFetch {
            seq,
            next_stage: FetchStage::Full,
        },
    )
    .await?;
    Ok(())
}

/// Called once the tagged `OK` for an `AwaitFetch` command arrives.
/// Advances the message's stage and, at `Full`, assembles and
/// delivers it to every subscriber whose filter accepts it.
pub fn complete_stage(session: &mut Session, seq: u32, next_stage: FetchStage) {
    let Some(msg) = session.unprocessed.get_mut(&seq) else {
        // Expunged while the fetch was in flight; the result is moot.
        return;
    };
    msg.stage = next_stage;

    if next_stage == FetchStage::Filter && !any_subscriber_could_still_accept(session, seq) {
        session.unprocessed.remove(&seq);
        return;
    }

    if next_stage == FetchStage::Full {
        deliver(session, seq);
    }
}

fn deliver(session: &mut Session, seq: u32) {
    let Some(msg) = session.unprocessed.remove(&seq) else {
        return;
    };
    let Some(body_structure) = msg.body_structure.clone() else {
        return;
    };

    let accepted: Vec<bool> = session
        .subscribers
        .iter()
        .map(|s| s.filter.accepts(&msg))
        .collect();
    if !accepted.iter().any(|a| *a) {
        return;
    }

    let body = assemble_body(&body_structure, &msg.parts);
    let envelope = msg.envelope.unwrap_or_default();
    let delivered = DeliveredMessage {
        seqnum: seq,
        flags: msg.flags.unwrap_or_default(),
        date: envelope.date,
        subject: envelope.subject,
        from: envelope.from,
        sender: envelope.sender,
        reply_to: envelope.reply_to,
        to: envelope.to,
        cc: envelope.cc,
        bcc: envelope.bcc,
        in_reply_to: envelope.in_reply_to,
        message_id: envelope.message_id,
        body,
    };

    for (subscriber, accept) in session.subscribers.iter().zip(accepted) {
        if accept {
            subscriber.try_deliver(&delivered);
        }
    }
}

/// Fold the flat `(path, bytes)` fetch results into a tree mirroring
/// `structure`, decoding each leaf per its declared transfer encoding.
/// A pure function, independently table-tested (§9 design notes).
fn assemble_body(structure: &BodyStructure, parts: &HashMap<Vec<u32>, Vec<u8>>) -> Body {
    assemble_at(structure, parts, &mut Vec::new())
}

fn assemble_at(
    structure: &BodyStructure,
    parts: &HashMap<Vec<u32>, Vec<u8>>,
    prefix: &mut Vec<u32>,
) -> Body {
    match structure {
        BodyStructure::Onepart {
            mime_type,
            mime_subtype,
            params,
            encoding,
            ..
        } => {
            let path = if prefix.is_empty() {
                vec![1]
            } else {
                prefix.clone()
            };
            let raw = parts.get(&path).cloned().unwrap_or_default();
            let bytes = decode::decode(&raw, encoding);
            Body::Leaf(BodyLeaf {
                mime_type: mime_type.clone(),
                mime_subtype: mime_subtype.clone(),
                params: params.clone(),
                bytes,
            })
        }
        BodyStructure::Multipart { children, .. } => {
            let mut out = Vec::with_capacity(children.len());
            for (i, child) in children.iter().enumerate() {
                prefix.push(u32::try_from(i + 1).unwrap_or(u32::MAX));
                out.push(assemble_at(child, parts, prefix));
                prefix.pop();
            }
            Body::Nested(out)
        }
    }
}
