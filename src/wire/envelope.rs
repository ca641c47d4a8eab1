//! The `ENVELOPE` sub-grammar: a fixed 10-field parenthesized list.

use super::lex::{address_list, nstring, sp};
use crate::message::Envelope;
use chrono::{DateTime, Utc};
use nom::IResult;
use nom::character::complete::char;

fn nstring_to_string(value: Option<Vec<u8>>) -> Option<String> {
    value.map(|b| String::from_utf8_lossy(&b).into_owned())
}

/// Parse an RFC 5322 date-time (as found in ENVELOPE's date field),
/// normalizing to UTC. Unparseable or absent input yields `None`
/// rather than a fatal error, per this crate's "local recovery"
/// policy for dates.
#[must_use]
pub fn parse_envelope_date(raw: &str) -> Option<DateTime<Utc>> {
    // Strip a trailing parenthetical remark such as "(PDT)", which
    // RFC 2822 permits but chrono's parser does not.
    let trimmed = raw.trim();
    let without_comment = match trimmed.rfind('(') {
        Some(idx) if trimmed.ends_with(')') => trimmed[..idx].trim_end(),
        _ => trimmed,
    };
    DateTime::parse_from_rfc2822(without_comment)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a complete `ENVELOPE (...)` body (without the `ENVELOPE`
/// keyword itself, which the caller strips).
pub fn envelope(input: &[u8]) -> IResult<&[u8], Envelope> {
    let (rest, _) = char('(')(input)?;
    let (rest, date) = nstring(rest)?;
    let (rest, _) = sp(rest)?;
    let (rest, subject) = nstring(rest)?;
    let (rest, _) = sp(rest)?;
    let (rest, from) = address_list(rest)?;
    let (rest, _) = sp(rest)?;
    let (rest, sender) = address_list(rest)?;
    let (rest, _) = sp(rest)?;
    let (rest, reply_to) = address_list(rest)?;
    let (rest, _) = sp(rest)?;
    let (rest, to) = address_list(rest)?;
    let (rest, _) = sp(rest)?;
    let (rest, cc) = address_list(rest)?;
    let (rest, _) = sp(rest)?;
    let (rest, bcc) = address_list(rest)?;
    let (rest, _) = sp(rest)?;
    let (rest, in_reply_to) = nstring(rest)?;
    let (rest, _) = sp(rest)?;
    let (rest, message_id) = nstring(rest)?;
    let (rest, _) = char(')')(rest)?;

    let date_str = nstring_to_string(date);
    let envelope = Envelope {
        date: date_str.as_deref().and_then(parse_envelope_date),
        subject: nstring_to_string(subject),
        from,
        sender,
        reply_to,
        to,
        cc,
        bcc,
        in_reply_to: nstring_to_string(in_reply_to),
        message_id: nstring_to_string(message_id),
    };
    Ok((rest, envelope))
}
