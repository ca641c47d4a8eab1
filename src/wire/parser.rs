//! Top-level response parser: turns one complete packet (as produced
//! by [`super::framer::read_packet`]) into an ordered list of
//! [`Action`]s. Stateless — this module never touches a [`crate::
//! session::state::Session`].

use super::action::{Action, FetchAttr, Status};
use super::body::body;
use super::envelope::envelope;
use super::lex::{astring, nstring, number, paren_list, sp, spaces0};
use crate::error::ParseError;
use nom::IResult;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::char;

fn run<'a, T>(
    result: IResult<&'a [u8], T>,
    packet: &[u8],
    context: &str,
) -> Result<(&'a [u8], T), ParseError> {
    result.map(|(rest, v)| (rest, v)).map_err(|e| {
        let offset = match &e {
            nom::Err::Error(err) | nom::Err::Failure(err) => packet.len() - err.input.len(),
            nom::Err::Incomplete(_) => packet.len(),
        };
        ParseError::new(offset, context.to_string())
    })
}

fn trim_trailing_crlf(input: &[u8]) -> &[u8] {
    let mut end = input.len();
    if end >= 2 && &input[end - 2..] == b"\r\n" {
        end -= 2;
    } else if end >= 1 && input[end - 1] == b'\n' {
        end -= 1;
    }
    &input[..end]
}

fn uppercase_tokens(text: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(text)
        .split_whitespace()
        .map(str::to_uppercase)
        .collect()
}

/// Expand a COPYUID/UID set such as `4:7,9,12` into `[4,5,6,7,9,12]`.
/// Malformed input yields an empty set rather than a fatal error
/// (local recovery, per this crate's error handling design).
fn parse_uid_set(raw: &str) -> Vec<u32> {
    let mut out = Vec::new();
    for part in raw.split(',') {
        if let Some((a, b)) = part.split_once(':') {
            let (Ok(a), Ok(b)) = (a.parse::<u32>(), b.parse::<u32>()) else {
                return Vec::new();
            };
            if a > b {
                return Vec::new();
            }
            out.extend(a..=b);
        } else {
            let Ok(n) = part.parse::<u32>() else {
                return Vec::new();
            };
            out.push(n);
        }
    }
    out
}

fn flag_list(input: &[u8]) -> IResult<&[u8], Vec<String>> {
    paren_list(|i| super::lex::atom(i))(input)
        .map(|(rest, tokens)| (rest, tokens.into_iter().map(|t| String::from_utf8_lossy(t).to_uppercase()).collect()))
}

/// Parse a bracketed response code's body, e.g. the text between
/// `[` and `]` in `[PERMANENTFLAGS (\Deleted \Seen \*)]`, into a
/// recognized `Action` if possible.
fn parse_bracket_code(code: &[u8]) -> Option<Action> {
    let text = String::from_utf8_lossy(code);
    let mut parts = text.splitn(2, ' ');
    let keyword = parts.next().unwrap_or_default().to_uppercase();
    let rest = parts.next().unwrap_or_default();

    match keyword.as_str() {
        "PERMANENTFLAGS" => {
            let (_, flags) = flag_list(rest.trim().as_bytes()).ok()?;
            Some(Action::PermanentFlags(flags))
        }
        "UNSEEN" => rest.trim().parse::<u32>().ok().map(Action::Unseen),
        "UIDVALIDITY" => rest.trim().parse::<u32>().ok().map(Action::UidValidity),
        "UIDNEXT" => rest.trim().parse::<u32>().ok().map(Action::UidNext),
        "COPYUID" => {
            let mut tokens = rest.split_whitespace();
            let validity = tokens.next()?.parse::<u32>().ok()?;
            let src = parse_uid_set(tokens.next()?);
            let dst = parse_uid_set(tokens.next()?);
            Some(Action::CopyUid { validity, src, dst })
        }
        _ => None,
    }
}

/// Split `[code] trailing text` out of an untagged status's text.
/// Returns `None` if there is no leading bracket.
fn extract_bracket(text: &[u8]) -> Option<&[u8]> {
    if text.first() != Some(&b'[') {
        return None;
    }
    let close = text.iter().position(|&b| b == b']')?;
    Some(&text[1..close])
}

fn fetch_attr_name(input: &[u8]) -> IResult<&[u8], (Vec<u8>, Option<Vec<u32>>)> {
    let (rest, name) = take_while1(|b: u8| b.is_ascii_alphanumeric() || b == b'.')(input)?;
    if rest.first() == Some(&b'[') {
        let (rest, _) = char('[')(rest)?;
        let mut path = Vec::new();
        let mut r = rest;
        if r.first() != Some(&b']') {
            loop {
                let (r2, n) = number(r)?;
                path.push(n);
                r = r2;
                if r.first() == Some(&b'.') {
                    r = &r[1..];
                    continue;
                }
                break;
            }
        }
        let (r, _) = char(']')(r)?;
        // optional partial-fetch offset, e.g. "<0>" -- tolerated and ignored.
        let r = if r.first() == Some(&b'<') {
            match r.iter().position(|&b| b == b'>') {
                Some(end) => &r[end + 1..],
                None => r,
            }
        } else {
            r
        };
        Ok((r, (name.to_vec(), Some(path))))
    } else {
        Ok((rest, (name.to_vec(), None)))
    }
}

fn fetch_msg_att(input: &[u8], seq: u32, packet: &[u8]) -> Result<(&[u8], Vec<Action>), ParseError> {
    let (mut rest, _) = run(char('(')(input), packet, "expected '(' opening FETCH attribute list")?;
    let mut actions = Vec::new();

    loop {
        let (r, _) = run(spaces0(rest), packet, "skipping FETCH attribute separator")?;
        rest = r;
        if rest.first() == Some(&b')') {
            rest = &rest[1..];
            break;
        }
        let (r, (name, path)) = run(fetch_attr_name(rest), packet, "parsing FETCH attribute name")?;
        let name_upper = String::from_utf8_lossy(&name).to_uppercase();
        let (r, _) = run(sp(r), packet, "expected space after FETCH attribute name")?;

        let (r, attr) = match (name_upper.as_str(), &path) {
            ("FLAGS", None) => {
                let (r, flags) = run(flag_list(r), packet, "parsing FETCH FLAGS")?;
                (r, FetchAttr::Flags(flags))
            }
            ("UID", None) => {
                let (r, n) = run(number(r), packet, "parsing FETCH UID")?;
                (r, FetchAttr::Uid(n))
            }
            ("ENVELOPE", None) => {
                let (r, env) = run(envelope(r), packet, "parsing FETCH ENVELOPE")?;
                (r, FetchAttr::Envelope(Box::new(env)))
            }
            ("BODY" | "BODYSTRUCTURE", None) => {
                let (r, bs) = run(body(r), packet, "parsing FETCH BODY/BODYSTRUCTURE")?;
                (r, FetchAttr::Body(Box::new(bs)))
            }
            ("BODY", Some(path)) => {
                let normalized = if path.is_empty() { vec![1] } else { path.clone() };
                let (r, data) = run(nstring(r), packet, "parsing FETCH BODY[] content")?;
                (r, FetchAttr::BodyContent { path: normalized, data })
            }
            _ => {
                return Err(ParseError::new(
                    packet.len() - r.len(),
                    format!("unsupported FETCH attribute {name_upper}"),
                ));
            }
        };
        rest = r;
        actions.push(Action::Fetch { seq, attr });
    }

    Ok((rest, actions))
}

fn parse_untagged(rest: &[u8], packet: &[u8]) -> Result<Vec<Action>, ParseError> {
    // Status-coded untagged response: "(OK|NO|BAD|PREAUTH|BYE) <text>"
    if let Some(space_idx) = rest.iter().position(|&b| b == b' ') {
        if let Some(status) = Status::parse(&rest[..space_idx]) {
            let text = &rest[space_idx + 1..];
            let text = trim_trailing_crlf(text);
            if let Some(code) = extract_bracket(text) {
                if let Some(action) = parse_bracket_code(code) {
                    return Ok(vec![action]);
                }
                let full = String::from_utf8_lossy(text).into_owned();
                return Ok(vec![Action::UntaggedStatus { status, text: full }]);
            }
            return Ok(vec![Action::UntaggedStatus {
                status,
                text: String::from_utf8_lossy(text).into_owned(),
            }]);
        }
    } else if let Some(status) = Status::parse(trim_trailing_crlf(rest)) {
        return Ok(vec![Action::UntaggedStatus {
            status,
            text: String::new(),
        }]);
    }

    // Numeric-prefixed mailbox data: "<n> EXISTS|RECENT|EXPUNGE|FETCH ..."
    if rest.first().is_some_and(u8::is_ascii_digit) {
        let (r, n) = run(number(rest), packet, "parsing numeric mailbox-data prefix")?;
        let (r, _) = run(sp(r), packet, "expected space after number")?;
        let (r, keyword) = run(super::lex::atom(r), packet, "parsing mailbox-data keyword")?;
        return match String::from_utf8_lossy(keyword).to_uppercase().as_str() {
            "EXISTS" => Ok(vec![Action::Exists(n)]),
            "RECENT" => Ok(vec![Action::Recent(n)]),
            "EXPUNGE" => Ok(vec![Action::Expunge(n)]),
            "FETCH" => {
                let (r, _) = run(sp(r), packet, "expected space before FETCH attribute list")?;
                let (_, actions) = fetch_msg_att(r, n, packet)?;
                Ok(actions)
            }
            other => Ok(vec![Action::Unparsed {
                raw: format!("{n} {other}"),
            }]),
        };
    }

    // Keyword-prefixed mailbox data: CAPABILITY / FLAGS / LIST.
    let (r, keyword) = run(super::lex::atom(rest), packet, "parsing untagged keyword")?;
    let keyword_upper = String::from_utf8_lossy(keyword).to_uppercase();
    match keyword_upper.as_str() {
        "CAPABILITY" => {
            let (r, _) = run(sp(r), packet, "expected space after CAPABILITY")?;
            let tokens = uppercase_tokens(trim_trailing_crlf(r));
            Ok(vec![Action::Capabilities(tokens)])
        }
        "FLAGS" => {
            let (r, _) = run(sp(r), packet, "expected space after FLAGS")?;
            let (_, flags) = run(flag_list(r), packet, "parsing FLAGS list")?;
            Ok(vec![Action::ApplicableFlags(flags)])
        }
        "LIST" => {
            let (r, _) = run(sp(r), packet, "expected space after LIST")?;
            let (r, flags) = run(flag_list(r), packet, "parsing LIST flags")?;
            let (r, _) = run(sp(r), packet, "expected space after LIST flags")?;
            let (r, delim) = run(nstring(r), packet, "parsing LIST delimiter")?;
            let (r, _) = run(sp(r), packet, "expected space before LIST mailbox")?;
            let (_, mailbox) = run(astring(r), packet, "parsing LIST mailbox name")?;
            let delimiter = delim.and_then(|d| d.first().map(|&b| b as char));
            Ok(vec![Action::ListEntry {
                flags,
                delimiter,
                mailbox: String::from_utf8_lossy(&mailbox).into_owned(),
            }])
        }
        _ => Ok(vec![Action::Unparsed {
            raw: String::from_utf8_lossy(packet).into_owned(),
        }]),
    }
}

fn parse_tagged(packet: &[u8]) -> Result<Vec<Action>, ParseError> {
    let (r, tag_num) = run(number(packet), packet, "parsing tagged response tag")?;
    let (r, _) = run(sp(r), packet, "expected space after tag")?;
    let space_idx = r
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| ParseError::new(packet.len() - r.len(), "missing status keyword"))?;
    let status = Status::parse(&r[..space_idx])
        .ok_or_else(|| ParseError::new(packet.len() - r.len(), "unrecognized status keyword"))?;
    let text = trim_trailing_crlf(&r[space_idx + 1..]);
    Ok(vec![Action::TaggedResponse {
        tag: tag_num,
        status,
        text: String::from_utf8_lossy(text).into_owned(),
    }])
}

/// Parse one complete packet into its ordered actions.
pub fn parse_packet(packet: &[u8]) -> Result<Vec<Action>, ParseError> {
    if packet.starts_with(b"+") {
        return Ok(vec![Action::Continuation]);
    }
    if let Some(rest) = packet.strip_prefix(b"* ") {
        return parse_untagged(rest, packet);
    }
    if packet.first().is_some_and(u8::is_ascii_digit) {
        return parse_tagged(packet);
    }
    Err(ParseError::new(0, "packet begins with an unrecognized token"))
}
