//! The `BODY`/`BODYSTRUCTURE` sub-grammar: a recursive onepart/
//! multipart tree, tolerant of the extension fields RFC 3501 permits
//! after the required ones (line counts, disposition, language,
//! location, MD5 — all ignored, "lax" mode in this crate's terms).

use super::lex::{astring, literal, nstring, quoted, sp, spaces0};
use crate::message::{BodyStructure, Encoding};
use nom::IResult;
use nom::character::complete::char;
use nom::combinator::value;
use std::collections::BTreeMap;

fn to_string(bytes: Vec<u8>) -> String {
    String::from_utf8_lossy(&bytes).into_owned()
}

fn nstring_string(input: &[u8]) -> IResult<&[u8], Option<String>> {
    let (rest, v) = nstring(input)?;
    Ok((rest, v.map(to_string)))
}

/// Consume one balanced parenthesized group, including both
/// delimiters. Used to skip BODYSTRUCTURE extension fields this
/// parser does not model.
fn skip_group(input: &[u8]) -> IResult<&[u8], ()> {
    let (mut rest, _) = char('(')(input)?;
    loop {
        let (r, _) = spaces0(rest)?;
        rest = r;
        match rest.first() {
            None => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    rest,
                    nom::error::ErrorKind::Eof,
                )));
            }
            Some(b')') => {
                rest = &rest[1..];
                return Ok((rest, ()));
            }
            Some(b'(') => {
                let (r, ()) = skip_group(rest)?;
                rest = r;
            }
            _ => {
                rest = skip_one_token(rest)?;
            }
        }
    }
}

fn skip_one_token(input: &[u8]) -> Result<&[u8], nom::Err<nom::error::Error<&[u8]>>> {
    if let Ok((r, _)) = literal(input) {
        return Ok(r);
    }
    if let Ok((r, _)) = quoted(input) {
        return Ok(r);
    }
    if let Ok((r, _)) = super::lex::atom(input) {
        return Ok(r);
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Satisfy,
    )))
}

/// Skip any trailing extension fields up to (but not including) the
/// group's closing `)`.
fn skip_extensions(input: &[u8]) -> IResult<&[u8], ()> {
    let mut rest = input;
    loop {
        let (r, _) = spaces0(rest)?;
        rest = r;
        match rest.first() {
            None => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    rest,
                    nom::error::ErrorKind::Eof,
                )));
            }
            Some(b')') => return Ok((rest, ())),
            Some(b'(') => {
                let (r, ()) = skip_group(rest)?;
                rest = r;
            }
            _ => {
                rest = skip_one_token(rest)?;
            }
        }
    }
}

fn params(input: &[u8]) -> IResult<&[u8], BTreeMap<String, String>> {
    if let Ok((rest, ())) = value((), super::lex::tag_no_case(b"NIL"))(input) {
        return Ok((rest, BTreeMap::new()));
    }
    let (mut rest, _) = char('(')(input)?;
    let mut map = BTreeMap::new();
    let (r, _) = spaces0(rest)?;
    rest = r;
    if rest.first() == Some(&b')') {
        return Ok((&rest[1..], map));
    }
    loop {
        let (r, key) = astring(rest)?;
        let (r, _) = sp(r)?;
        let (r, value) = astring(r)?;
        map.insert(to_string(key), to_string(value));
        rest = r;
        let (r, _) = spaces0(rest)?;
        rest = r;
        match rest.first() {
            Some(b')') => {
                rest = &rest[1..];
                break;
            }
            _ => continue,
        }
    }
    Ok((rest, map))
}

fn onepart_tail(input: &[u8]) -> IResult<&[u8], BodyStructure> {
    let (rest, mime_type) = astring(input)?;
    let (rest, _) = sp(rest)?;
    let (rest, mime_subtype) = astring(rest)?;
    let (rest, _) = sp(rest)?;
    let (rest, params) = params(rest)?;
    let (rest, _) = sp(rest)?;
    let (rest, content_id) = nstring_string(rest)?;
    let (rest, _) = sp(rest)?;
    let (rest, description) = nstring_string(rest)?;
    let (rest, _) = sp(rest)?;
    let (rest, encoding_tok) = astring(rest)?;
    let (rest, _) = sp(rest)?;
    let (rest, octets) = super::lex::number(rest)?;
    let (rest, ()) = skip_extensions(rest)?;
    let (rest, _) = char(')')(rest)?;

    Ok((
        rest,
        BodyStructure::Onepart {
            mime_type: to_string(mime_type),
            mime_subtype: to_string(mime_subtype),
            params,
            content_id,
            description,
            encoding: Encoding::from_token(&to_string(encoding_tok)),
            octets,
        },
    ))
}

fn multipart_tail(input: &[u8]) -> IResult<&[u8], BodyStructure> {
    let mut children = Vec::new();
    let mut rest = input;
    loop {
        let (r, child) = body(rest)?;
        children.push(child);
        rest = r;
        if rest.first() != Some(&b'(') {
            break;
        }
    }
    let (rest, _) = sp(rest)?;
    let (rest, subtype) = astring(rest)?;
    let (rest, ()) = skip_extensions(rest)?;
    let (rest, _) = char(')')(rest)?;

    Ok((
        rest,
        BodyStructure::Multipart {
            children,
            mime_subtype: to_string(subtype),
        },
    ))
}

/// Parse a complete `BODY (...)` or `BODYSTRUCTURE (...)` value
/// (without the keyword itself).
pub fn body(input: &[u8]) -> IResult<&[u8], BodyStructure> {
    let (rest, _) = char('(')(input)?;
    if rest.first() == Some(&b'(') {
        multipart_tail(rest)
    } else {
        onepart_tail(rest)
    }
}
