//! Low-level token readers shared by the response parser and its
//! ENVELOPE/BODYSTRUCTURE sub-grammars.
//!
//! These are built on `nom`'s `complete` combinators rather than its
//! `streaming` ones: by the time a buffer reaches the parser, the
//! framer has already assembled one complete packet (literal bytes
//! included), so there is never a need to ask for more input
//! mid-token.

use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{tag, take, take_while1};
use nom::character::complete::{char, digit1};
use nom::combinator::{map, map_res, opt, value};
use nom::multi::many0;
use nom::sequence::delimited;

/// Greedy `[0-9]+`, parsed as `u32`.
pub fn number(input: &[u8]) -> IResult<&[u8], u32> {
    map_res(digit1, |digits: &[u8]| {
        std::str::from_utf8(digits)
            .unwrap_or_default()
            .parse::<u32>()
    })(input)
}

/// Zero or more spaces.
pub fn spaces0(input: &[u8]) -> IResult<&[u8], &[u8]> {
    nom::bytes::complete::take_while(|b| b == b' ')(input)
}

/// Exactly one space.
pub fn sp(input: &[u8]) -> IResult<&[u8], char> {
    char(' ')(input)
}

/// A quoted string: `"..."`, with `\"` and `\\` as the only escapes.
pub fn quoted(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    let (mut rest, _) = char('"')(input)?;
    let mut out = Vec::new();
    loop {
        match rest.first() {
            None => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    rest,
                    nom::error::ErrorKind::Eof,
                )));
            }
            Some(b'"') => {
                rest = &rest[1..];
                break;
            }
            Some(b'\\') if rest.len() > 1 && (rest[1] == b'"' || rest[1] == b'\\') => {
                out.push(rest[1]);
                rest = &rest[2..];
            }
            Some(&b) => {
                out.push(b);
                rest = &rest[1..];
            }
        }
    }
    Ok((rest, out))
}

/// A synchronizing literal `{N}\r\n` followed by exactly N raw bytes.
/// The framer guarantees those bytes are already present in the
/// buffer.
pub fn literal(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    let (rest, n) = delimited(char('{'), number, tag("}\r\n"))(input)?;
    let (rest, bytes) = take(n as usize)(rest)?;
    Ok((rest, bytes.to_vec()))
}

/// `NIL`, a quoted string, or a literal — `nstring` in RFC 3501
/// terms. Returns `None` for `NIL`.
pub fn nstring(input: &[u8]) -> IResult<&[u8], Option<Vec<u8>>> {
    alt((
        value(None, tag_no_case(b"NIL")),
        map(alt((quoted, literal)), Some),
    ))(input)
}

/// Case-insensitive literal tag match (IMAP keywords are
/// case-insensitive on the wire).
pub fn tag_no_case<'a>(expected: &'static [u8]) -> impl Fn(&'a [u8]) -> IResult<&'a [u8], &'a [u8]> {
    move |input: &'a [u8]| {
        if input.len() >= expected.len() && input[..expected.len()].eq_ignore_ascii_case(expected) {
            Ok((&input[expected.len()..], &input[..expected.len()]))
        } else {
            Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )))
        }
    }
}

/// An atom: a run of bytes with no space, parenthesis, or CR/LF.
pub fn atom(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while1(|b: u8| !matches!(b, b' ' | b'(' | b')' | b'\r' | b'\n' | b'"' | b'{'))(input)
}

/// An astring: a quoted string, literal, or bare atom.
pub fn astring(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    alt((quoted, literal, map(atom, <[u8]>::to_vec)))(input)
}

/// A parenthesized, space-separated, variable-length list, applying
/// `element` to each member until the closing `)`.
pub fn paren_list<'a, T>(
    element: impl Fn(&'a [u8]) -> IResult<&'a [u8], T>,
) -> impl Fn(&'a [u8]) -> IResult<&'a [u8], Vec<T>> {
    move |input: &'a [u8]| {
        let (rest, _) = char('(')(input)?;
        let (rest, _) = spaces0(rest)?;
        if let Ok((rest, _)) = char::<_, nom::error::Error<&[u8]>>(')')(rest) {
            return Ok((rest, Vec::new()));
        }
        let (rest, first) = element(rest)?;
        let mut items = vec![first];
        let (rest, tail) = many0(nom::sequence::preceded(sp, &element))(rest)?;
        items.extend(tail);
        let (rest, _) = char(')')(rest)?;
        Ok((rest, items))
    }
}

/// A single address inside an address-list: `(name adl mailbox host)`.
/// `NIL` for the whole parenthesized group is handled by the caller
/// (address *lists*, not single addresses, can be `NIL`).
pub fn address(input: &[u8]) -> IResult<&[u8], crate::message::Address> {
    let (rest, _) = char('(')(input)?;
    let (rest, name) = nstring(rest)?;
    let (rest, _) = sp(rest)?;
    let (rest, _adl) = nstring(rest)?;
    let (rest, _) = sp(rest)?;
    let (rest, mailbox) = nstring(rest)?;
    let (rest, _) = sp(rest)?;
    let (rest, host) = nstring(rest)?;
    let (rest, _) = char(')')(rest)?;

    let display_name = name.map(|b| String::from_utf8_lossy(&b).into_owned());
    let mailbox = mailbox.map(|b| String::from_utf8_lossy(&b).into_owned()).unwrap_or_default();
    let host = host.map(|b| String::from_utf8_lossy(&b).into_owned()).unwrap_or_default();
    Ok((rest, crate::message::Address::new(display_name, &mailbox, &host)))
}

/// An address list: `NIL` or `(address address ...)`.
pub fn address_list(input: &[u8]) -> IResult<&[u8], Vec<crate::message::Address>> {
    alt((value(Vec::new(), tag_no_case(b"NIL")), paren_list(address)))(input)
}

/// `opt` applied to a trailing space-prefixed element; used for
/// BODYSTRUCTURE extension fields the parser tolerates but ignores.
pub fn trailing<'a, T>(
    element: impl Fn(&'a [u8]) -> IResult<&'a [u8], T>,
) -> impl Fn(&'a [u8]) -> IResult<&'a [u8], Option<T>> {
    move |input: &'a [u8]| opt(nom::sequence::preceded(sp, &element))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_with_escapes() {
        let (rest, value) = quoted(br#""he said \"hi\"" rest"#).unwrap();
        assert_eq!(value, br#"he said "hi""#.to_vec());
        assert_eq!(rest, b" rest");
    }

    #[test]
    fn parses_literal() {
        let (rest, value) = literal(b"{5}\r\nhello more").unwrap();
        assert_eq!(value, b"hello".to_vec());
        assert_eq!(rest, b" more");
    }

    #[test]
    fn nstring_nil_is_none() {
        let (_, value) = nstring(b"NIL").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn parses_address_list() {
        let input = br#"(("Terry Gray" NIL "gray" "cac.washington.edu"))"#;
        let (_, addrs) = address_list(input).unwrap();
        assert_eq!(addrs.len(), 1);
        assert_eq!(addrs[0].email, "gray@cac.washington.edu");
        assert_eq!(addrs[0].display_name.as_deref(), Some("Terry Gray"));
    }

    #[test]
    fn nil_address_list_is_empty() {
        let (_, addrs) = address_list(b"NIL").unwrap();
        assert!(addrs.is_empty());
    }
}
