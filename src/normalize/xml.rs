//! # Driver XML Document Parser
//!
//! The link driver renders the telegrams of a `get` request as an XML document
//! (`<MBusData>` with `<SlaveInformation>` and one `<DataRecord>` per record).
//! This module parses such documents into a generic [`XmlElement`] tree using
//! `nom`, so the normalization rules can be written against a plain data
//! structure.
//!
//! Supported: the XML declaration and other processing instructions, comments,
//! a simple `DOCTYPE`, CDATA sections, single and double quoted attributes and
//! the predefined and numeric character entities.

use crate::constants::MBUS_MAX_XML_DEPTH;
use crate::error::MBusError;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{char, multispace0, multispace1, satisfy},
    combinator::{cut, eof, map, map_res, opt, recognize, value},
    error::ErrorKind,
    multi::many0,
    sequence::{delimited, pair, preceded, separated_pair, tuple},
    IResult,
};
use std::borrow::Cow;

/// One element of a parsed document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    /// Attributes in document order, entities decoded
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order
    pub children: Vec<XmlElement>,
    /// All character data directly inside this element, concatenated
    pub text: String,
}

impl XmlElement {
    /// First child with the given name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

enum Node {
    Element(XmlElement),
    Text(String),
    Ignored,
}

/// Parse a complete document and return its root element.
pub fn parse_document(text: &str) -> Result<XmlElement, MBusError> {
    match document(text) {
        Ok((_, root)) => Ok(root),
        Err(nom::Err::Failure(e)) if e.code == ErrorKind::TooLarge => Err(
            MBusError::XmlParseFailure(format!("nesting deeper than {MBUS_MAX_XML_DEPTH}")),
        ),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(MBusError::XmlParseFailure(describe(text, e.input, e.code)))
        }
        Err(nom::Err::Incomplete(_)) => Err(MBusError::XmlParseFailure(
            "unexpected end of document".to_string(),
        )),
    }
}

fn describe(text: &str, remaining: &str, code: ErrorKind) -> String {
    if remaining.trim().is_empty() {
        return "unexpected end of document".to_string();
    }
    let consumed = &text[..text.len() - remaining.len()];
    let line = consumed.matches('\n').count() + 1;
    let column = consumed.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    format!(
        "unexpected input at line {line}, column {column} ({})",
        code.description()
    )
}

/// Replace the predefined and numeric character references in `raw`.
pub fn decode_entities(raw: &str) -> Result<Cow<'_, str>, String> {
    if !raw.contains('&') {
        return Ok(Cow::Borrowed(raw));
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let end = after
            .find(';')
            .ok_or_else(|| format!("unterminated entity in [{raw}]"))?;
        let entity = &after[..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .map(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').map(|dec| dec.parse::<u32>().ok()))
                .flatten()
                .and_then(char::from_u32),
        };
        out.push(decoded.ok_or_else(|| format!("unknown entity &{entity};"))?);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(Cow::Owned(out))
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == ':'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.')
}

fn name(input: &str) -> IResult<&str, &str> {
    recognize(pair(satisfy(is_name_start), take_while(is_name_char)))(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
    ))(input)
}

fn attribute(input: &str) -> IResult<&str, (String, String)> {
    map_res(
        separated_pair(name, tuple((multispace0, char('='), multispace0)), quoted),
        |(key, raw)| decode_entities(raw).map(|value| (key.to_string(), value.into_owned())),
    )(input)
}

fn comment(input: &str) -> IResult<&str, &str> {
    delimited(tag("<!--"), take_until("-->"), tag("-->"))(input)
}

fn processing_instruction(input: &str) -> IResult<&str, &str> {
    delimited(tag("<?"), take_until("?>"), tag("?>"))(input)
}

fn cdata(input: &str) -> IResult<&str, &str> {
    delimited(tag("<![CDATA["), take_until("]]>"), tag("]]>"))(input)
}

fn doctype(input: &str) -> IResult<&str, &str> {
    delimited(tag("<!DOCTYPE"), take_until(">"), char('>'))(input)
}

fn char_data(input: &str) -> IResult<&str, String> {
    map_res(take_while1(|c| c != '<'), |raw| {
        decode_entities(raw).map(Cow::into_owned)
    })(input)
}

/// Whitespace, comments and processing instructions outside the root element
fn misc(input: &str) -> IResult<&str, ()> {
    value((), alt((multispace1, comment, processing_instruction)))(input)
}

fn start_tag(input: &str) -> IResult<&str, (&str, Vec<(String, String)>, bool)> {
    let (input, _) = char('<')(input)?;
    let (input, tag_name) = name(input)?;
    let (input, attributes) = many0(preceded(multispace1, attribute))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, self_closing) = alt((value(true, tag("/>")), value(false, tag(">"))))(input)?;
    Ok((input, (tag_name, attributes, self_closing)))
}

fn end_tag(input: &str) -> IResult<&str, &str> {
    delimited(tag("</"), name, preceded(multispace0, char('>')))(input)
}

fn content(input: &str, depth: usize) -> IResult<&str, Node> {
    alt((
        map(comment, |_| Node::Ignored),
        map(cdata, |text: &str| Node::Text(text.to_string())),
        map(processing_instruction, |_| Node::Ignored),
        map(|i| element(i, depth), Node::Element),
        map(char_data, Node::Text),
    ))(input)
}

/// One element and its content; `depth` counts the enclosing elements.
fn element(input: &str, depth: usize) -> IResult<&str, XmlElement> {
    let (mut input, (tag_name, attributes, self_closing)) = start_tag(input)?;
    if depth >= MBUS_MAX_XML_DEPTH {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }
    let mut element = XmlElement {
        name: tag_name.to_string(),
        attributes,
        ..Default::default()
    };
    if self_closing {
        return Ok((input, element));
    }

    loop {
        if let Ok((rest, closing)) = end_tag(input) {
            if closing != tag_name {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    input,
                    ErrorKind::Tag,
                )));
            }
            return Ok((rest, element));
        }

        let (rest, node) = cut(|i| content(i, depth + 1))(input)?;
        match node {
            Node::Element(child) => element.children.push(child),
            Node::Text(text) => element.text.push_str(&text),
            Node::Ignored => {}
        }
        input = rest;
    }
}

fn document(input: &str) -> IResult<&str, XmlElement> {
    let (input, _) = opt(char('\u{feff}'))(input)?;
    let (input, _) = many0(alt((misc, value((), doctype))))(input)?;
    let (input, root) = element(input, 0)?;
    let (input, _) = many0(misc)(input)?;
    let (input, _) = eof(input)?;
    Ok((input, root))
}
