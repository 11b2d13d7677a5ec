//! A parser for the XML subset GraphML files use: an optional prolog,
//! comments, processing instructions, elements with quoted attributes,
//! character data, CDATA sections and the predefined and numeric entities.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{all_consuming, cut, map, map_res, value},
    error::{context, convert_error, ContextError, ErrorKind, ParseError, VerboseError},
    multi::many0,
    sequence::{delimited, preceded, terminated, tuple},
    IResult,
};

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// Elements nested deeper than this are rejected.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// The name without any namespace prefix.
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    pub fn elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |e| e.local_name() == name)
    }

    /// Concatenated character data of the direct children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                XmlNode::Text(text) => Some(text.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }
}

pub fn parse_document(input: &str) -> Result<XmlElement, String> {
    let input = input.trim_start_matches('\u{feff}');
    match all_consuming(delimited(misc, |i| element(i, 0), misc))(input) {
        Ok((_, root)) => Ok(root),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(convert_error(input, e)),
        Err(nom::Err::Incomplete(_)) => Err("incomplete input".to_string()),
    }
}

fn name(input: &str) -> Res<&str> {
    take_while1(|c: char| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))(input)
}

fn comment(input: &str) -> Res<()> {
    value((), tuple((tag("<!--"), take_until("-->"), tag("-->"))))(input)
}

fn processing_instruction(input: &str) -> Res<()> {
    value((), tuple((tag("<?"), take_until("?>"), tag("?>"))))(input)
}

fn doctype(input: &str) -> Res<()> {
    value((), tuple((tag("<!DOCTYPE"), take_until(">"), char('>'))))(input)
}

fn cdata(input: &str) -> Res<&str> {
    delimited(tag("<![CDATA["), take_until("]]>"), tag("]]>"))(input)
}

/// Whitespace, comments and declarations around the root element.
fn misc(input: &str) -> Res<()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            comment,
            processing_instruction,
            doctype,
        ))),
    )(input)
}

fn quoted(input: &str) -> Res<String> {
    alt((
        delimited(char('"'), map_res(take_while(|c: char| c != '"'), unescape), char('"')),
        delimited(char('\''), map_res(take_while(|c: char| c != '\''), unescape), char('\'')),
    ))(input)
}

fn attribute(input: &str) -> Res<(String, String)> {
    let (input, _) = multispace1(input)?;
    let (input, key) = name(input)?;
    let (input, _) = tuple((multispace0, char('='), multispace0))(input)?;
    let (input, value) = context("attribute value", cut(quoted))(input)?;
    Ok((input, (key.to_string(), value)))
}

fn content(input: &str, depth: usize) -> Res<Option<XmlNode>> {
    alt((
        map(comment, |_| None),
        map(processing_instruction, |_| None),
        map(cdata, |text| Some(XmlNode::Text(text.to_string()))),
        map(|i| element(i, depth), |e| Some(XmlNode::Element(e))),
        map(map_res(take_while1(|c: char| c != '<'), unescape), |text| {
            Some(XmlNode::Text(text))
        }),
    ))(input)
}

fn element(input: &str, depth: usize) -> Res<XmlElement> {
    let (input, _) = char('<')(input)?;
    let (input, tag_name) = name(input)?;
    if depth >= MAX_DEPTH {
        let error = VerboseError::from_error_kind(input, ErrorKind::TooLarge);
        return Err(nom::Err::Failure(VerboseError::add_context(
            input,
            "element nesting too deep",
            error,
        )));
    }
    let (input, attributes) = many0(attribute)(input)?;
    let (input, _) = multispace0(input)?;

    let mut element = XmlElement {
        name: tag_name.to_string(),
        attributes,
        children: Vec::new(),
    };
    if let Ok((rest, _)) = tag::<_, _, VerboseError<&str>>("/>")(input) {
        return Ok((rest, element));
    }

    let (input, _) = context("start tag", cut(char('>')))(input)?;
    let (input, children) = many0(|i| content(i, depth + 1))(input)?;
    let (input, _) = context("closing tag", cut(tag("</")))(input)?;
    let (rest, closing) = cut(terminated(name, preceded(multispace0, char('>'))))(input)?;
    if closing != tag_name {
        let error = VerboseError::from_error_kind(input, ErrorKind::Verify);
        return Err(nom::Err::Failure(VerboseError::add_context(
            input,
            "matching closing tag",
            error,
        )));
    }

    element.children = children.into_iter().flatten().collect();
    Ok((rest, element))
}

/// Replace `&lt;`, `&gt;`, `&amp;`, `&quot;`, `&apos;` and `&#...;` references.
fn unescape(text: &str) -> Result<String, String> {
    if !text.contains('&') {
        return Ok(text.to_string());
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find(';')
            .ok_or_else(|| format!("unterminated entity in '{text}'"))?;
        let entity = &after[..end];
        let ch = match entity {
            "lt" => '<',
            "gt" => '>',
            "amp" => '&',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32)
                    .ok_or_else(|| format!("unknown entity '&{entity};'"))?
            }
        };
        out.push(ch);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
