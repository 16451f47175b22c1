// SPDX-License-Identifier: MIT OR Apache-2.0
//! Entry point dissection for shader fragments.
//!
//! Fragments are tokenized rather than pattern matched, so occurrences of the
//! entry point name inside comments, string literals, preprocessor lines or
//! nested scopes never confuse the parser or the renamer.

use crate::error::{Result, ShaderGraphError};
use crate::port::PortType;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Ident,
    Number,
    Literal,
    Punct(char),
}

#[derive(Debug, Clone)]
struct Token<'a> {
    kind: TokenKind,
    text: &'a str,
    span: Range<usize>,
}

impl Token<'_> {
    fn is_punct(&self, ch: char) -> bool {
        self.kind == TokenKind::Punct(ch)
    }

    fn is_ident(&self) -> bool {
        self.kind == TokenKind::Ident
    }
}

fn tokenize(source: &str) -> Vec<Token<'_>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
            i = line_end(bytes, i);
            continue;
        }
        if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i = source[i + 2..]
                .find("*/")
                .map_or(bytes.len(), |end| i + 2 + end + 2);
            continue;
        }
        if b == b'#' {
            i = directive_end(bytes, i);
            continue;
        }

        let start = i;
        let kind = if b == b'_' || b.is_ascii_alphabetic() {
            while i < bytes.len() && (bytes[i] == b'_' || bytes[i].is_ascii_alphanumeric()) {
                i += 1;
            }
            TokenKind::Ident
        } else if b.is_ascii_digit() || (b == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            i = number_end(bytes, i);
            TokenKind::Number
        } else if b == b'"' || b == b'\'' {
            i = literal_end(bytes, i);
            TokenKind::Literal
        } else {
            let ch = source[i..].chars().next().unwrap_or(char::REPLACEMENT_CHARACTER);
            i += ch.len_utf8();
            TokenKind::Punct(ch)
        };
        tokens.push(Token {
            kind,
            text: &source[start..i],
            span: start..i,
        });
    }

    tokens
}

fn line_end(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
    }
    i
}

// Preprocessor lines continue across a trailing backslash.
fn directive_end(bytes: &[u8], mut i: usize) -> usize {
    loop {
        i = line_end(bytes, i);
        let continued = bytes[..i].ends_with(b"\\") || bytes[..i].ends_with(b"\\\r");
        if !continued || i >= bytes.len() {
            return i;
        }
        i += 1;
    }
}

fn number_end(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() {
        let c = bytes[i];
        let exponent_sign = (c == b'+' || c == b'-') && matches!(bytes[i - 1], b'e' | b'E');
        if c.is_ascii_alphanumeric() || c == b'.' || c == b'_' || exponent_sign {
            i += 1;
        } else {
            break;
        }
    }
    i
}

fn literal_end(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            c if c == quote => return i + 1,
            b'\n' => return i,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Direction of a declared parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamQualifier {
    /// `in` or no qualifier
    In,
    /// `out`
    Out,
}

/// A parameter of the entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Declared direction
    pub qualifier: ParamQualifier,
    /// Declared type
    pub port_type: PortType,
    /// Declared name
    pub name: String,
    /// Default value expression, verbatim
    pub default_value: Option<String>,
}

/// The dissected entry point of a fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Return type, `None` for `void`
    pub return_type: Option<PortType>,
    /// Parameters in declaration order
    pub parameters: Vec<Parameter>,
    /// Byte range of the entry point's name in the fragment
    pub name_span: Range<usize>,
}

impl Signature {
    /// Find and parse the definition of `entry_point` in `source`
    pub fn dissect(source: &str, entry_point: &str) -> Result<Self> {
        let tokens = tokenize(source);
        let mut depth = 0usize;

        for (k, token) in tokens.iter().enumerate() {
            if token.is_punct('{') {
                depth += 1;
                continue;
            }
            if token.is_punct('}') {
                depth = depth.saturating_sub(1);
                continue;
            }
            if depth != 0 || !token.is_ident() || token.text != entry_point {
                continue;
            }
            let opens_call = tokens.get(k + 1).is_some_and(|t| t.is_punct('('));
            let has_type = k > 0 && tokens[k - 1].is_ident();
            if !opens_call || !has_type {
                continue;
            }

            let close = matching_paren(&tokens, k + 1).ok_or_else(|| {
                ShaderGraphError::MalformedSignature("unbalanced parentheses".to_string())
            })?;
            match tokens.get(close + 1) {
                // Prototype, keep looking for the definition.
                Some(t) if t.is_punct(';') => continue,
                Some(t) if t.is_punct('{') => {}
                Some(t) if t.is_punct(':') => {
                    let semantic = tokens.get(close + 2).map_or("", |t| t.text);
                    return Err(ShaderGraphError::SemanticNotAllowed(format!(
                        "{entry_point} : {semantic}"
                    )));
                }
                _ => {
                    return Err(ShaderGraphError::MalformedSignature(format!(
                        "expected function body after '{entry_point}(...)'"
                    )));
                }
            }

            let return_type = match tokens[k - 1].text {
                "void" => None,
                name => Some(name.parse::<PortType>()?),
            };
            let parameters = parse_parameters(source, &tokens[k + 2..close])?;
            return Ok(Self {
                return_type,
                parameters,
                name_span: token.span.clone(),
            });
        }

        Err(ShaderGraphError::EntryPointNotFound(entry_point.to_string()))
    }

    /// Copy of `source` with the entry point definition renamed
    pub fn rename_entry_point(&self, source: &str, new_name: &str) -> String {
        replace_span(source, &self.name_span, new_name)
    }
}

pub(crate) fn replace_span(source: &str, span: &Range<usize>, with: &str) -> String {
    let mut replaced = String::with_capacity(source.len() + with.len());
    replaced.push_str(&source[..span.start]);
    replaced.push_str(with);
    replaced.push_str(&source[span.end..]);
    replaced
}

fn matching_paren(tokens: &[Token<'_>], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        if token.is_punct('(') {
            depth += 1;
        } else if token.is_punct(')') {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

fn parse_parameters(source: &str, tokens: &[Token<'_>]) -> Result<Vec<Parameter>> {
    if tokens.is_empty() || (tokens.len() == 1 && tokens[0].text == "void") {
        return Ok(Vec::new());
    }

    let mut parameters = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::Punct('(' | '[' | '{') => depth += 1,
            TokenKind::Punct(')' | ']' | '}') => depth = depth.saturating_sub(1),
            TokenKind::Punct(',') if depth == 0 => {
                parameters.push(parse_parameter(source, &tokens[start..i])?);
                start = i + 1;
            }
            _ => {}
        }
    }
    parameters.push(parse_parameter(source, &tokens[start..])?);
    Ok(parameters)
}

fn parse_parameter(source: &str, tokens: &[Token<'_>]) -> Result<Parameter> {
    let malformed = |what: &str| {
        let text = match (tokens.first(), tokens.last()) {
            (Some(first), Some(last)) => &source[first.span.start..last.span.end],
            _ => "",
        };
        ShaderGraphError::MalformedSignature(format!("{what} in parameter '{text}'"))
    };

    let mut rest = tokens;
    let mut qualifier = ParamQualifier::In;
    let mut rejected = None;
    if let Some(first) = rest.first() {
        match first.text {
            "in" => qualifier = ParamQualifier::In,
            "out" => qualifier = ParamQualifier::Out,
            "inout" | "uniform" => rejected = Some(first.text),
            _ => {}
        }
        if first.text == "in" || first.text == "out" || rejected.is_some() {
            rest = &rest[1..];
        }
    }

    let (type_token, name_token) = match rest {
        [ty, name, ..] if ty.is_ident() && name.is_ident() => (ty, name),
        [] => return Err(malformed("empty declaration")),
        _ => return Err(malformed("expected type and name")),
    };
    let name = name_token.text.to_string();
    if let Some(qualifier) = rejected {
        return Err(ShaderGraphError::UnsupportedQualifier {
            qualifier: qualifier.to_string(),
            parameter: name,
        });
    }
    let port_type = type_token.text.parse::<PortType>()?;

    let default_value = match &rest[2..] {
        [] => None,
        [colon, semantic, ..] if colon.is_punct(':') => {
            return Err(ShaderGraphError::SemanticNotAllowed(format!(
                "{name} : {}",
                semantic.text
            )));
        }
        [eq, value @ ..] if eq.is_punct('=') => {
            let (Some(first), Some(last)) = (value.first(), value.last()) else {
                return Err(malformed("missing default value"));
            };
            if qualifier == ParamQualifier::Out {
                return Err(malformed("default value on out parameter"));
            }
            Some(source[first.span.start..last.span.end].to_string())
        }
        _ => return Err(malformed("unexpected tokens")),
    };

    Ok(Parameter {
        qualifier,
        port_type,
        name,
        default_value,
    })
}
