use std::fmt;

use super::SegmentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    LessOrEqual,
    GreaterOrEqual,
    Less,
    Greater,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
}

impl Operator {
    /// Longest tokens first so `<=` wins over `<`.
    const TOKENS: [(&'static str, Operator); 10] = [
        ("==", Operator::Equals),
        ("!=", Operator::NotEquals),
        ("<=", Operator::LessOrEqual),
        (">=", Operator::GreaterOrEqual),
        ("=@", Operator::Contains),
        ("!@", Operator::NotContains),
        ("=^", Operator::StartsWith),
        ("=$", Operator::EndsWith),
        ("<", Operator::Less),
        (">", Operator::Greater),
    ];

    pub fn token(&self) -> &'static str {
        Self::TOKENS
            .iter()
            .find(|(_, op)| op == self)
            .map(|(token, _)| *token)
            .unwrap_or("?")
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub dimension: String,
    pub op: Operator,
    pub value: String,
}

/// Conjunction of disjunctions: `a,b;c` is `(a OR b) AND c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentExpr {
    pub and_terms: Vec<Vec<Condition>>,
}

impl SegmentExpr {
    /// Parse a definition. Blank input yields `None`.
    pub fn parse(definition: &str) -> Result<Option<Self>, SegmentError> {
        if definition.trim().is_empty() {
            return Ok(None);
        }

        let mut and_terms = Vec::new();
        for and_part in split_unescaped(definition, ';') {
            let mut or_terms = Vec::new();
            for or_part in split_unescaped(&and_part, ',') {
                or_terms.push(parse_condition(&or_part)?);
            }
            and_terms.push(or_terms);
        }
        Ok(Some(Self { and_terms }))
    }
}

fn parse_condition(raw: &str) -> Result<Condition, SegmentError> {
    let malformed = || SegmentError::MalformedCondition(raw.to_string());
    let op_start = raw.find(['=', '!', '<', '>']).ok_or_else(malformed)?;
    let dimension = raw[..op_start].trim();
    if dimension.is_empty() || !dimension.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(malformed());
    }

    let rest = &raw[op_start..];
    let (token, op) = Operator::TOKENS
        .iter()
        .find(|(token, _)| rest.starts_with(token))
        .ok_or_else(malformed)?;

    Ok(Condition {
        dimension: dimension.to_string(),
        op: *op,
        value: unescape(&rest[token.len()..]),
    })
}

/// Split on `sep` unless it is preceded by a backslash. Escapes are kept so
/// nested splits still see them.
fn split_unescaped(input: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            current.push(c);
            if let Some(next) = chars.next() {
                current.push(next);
            }
        } else if c == sep {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
