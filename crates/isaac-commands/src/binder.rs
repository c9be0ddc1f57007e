//! Argument binding: parse an argument tail against a command's schema.
//!
//! Positional tokens fill required arguments first, then optional ones, in
//! schema order. `--name value`, `--name=value`, and bare `--flag` (for
//! booleans) bind by name. A lone `--` ends option parsing.

use std::collections::BTreeMap;

use isaac_types::DispatchError;
use serde::Serialize;

use crate::descriptor::CommandDescriptor;
use crate::manifest::{ArgSpec, ArgType};

/// A coerced argument value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ArgValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl std::fmt::Display for ArgValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgValue::String(s) => write!(f, "{s}"),
            ArgValue::Int(i) => write!(f, "{i}"),
            ArgValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Validated arguments keyed by name.
pub type BoundArgs = BTreeMap<String, ArgValue>;

/// Bind `tail` to the descriptor's argument schema.
///
/// Nothing is returned unless every argument validates.
pub fn bind(descriptor: &CommandDescriptor, tail: &str) -> Result<BoundArgs, DispatchError> {
    let schema = descriptor.args();
    let tokens = tokenize(tail);

    let mut raw: BTreeMap<&str, String> = BTreeMap::new();
    let mut positional: Vec<String> = Vec::new();
    let mut iter = tokens.into_iter().peekable();
    let mut options_done = false;

    while let Some(token) = iter.next() {
        if options_done || !token.starts_with("--") || token.len() == 2 {
            if token == "--" && !options_done {
                options_done = true;
            } else {
                positional.push(token);
            }
            continue;
        }

        let body = &token[2..];
        let (name, inline) = match body.split_once('=') {
            Some((n, v)) => (n, Some(v.to_string())),
            None => (body, None),
        };
        let spec = schema
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| invalid(name, "unknown option"))?;
        if raw.contains_key(spec.name.as_str()) {
            return Err(invalid(name, "given more than once"));
        }

        let value = match inline {
            Some(v) => v,
            None if spec.kind == ArgType::Bool => "true".to_string(),
            None => match iter.next_if(|next| !next.starts_with("--")) {
                Some(v) => v,
                None => return Err(invalid(name, "missing value")),
            },
        };
        raw.insert(spec.name.as_str(), value);
    }

    // Required arguments first, then optional, each in schema order.
    let open_slots = schema
        .iter()
        .filter(|s| s.required)
        .chain(schema.iter().filter(|s| !s.required))
        .filter(|s| !raw.contains_key(s.name.as_str()))
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>();
    let mut positional = positional.into_iter();
    for slot in open_slots {
        match positional.next() {
            Some(value) => {
                raw.insert(slot, value);
            }
            None => break,
        }
    }
    if let Some(extra) = positional.next() {
        return Err(invalid(&extra, "unexpected argument"));
    }

    let mut bound = BoundArgs::new();
    for spec in schema {
        match raw.remove(spec.name.as_str()) {
            Some(value) => {
                let coerced = coerce(descriptor, spec, value)?;
                bound.insert(spec.name.clone(), coerced);
            }
            None if spec.required => {
                return Err(invalid(&spec.name, "missing required argument"));
            }
            None => {}
        }
    }
    Ok(bound)
}

fn coerce(
    descriptor: &CommandDescriptor,
    spec: &ArgSpec,
    value: String,
) -> Result<ArgValue, DispatchError> {
    match spec.kind {
        ArgType::String => {
            if let Some(re) = descriptor.arg_pattern(&spec.name) {
                if !re.is_match(&value) {
                    return Err(invalid(
                        &spec.name,
                        &format!("'{value}' does not match pattern {}", spec.pattern.as_deref().unwrap_or_default()),
                    ));
                }
            }
            Ok(ArgValue::String(value))
        }
        ArgType::Int => value
            .parse::<i64>()
            .map(ArgValue::Int)
            .map_err(|_| invalid(&spec.name, &format!("expected an integer, got '{value}'"))),
        ArgType::Bool => parse_bool(&value)
            .map(ArgValue::Bool)
            .ok_or_else(|| invalid(&spec.name, &format!("expected a boolean, got '{value}'"))),
        ArgType::Enum => {
            if spec.values.iter().any(|v| v == &value) {
                Ok(ArgValue::String(value))
            } else {
                Err(invalid(
                    &spec.name,
                    &format!("'{value}' is not one of: {}", spec.values.join(", ")),
                ))
            }
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(field: &str, message: &str) -> DispatchError {
    DispatchError::Validation {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Split an argument tail into tokens.
///
/// Handles single quotes (literal), double quotes (with backslash escapes),
/// and backslash escapes outside quotes. An unterminated quote takes the
/// rest of the input.
pub fn tokenize(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut chars = input.chars().peekable();
    let mut current = String::new();
    let mut in_token = false;

    while let Some(ch) = chars.next() {
        match ch {
            c if c.is_whitespace() => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '"' => {
                in_token = true;
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                        }
                        '"' => break,
                        c => current.push(c),
                    }
                }
            }
            '\'' => {
                in_token = true;
                for c in chars.by_ref() {
                    if c == '\'' {
                        break;
                    }
                    current.push(c);
                }
            }
            '\\' => {
                in_token = true;
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }

    if in_token {
        args.push(current);
    }
    args
}

/// Split a line on unquoted `|` into pipeline stages.
pub fn split_pipeline(input: &str) -> Vec<String> {
    let mut stages = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match (ch, quote) {
            ('\\', _) => {
                current.push(ch);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ('"' | '\'', None) => {
                quote = Some(ch);
                current.push(ch);
            }
            (c, Some(q)) if c == q => {
                quote = None;
                current.push(ch);
            }
            ('|', None) => {
                stages.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    stages.push(current.trim().to_string());
    stages
}
