//! Tolerant parser for node `inputs` declarations.
//!
//! The catalog ships inputs as a source-code-like literal rather than as a
//! serialized document, e.g.
//!
//! ```text
//! [{ label: 'Model Name', name: 'modelName', type: 'options',
//!    options: [{ label: 'gpt-4o', name: 'gpt-4o' }], default: 'gpt-4o' }]
//! ```
//!
//! The parser first tries strict JSON. Otherwise it scans for top-level
//! `{...}` fragments, splits each into `key: value` entries and keeps what
//! it recognises. Fragments without a usable `name` and `type` are skipped.
//! Nothing in here returns an error to the caller.

use crate::descriptor::RawNodeDescriptor;
use crate::error::ParseError;
use crate::schema::{InputKind, InputSpec, NodeSchema};
use regex::Regex;
use serde_json::{Map, Number, Value as JsonValue};
use std::sync::LazyLock;
use tracing::{debug, warn};

static FIELD_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*['"`]?([A-Za-z_$][A-Za-z0-9_$]*)['"`]?\s*$"#).expect("valid key pattern")
});

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?\d+(\.\d+)?([eE][+-]?\d+)?$").expect("valid number pattern")
});

/// The inputs recovered from one declaration, plus what was skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseOutcome {
    pub inputs: Vec<InputSpec>,
    pub skipped: Vec<ParseError>,
}

/// Parses a descriptor into a schema.
///
/// On total failure the schema has no inputs and a warning is logged.
#[must_use]
pub fn parse_schema(descriptor: &RawNodeDescriptor) -> NodeSchema {
    let outcome = parse_inputs(&descriptor.inputs);

    for error in &outcome.skipped {
        debug!(node_type = %descriptor.name, %error, "skipped input fragment");
    }

    if outcome.inputs.is_empty() && !declares_nothing(&descriptor.inputs) {
        warn!(
            node_type = %descriptor.name,
            skipped = outcome.skipped.len(),
            "could not parse node inputs, schema shape unknown"
        );
    }

    NodeSchema::new(descriptor.name.clone(), outcome.inputs)
}

/// Extracts every recognisable input from a raw declaration.
#[must_use]
pub fn parse_inputs(raw: &str) -> ParseOutcome {
    let raw = raw.trim();
    let mut outcome = ParseOutcome::default();
    if raw.is_empty() {
        return outcome;
    }

    let field_sets: Vec<Map<String, JsonValue>> =
        match serde_json::from_str::<Vec<JsonValue>>(raw) {
            Ok(values) => values
                .into_iter()
                .filter_map(|value| match value {
                    JsonValue::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
            Err(_) => {
                let (fragments, errors) = split_fragments(raw);
                outcome.skipped.extend(errors);
                fragments.into_iter().map(fields_from_fragment).collect()
            }
        };

    for fields in field_sets {
        match spec_from_fields(&fields) {
            Ok(spec) => outcome.inputs.push(spec),
            Err(error) => outcome.skipped.push(error),
        }
    }

    outcome
}

fn declares_nothing(raw: &str) -> bool {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    compact.is_empty() || compact == "[]"
}

fn spec_from_fields(fields: &Map<String, JsonValue>) -> Result<InputSpec, ParseError> {
    let name = required_str(fields, "name")?;
    let kind = required_str(fields, "type")?;
    let label = fields
        .get("label")
        .and_then(JsonValue::as_str)
        .map_or_else(|| name.clone(), str::to_string);

    let mut spec = InputSpec::new(name, label, InputKind::parse(&kind));
    spec.optional = flag(fields, &["optional"]);
    spec.default_value = fields
        .get("default")
        .or_else(|| fields.get("defaultValue"))
        .cloned();
    spec.options = fields.get("options").and_then(option_names);
    spec.load_method = fields
        .get("loadMethod")
        .and_then(JsonValue::as_str)
        .map(str::to_string);
    spec.accepts_variable_ref = flag(fields, &["acceptVariable", "acceptsVariableRef"]);
    spec.is_additional_param = flag(fields, &["additionalParams", "isAdditionalParam"]);
    spec.step = fields.get("step").and_then(JsonValue::as_f64);
    spec.rows = fields
        .get("rows")
        .and_then(JsonValue::as_u64)
        .and_then(|rows| u32::try_from(rows).ok());

    Ok(spec)
}

fn required_str(fields: &Map<String, JsonValue>, field: &'static str) -> Result<String, ParseError> {
    match fields.get(field) {
        None | Some(JsonValue::Null) => Err(ParseError::MissingField { field }),
        Some(JsonValue::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(other) => Err(ParseError::InvalidValue {
            field: field.to_string(),
            value: other.to_string(),
        }),
    }
}

fn flag(fields: &Map<String, JsonValue>, keys: &[&str]) -> bool {
    keys.iter().any(|key| match fields.get(*key) {
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::String(s)) => s == "true",
        _ => false,
    })
}

fn option_names(value: &JsonValue) -> Option<Vec<String>> {
    let items = value.as_array()?;
    let names = items
        .iter()
        .filter_map(|item| match item {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Object(map) => map
                .get("name")
                .or_else(|| map.get("label"))
                .and_then(JsonValue::as_str)
                .map(str::to_string),
            _ => None,
        })
        .collect();
    Some(names)
}

/// Lexical scanner state shared by the splitting helpers.
#[derive(Default)]
struct Scanner {
    quote: Option<char>,
    escaped: bool,
}

impl Scanner {
    /// Feeds one character; returns true if it is outside any string literal.
    fn outside_string(&mut self, c: char) -> bool {
        if let Some(q) = self.quote {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == q {
                self.quote = None;
            }
            return false;
        }
        if matches!(c, '\'' | '"' | '`') {
            self.quote = Some(c);
            return false;
        }
        true
    }
}

/// Returns the top-level `{...}` fragments and any unterminated openings.
fn split_fragments(raw: &str) -> (Vec<&str>, Vec<ParseError>) {
    let mut scanner = Scanner::default();
    let mut fragments = Vec::new();
    let mut depth = 0usize;
    let mut start = None;

    for (i, c) in raw.char_indices() {
        if !scanner.outside_string(c) {
            continue;
        }
        match c {
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0
                    && let Some(s) = start.take()
                {
                    fragments.push(&raw[s..=i]);
                }
            }
            _ => {}
        }
    }

    let errors = match start {
        Some(offset) if depth > 0 => vec![ParseError::UnterminatedFragment { offset }],
        _ => Vec::new(),
    };
    (fragments, errors)
}

/// Byte offsets of `target` outside strings and nested brackets.
fn top_level_positions(text: &str, target: char) -> Vec<usize> {
    let mut scanner = Scanner::default();
    let mut depth = 0usize;
    let mut positions = Vec::new();

    for (i, c) in text.char_indices() {
        if !scanner.outside_string(c) {
            continue;
        }
        match c {
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => depth = depth.saturating_sub(1),
            _ if c == target && depth == 0 => positions.push(i),
            _ => {}
        }
    }
    positions
}

fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut last = 0;
    for pos in top_level_positions(text, separator) {
        parts.push(&text[last..pos]);
        last = pos + separator.len_utf8();
    }
    parts.push(&text[last..]);
    parts
}

fn fields_from_fragment(fragment: &str) -> Map<String, JsonValue> {
    let trimmed = fragment.trim();
    let body = trimmed
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(trimmed);

    let mut fields = Map::new();
    for entry in split_top_level(body, ',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let Some(&colon) = top_level_positions(entry, ':').first() else {
            debug!(entry, "input entry has no key");
            continue;
        };
        let Some(key) = FIELD_KEY
            .captures(&entry[..colon])
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
        else {
            debug!(entry, "input entry key not recognised");
            continue;
        };
        match parse_value(entry[colon + 1..].trim()) {
            Some(value) => {
                fields.insert(key, value);
            }
            None => debug!(field = %key, "input value not recognised"),
        }
    }
    fields
}

fn parse_value(text: &str) -> Option<JsonValue> {
    let first = text.chars().next()?;
    let last = text.chars().next_back()?;

    if matches!(first, '\'' | '"' | '`') && text.len() >= 2 && last == first {
        return Some(JsonValue::String(unescape(&text[1..text.len() - 1])));
    }

    match text {
        "true" => return Some(JsonValue::Bool(true)),
        "false" => return Some(JsonValue::Bool(false)),
        "null" => return Some(JsonValue::Null),
        _ => {}
    }

    if NUMBER.is_match(text) {
        if let Ok(int) = text.parse::<i64>() {
            return Some(JsonValue::Number(int.into()));
        }
        return text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(JsonValue::Number);
    }

    if first == '[' && last == ']' {
        let items = split_top_level(&text[1..text.len() - 1], ',')
            .into_iter()
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .filter_map(parse_value)
            .collect();
        return Some(JsonValue::Array(items));
    }

    if first == '{' && last == '}' {
        return Some(JsonValue::Object(fields_from_fragment(text)));
    }

    None
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
