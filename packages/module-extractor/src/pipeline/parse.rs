//! Parsing model output into module records.
//!
//! Strict JSON first. On failure the text is repaired: markdown fences
//! are stripped, everything outside the outermost matched brackets is
//! cut, trailing commas are dropped. The parsed value is then coerced
//! into records, tolerating the shapes models commonly produce.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tracing::debug;

use crate::error::ParseError;
use crate::types::module::{ModuleRecord, SubmoduleValue, Submodules};

const NAME_KEYS: &[&str] = &["module", "Module", "name", "Name", "module_name", "title"];
const DESCRIPTION_KEYS: &[&str] = &["Description", "description", "desc", "summary"];
const SUBMODULE_KEYS: &[&str] = &["Submodules", "submodules", "sub_modules", "subModules", "children"];
const LIST_KEYS: &[&str] = &["modules", "Modules", "results", "data", "items"];

/// Parse a model response into a list of module records.
pub fn parse_module_list(output: &str) -> Result<Vec<ModuleRecord>, ParseError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(strict) => {
            debug!(error = %strict, "Strict parse failed, repairing model output");
            let repaired = repair(trimmed)?;
            serde_json::from_str(&repaired)?
        }
    };

    coerce_records(value)
}

/// Best-effort repair of almost-JSON text.
pub fn repair(text: &str) -> Result<String, ParseError> {
    let unfenced = strip_fences(text);
    let cut = outermost_brackets(unfenced).ok_or(ParseError::NoJson)?;
    Ok(strip_trailing_commas(cut))
}

fn fence_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```").ok())
        .as_ref()
}

/// Content of the first fenced block; an unclosed opening fence is dropped.
fn strip_fences(text: &str) -> &str {
    if let Some(inner) = fence_regex()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
    {
        return inner.as_str().trim();
    }
    match text.trim_start().strip_prefix("```") {
        Some(rest) => rest
            .split_once('\n')
            .map_or(rest, |(_, body)| body)
            .trim(),
        None => text,
    }
}

/// Slice from the first `[` or `{` to its matching close, skipping
/// brackets inside strings. Output cut short by the token limit has no
/// match; then the last closing bracket of the same kind is used.
fn outermost_brackets(text: &str) -> Option<&str> {
    let start = text.find(['[', '{'])?;
    let opener = text[start..].chars().next()?;
    let closer = if opener == '[' { ']' } else { '}' };

    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => stack.push(']'),
            '{' => stack.push('}'),
            ']' | '}' => {
                if stack.pop() != Some(c) {
                    break;
                }
                if stack.is_empty() {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    let end = text.rfind(closer)?;
    (end > start).then(|| &text[start..=end])
}

/// Drop commas directly followed (modulo whitespace) by `]` or `}`.
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            out.push(c);
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some(']') | Some('}')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Turn a parsed value into module records.
pub fn coerce_records(value: Value) -> Result<Vec<ModuleRecord>, ParseError> {
    match value {
        Value::Array(items) => {
            let total = items.len();
            let records: Vec<ModuleRecord> = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => coerce_record(map),
                    _ => None,
                })
                .collect();
            if total > 0 && records.is_empty() {
                return Err(ParseError::NotAModuleList);
            }
            if records.len() < total {
                debug!(total, kept = records.len(), "Dropped malformed module entries");
            }
            Ok(records)
        }
        Value::Object(mut map) => {
            if find_key(&map, NAME_KEYS).is_some() {
                return coerce_record(map).map(|r| vec![r]).ok_or(ParseError::NotAModuleList);
            }
            let key = LIST_KEYS
                .iter()
                .find(|k| map.get(**k).is_some_and(Value::is_array))
                .map(|k| k.to_string())
                .or_else(|| {
                    map.iter()
                        .find(|(_, v)| v.is_array())
                        .map(|(k, _)| k.clone())
                });
            match key.and_then(|k| map.remove(&k)) {
                Some(list) => coerce_records(list),
                None => Err(ParseError::NotAModuleList),
            }
        }
        _ => Err(ParseError::NotAModuleList),
    }
}

fn find_key<'k>(map: &Map<String, Value>, keys: &[&'k str]) -> Option<&'k str> {
    keys.iter().copied().find(|k| map.contains_key(*k))
}

fn take_first(map: &mut Map<String, Value>, keys: &[&str]) -> Option<Value> {
    let key = find_key(map, keys)?.to_string();
    map.remove(&key)
}

fn coerce_record(mut map: Map<String, Value>) -> Option<ModuleRecord> {
    let module = take_first(&mut map, NAME_KEYS).map(value_to_text)?;
    let module = module.trim().to_string();
    if module.is_empty() {
        return None;
    }
    let description = take_first(&mut map, DESCRIPTION_KEYS)
        .map(value_to_text)
        .unwrap_or_default();
    let submodules = take_first(&mut map, SUBMODULE_KEYS)
        .map(coerce_submodules)
        .unwrap_or_default();

    Some(ModuleRecord {
        module,
        description,
        submodules,
    })
}

/// The `Submodules` field: a mapping, or a list of names or
/// `{name, description}` objects.
fn coerce_submodules(value: Value) -> Submodules {
    match value {
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| (k, coerce_submodule_value(v)))
            .collect(),
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(name) => Some((name, SubmoduleValue::Text(String::new()))),
                Value::Object(map) => named_entry(map),
                _ => None,
            })
            .collect(),
        _ => Submodules::new(),
    }
}

fn coerce_submodule_value(value: Value) -> SubmoduleValue {
    match value {
        Value::Object(map) => SubmoduleValue::Nested(
            map.into_iter()
                .map(|(k, v)| (k, coerce_submodule_value(v)))
                .collect(),
        ),
        Value::Array(items) if items.iter().any(Value::is_object) => SubmoduleValue::Nested(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => named_entry(map),
                    Value::String(name) => Some((name, SubmoduleValue::Text(String::new()))),
                    _ => None,
                })
                .collect(),
        ),
        Value::Array(items) => SubmoduleValue::List(items.into_iter().map(value_to_text).collect()),
        other => SubmoduleValue::Text(value_to_text(other)),
    }
}

/// `{name, description, submodules?}` as a map entry.
fn named_entry(mut map: Map<String, Value>) -> Option<(String, SubmoduleValue)> {
    let name = take_first(&mut map, NAME_KEYS).map(value_to_text)?;
    let nested = take_first(&mut map, SUBMODULE_KEYS).map(coerce_submodules);
    let description = take_first(&mut map, DESCRIPTION_KEYS)
        .map(value_to_text)
        .unwrap_or_default();

    let value = match nested {
        Some(children) if !children.is_empty() => {
            let mut children = children;
            if !description.is_empty() {
                children.shift_insert(0, "Description".to_string(), SubmoduleValue::Text(description));
            }
            SubmoduleValue::Nested(children)
        }
        _ => SubmoduleValue::Text(description),
    };
    Some((name, value))
}

fn value_to_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
