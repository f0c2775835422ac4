//! # Template Patterns
//!
//! A string literal containing `{{ variable }}` placeholders is a template:
//! its value is computed by rendering the placeholders against the owning
//! instance. The variables referenced by a template are the implicit
//! dependencies of the property holding it.
//!
//! Placeholders accept dotted paths (`{{ origin.x }}`); the dependency is
//! the first segment, the rest is looked up in the rendered value.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_$][A-Za-z0-9_$\-]*(?:\.[A-Za-z0-9_$\-]+|\[\d+\])*)\s*\}\}")
            .unwrap_or_else(|e| unreachable!("placeholder regex is valid: {e}"))
    })
}

/// Whether `s` contains at least one placeholder.
pub fn is_template(s: &str) -> bool {
    placeholder().is_match(s)
}

/// Whether a JSON value is a template string.
pub fn is_template_value(v: &Value) -> bool {
    v.as_str().is_some_and(is_template)
}

/// Full placeholder paths in order of appearance (duplicates kept).
pub fn placeholders(s: &str) -> Vec<String> {
    placeholder()
        .captures_iter(s)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Root variable names referenced by the template.
pub fn variables(s: &str) -> BTreeSet<String> {
    placeholders(s)
        .into_iter()
        .map(|p| root_variable(&p).to_string())
        .collect()
}

/// `origin.x` → `origin`, `items[0].name` → `items`.
pub fn root_variable(path: &str) -> &str {
    let end = path.find(['.', '[']).unwrap_or(path.len());
    &path[..end]
}

/// Render a template.
///
/// `lookup` receives each full placeholder path and returns the value to
/// substitute; `None` renders as an empty string. Strings are inserted
/// without quotes, other values in their JSON form.
pub fn render<E>(
    template: &str,
    mut lookup: impl FnMut(&str) -> Result<Option<Value>, E>,
) -> Result<String, E> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in placeholder().captures_iter(template) {
        let (Some(whole), Some(path)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);
        match lookup(path.as_str())? {
            Some(Value::String(s)) => out.push_str(&s),
            Some(Value::Null) | None => {}
            Some(other) => out.push_str(&other.to_string()),
        }
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Drill into a value with the part of a placeholder path after its root.
///
/// `value_at(&json!({"x": [1, 2]}), "origin.x[1]")` gives `2`.
pub fn value_at<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    let root = root_variable(path);
    let mut cur = value;
    let mut rest = &path[root.len()..];
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            let end = after.find(['.', '[']).unwrap_or(after.len());
            cur = cur.get(&after[..end])?;
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']')?;
            let index: usize = after[..close].parse().ok()?;
            cur = cur.get(index)?;
            rest = &after[close + 1..];
        } else {
            return None;
        }
    }
    Some(cur)
}
