//! Boost template rendering
//!
//! Templates are credential JSON with `{{ name }}` placeholders. Substituted
//! values are escaped as JSON string contents, so a template stays valid
//! JSON whatever the data holds.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::types::{BrainError, Result};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Substitute every `{{ name }}` with the escaped value of `data[name]`.
///
/// Missing and null values render as the empty string.
pub fn render(template: &str, data: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };

        let raw = &after_open[..end];
        out.push_str(&rest[..start]);

        if raw.is_empty() {
            // `{{}}` is not a variable; keep it as written
            out.push_str(OPEN);
            out.push_str(CLOSE);
        } else {
            out.push_str(&escape_value(data.get(raw.trim())));
        }

        rest = &after_open[end + CLOSE.len()..];
    }

    out.push_str(rest);
    out
}

/// Whether the template contains at least one `{{…}}` variable
pub fn has_variables(template: &str) -> bool {
    let mut rest = template;
    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        match after_open.find(CLOSE) {
            Some(0) => rest = &after_open[CLOSE.len()..],
            Some(_) => return true,
            None => return false,
        }
    }
    false
}

/// Strictly parse a rendered template
pub fn parse<T: DeserializeOwned>(rendered: &str) -> Result<T> {
    serde_json::from_str(rendered).map_err(|e| BrainError::TemplateParse(e.to_string()))
}

/// Render and parse in one step, skipping rendering when there is nothing to substitute
pub fn render_json(template: &str, data: &Map<String, Value>) -> Result<Value> {
    if has_variables(template) {
        parse(&render(template, data))
    } else {
        parse(template)
    }
}

fn escape_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => escape_str(s),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => escape_str(&other.to_string()),
    }
}

/// JSON string escaping without the surrounding quotes
fn escape_str(s: &str) -> String {
    let quoted = Value::String(s.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}
