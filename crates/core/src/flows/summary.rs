//! Human-readable recap shown on confirmation screens and persisted at completion.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::flows::graph::{is_option_id, FieldKind, FieldRole, FlowGraph, FormField};

pub const DATE_LABEL: &str = "Selected date";
pub const CHOICE_LABEL: &str = "You selected";
pub const EMPTY_SUMMARY: &str = "Request received";

/// Same session data and graph always yield the same lines in the same order.
pub fn build_summary(session: &Map<String, Value>, graph: &FlowGraph) -> Vec<String> {
    let mut emitted = HashSet::new();
    let mut lines = Vec::new();

    for field in graph.screens.iter().flat_map(|screen| screen.fields.iter()) {
        if emitted.contains(field.name.as_str()) {
            continue;
        }
        let Some(value) = session.get(&field.name) else {
            continue;
        };
        let Some(rendered) = render_value(value, field, graph) else {
            continue;
        };
        emitted.insert(field.name.as_str());
        lines.push(format!("{}: {rendered}", field_label(field)));
    }

    if lines.is_empty() {
        lines.push(EMPTY_SUMMARY.to_owned());
    }
    lines
}

fn field_label(field: &FormField) -> String {
    if let Some(label) = &field.label {
        return label.clone();
    }
    match field.kind {
        FieldKind::Date => DATE_LABEL.to_owned(),
        FieldKind::Choice => CHOICE_LABEL.to_owned(),
        FieldKind::Text => title_case(&field.name),
    }
}

fn render_value(value: &Value, field: &FormField, graph: &FlowGraph) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(flag) => Some(if *flag { "Yes" } else { "No" }.to_owned()),
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) => render_text(text, field, graph),
        Value::Array(items) => {
            let parts: Vec<String> =
                items.iter().filter_map(|item| render_value(item, field, graph)).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Object(_) => None,
    }
}

fn render_text(text: &str, field: &FormField, graph: &FlowGraph) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let option_shaped = match field.role {
        Some(FieldRole::Selector) => true,
        Some(FieldRole::Input) => false,
        None => is_option_id(text),
    };
    if !option_shaped {
        return Some(text.to_owned());
    }
    let entry = graph.option(text)?;
    Some(entry.value.clone().unwrap_or_else(|| text.to_owned()))
}

fn title_case(identifier: &str) -> String {
    identifier
        .split(['_', '-', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
