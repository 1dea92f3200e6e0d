//! Reference context handed to a downstream prompt generator.
//!
//! The context starts with the user's intent and the number of references,
//! followed by one numbered line per record that carries structured fields.
//! Records with only `raw` text keep their number but get no line.

use crate::types::Record;

/// List fields are cut to this many entries per line.
const MAX_LIST_ITEMS: usize = 3;

/// Formats `records` as a numbered reference list under `intent`.
pub fn build_context<'r, I>(intent: &str, records: I) -> String
where
    I: IntoIterator<Item = &'r Record>,
{
    let records: Vec<&Record> = records.into_iter().collect();
    let mut lines = vec![format!(
        "User intent: {intent}\n\nReferences ({} total):\n",
        records.len()
    )];

    for (i, record) in records.iter().enumerate() {
        if let Some(line) = describe(record) {
            lines.push(format!("{}. {line}", i + 1));
        }
    }

    lines.join("\n")
}

fn describe(record: &Record) -> Option<String> {
    if !record.has_structured_fields() {
        return None;
    }

    let mut parts = Vec::new();

    if let Some(subject) = record.subject.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("subject: {subject}"));
    }
    if let Some(style) = record.art_style.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("style: {style}"));
    }
    if let Some(elements) = list(&record.visual_elements) {
        parts.push(format!("elements: {elements}"));
    }
    if let Some(mood) = record.mood.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("mood: {mood}"));
    }
    if let Some(technical) = list(&record.technical) {
        parts.push(format!("technical: {technical}"));
    }

    Some(parts.join(", "))
}

fn list(field: &Option<Vec<String>>) -> Option<String> {
    field
        .as_deref()
        .filter(|items| !items.is_empty())
        .map(|items| {
            items
                .iter()
                .take(MAX_LIST_ITEMS)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(",")
        })
}
