//! Exemplar records and the text derived from them.

use serde::{Deserialize, Serialize};

/// A structured exemplar as stored in the corpus and the metadata store.
///
/// Every field is optional. Unknown fields are preserved so a record
/// round-trips through the metadata store unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub art_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_elements: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    /// Record carrying only raw text.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Some(raw.into()),
            ..Self::default()
        }
    }

    /// Exact identity key used when diffing a corpus against stored records.
    ///
    /// A missing `raw` is treated as the empty string.
    pub fn raw_key(&self) -> &str {
        self.raw.as_deref().unwrap_or("")
    }

    /// Fingerprint compared during near-duplicate suppression.
    pub fn fingerprint(&self) -> &str {
        self.raw_key().trim()
    }

    /// Text that gets embedded for this record.
    ///
    /// Present fields are joined with single spaces in the order subject,
    /// art_style, visual_elements, mood, technical. Falls back to `raw`
    /// when none of them carry anything.
    pub fn search_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();

        if let Some(subject) = non_empty(&self.subject) {
            parts.push(subject);
        }
        if let Some(style) = non_empty(&self.art_style) {
            parts.push(style);
        }
        if let Some(elements) = non_empty_list(&self.visual_elements) {
            parts.extend(elements.iter().map(String::as_str));
        }
        if let Some(mood) = non_empty(&self.mood) {
            parts.push(mood);
        }
        if let Some(technical) = non_empty_list(&self.technical) {
            parts.extend(technical.iter().map(String::as_str));
        }

        if parts.is_empty() {
            self.raw_key().to_string()
        } else {
            parts.join(" ")
        }
    }

    /// True when at least one structured field (not `raw`) is present.
    pub fn has_structured_fields(&self) -> bool {
        non_empty(&self.subject).is_some()
            || non_empty(&self.art_style).is_some()
            || non_empty_list(&self.visual_elements).is_some()
            || non_empty(&self.mood).is_some()
            || non_empty_list(&self.technical).is_some()
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

fn non_empty_list(field: &Option<Vec<String>>) -> Option<&[String]> {
    field.as_deref().filter(|list| !list.is_empty())
}

/// A record returned by search together with its squared L2 distance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub record: Record,
    pub distance: f32,
}
