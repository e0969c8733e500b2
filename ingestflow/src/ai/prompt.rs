//! Versioned prompt templates.

use crate::core::Payload;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"));

/// A prompt with `{field}` placeholders filled from the top-level fields of
/// a stage input.
///
/// String values are inserted verbatim, other values as compact JSON, and
/// missing or null fields as the empty string. Fields listed in
/// `max_chars` are cut to that many characters before insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Template id.
    pub id: String,
    /// Template version.
    pub version: u32,
    /// Template text.
    pub template: String,
    /// Per-field character limits.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub max_chars: BTreeMap<String, usize>,
}

impl PromptTemplate {
    /// Creates a template.
    #[must_use]
    pub fn new(id: impl Into<String>, version: u32, template: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version,
            template: template.into(),
            max_chars: BTreeMap::new(),
        }
    }

    /// Limits the rendered length of a field.
    #[must_use]
    pub fn truncate_field(mut self, field: impl Into<String>, max_chars: usize) -> Self {
        self.max_chars.insert(field.into(), max_chars);
        self
    }

    /// Names of the placeholders, in order of first appearance.
    #[must_use]
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for caps in PLACEHOLDER.captures_iter(&self.template) {
            if let Some(name) = caps.get(1).map(|m| m.as_str()) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Renders the template against a payload.
    #[must_use]
    pub fn render(&self, input: &Payload) -> String {
        PLACEHOLDER
            .replace_all(&self.template, |caps: &regex::Captures<'_>| {
                let name = &caps[1];
                let value = match input.get(name) {
                    None | Some(Payload::Null) => String::new(),
                    Some(Payload::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                };
                match self.max_chars.get(name) {
                    Some(&limit) => value.chars().take(limit).collect(),
                    None => value,
                }
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_render() {
        let template = PromptTemplate::new(
            "semantics",
            2,
            "Title: {title}\nTags: {tags}\nMissing: [{author}]\n{title}",
        );
        let rendered = template.render(&json!({"title": "Ownership", "tags": ["rust"]}));
        assert_eq!(
            rendered,
            "Title: Ownership\nTags: [\"rust\"]\nMissing: []\nOwnership"
        );
    }

    #[test]
    fn test_truncation() {
        let template = PromptTemplate::new("semantics", 1, "{transcript}|{title}")
            .truncate_field("transcript", 5);
        let rendered = template.render(&json!({"transcript": "abcdéfghij", "title": "t"}));
        assert_eq!(rendered, "abcdé|t");
    }

    #[test]
    fn test_placeholders() {
        let template = PromptTemplate::new("x", 1, "{a} {b} {a} {not a placeholder}");
        assert_eq!(template.placeholders(), vec!["a", "b"]);
    }
}
