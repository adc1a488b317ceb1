use serde::{Deserialize, Serialize};

use super::substitution::render;

/// One recipient's field values, keyed by case-sensitive field name
pub type Record = serde_json::Map<String, serde_json::Value>;

/// The three template slots rendered for every recipient
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeTemplate {
    /// Destination template, e.g. `{{FirstName}} <{{Email}}>`
    #[serde(default, alias = "to_template")]
    pub to: String,

    #[serde(default)]
    pub subject: String,

    /// Message body (HTML allowed)
    #[serde(default)]
    pub body: String,
}

impl MergeTemplate {
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Render all three slots against one recipient
    pub fn render(&self, record: &Record) -> RenderedMessage {
        RenderedMessage {
            to: render(&self.to, record),
            subject: render(&self.subject, record),
            body: render(&self.body, record),
        }
    }
}

/// A template rendered for a single recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl RenderedMessage {
    /// Whether the destination template resolved to anything but whitespace
    pub fn has_destination(&self) -> bool {
        !self.to.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_render_all_slots() {
        let template = MergeTemplate::new(
            "{{FirstName}} <{{Email}}>",
            "Welcome, {{FirstName}}",
            "<p>Your plan: {{Plan|pro|Pro|Free}}</p>",
        );
        let rendered = template.render(&record(json!({
            "FirstName": "Ada",
            "Email": "ada@example.com",
            "Plan": "pro"
        })));

        assert_eq!(rendered.to, "Ada <ada@example.com>");
        assert_eq!(rendered.subject, "Welcome, Ada");
        assert_eq!(rendered.body, "<p>Your plan: Pro</p>");
        assert!(rendered.has_destination());
    }

    #[test]
    fn test_blank_destination() {
        let template = MergeTemplate::new("  {{Email}} ", "Hi", "Body");
        let rendered = template.render(&Record::new());
        assert!(!rendered.has_destination());
    }

    #[test]
    fn test_deserialize_to_template_alias() {
        let template: MergeTemplate = serde_json::from_value(json!({
            "to_template": "{{Email}}",
            "subject": "S",
            "body": "B"
        }))
        .unwrap();
        assert_eq!(template.to, "{{Email}}");
    }
}
