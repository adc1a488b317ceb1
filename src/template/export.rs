//! Plain-text export of personalized messages, for hosts where no delivery
//! backend is usable and messages are copied by hand.

use std::fmt::Write;

use super::types::{MergeTemplate, Record};

const SEPARATOR_WIDTH: usize = 50;

/// Render every recipient and lay the messages out one after another
pub fn export_messages(template: &MergeTemplate, recipients: &[Record]) -> String {
    let heavy = "=".repeat(SEPARATOR_WIDTH);
    let light = "-".repeat(SEPARATOR_WIDTH);
    let total = recipients.len();

    let mut out = String::from("PERSONALIZED EMAIL MESSAGES\n");
    let _ = writeln!(out, "{}\n", heavy);

    for (index, record) in recipients.iter().enumerate() {
        let message = template.render(record);

        let _ = writeln!(out, "MESSAGE {} of {}", index + 1, total);
        let _ = writeln!(out, "{}", light);
        let _ = writeln!(out, "To: {}", message.to);
        let _ = writeln!(out, "Subject: {}\n", message.subject);
        let _ = writeln!(out, "{}\n", message.body);
        let _ = writeln!(out, "{}\n", heavy);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_export_layout() {
        let template = MergeTemplate::new("{{Email}}", "Hi {{Name}}", "Body for {{Name}}");
        let recipients: Vec<Record> = vec![
            json!({"Email": "a@example.com", "Name": "Ann"}),
            json!({"Email": "b@example.com", "Name": "Bob"}),
        ]
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect();

        let out = export_messages(&template, &recipients);

        assert!(out.starts_with("PERSONALIZED EMAIL MESSAGES\n"));
        assert!(out.contains("MESSAGE 1 of 2\n"));
        assert!(out.contains("To: b@example.com\nSubject: Hi Bob\n\nBody for Bob\n"));
        assert_eq!(out.matches("MESSAGE ").count(), 2);
    }

    #[test]
    fn test_export_empty_list() {
        let out = export_messages(&MergeTemplate::default(), &[]);
        assert_eq!(out, format!("PERSONALIZED EMAIL MESSAGES\n{}\n\n", "=".repeat(50)));
    }
}
