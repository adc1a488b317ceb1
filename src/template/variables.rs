//! Variable discovery for templates

use super::substitution::{expressions, resolve};
use super::types::{MergeTemplate, Record};

/// Extract the field names a template string reads, in first-seen order.
///
/// Pass-through expressions are not variables and are left out.
pub fn extract_variables(template: &str) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();

    for expression in expressions(template) {
        let field = expression.field();
        if !field.is_empty() && !fields.iter().any(|f| f == field) {
            fields.push(field.to_string());
        }
    }

    fields
}

/// Field names referenced anywhere in the To, Subject or Body slots
pub fn referenced_fields(template: &MergeTemplate) -> Vec<String> {
    let mut fields = extract_variables(&template.to);
    for slot in [&template.subject, &template.body] {
        for field in extract_variables(slot) {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
    }
    fields
}

/// Referenced fields that the given record does not provide
pub fn missing_fields(template: &MergeTemplate, record: &Record) -> Vec<String> {
    referenced_fields(template)
        .into_iter()
        .filter(|field| resolve(record, field).is_none())
        .collect()
}
