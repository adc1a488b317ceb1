//! Variable substitution engine for merge templates

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value;

use super::types::Record;

lazy_static! {
    /// `{{...}}` with non-empty content free of `}`; leftmost, non-overlapping
    static ref VARIABLE_PATTERN: Regex = Regex::new(r"\{\{([^}]+)\}\}").unwrap();
}

/// A parsed `{{...}}` expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expression<'a> {
    /// `{{field}}`
    Lookup(&'a str),
    /// `{{field|value|then}}` and `{{field|value|then|else}}`
    Equals {
        field: &'a str,
        expected: &'a str,
        then: &'a str,
        otherwise: &'a str,
    },
    /// `{{field|*|needle|then|else}}`
    Contains {
        field: &'a str,
        needle: &'a str,
        then: &'a str,
        otherwise: &'a str,
    },
    /// `{{field|^|prefix|then|else}}`
    StartsWith {
        field: &'a str,
        prefix: &'a str,
        then: &'a str,
        otherwise: &'a str,
    },
}

impl<'a> Expression<'a> {
    /// Parse the content between the braces; `None` for unsupported shapes
    pub fn parse(content: &'a str) -> Option<Self> {
        let parts: Vec<&str> = content.split('|').map(str::trim).collect();

        match parts[..] {
            [field] => Some(Expression::Lookup(field)),
            [field, expected, then] => Some(Expression::Equals {
                field,
                expected,
                then,
                otherwise: "",
            }),
            [field, expected, then, otherwise] => Some(Expression::Equals {
                field,
                expected,
                then,
                otherwise,
            }),
            [field, "*", needle, then, otherwise] => Some(Expression::Contains {
                field,
                needle,
                then,
                otherwise,
            }),
            [field, "^", prefix, then, otherwise] => Some(Expression::StartsWith {
                field,
                prefix,
                then,
                otherwise,
            }),
            _ => None,
        }
    }

    /// The record field this expression reads
    pub fn field(&self) -> &'a str {
        match *self {
            Expression::Lookup(field)
            | Expression::Equals { field, .. }
            | Expression::Contains { field, .. }
            | Expression::StartsWith { field, .. } => field,
        }
    }

    pub fn evaluate(&self, record: &Record) -> String {
        let value = lookup(record, self.field());

        let (matched, then, otherwise) = match *self {
            Expression::Lookup(_) => return value,
            Expression::Equals {
                expected,
                then,
                otherwise,
                ..
            } => (value == expected, then, otherwise),
            Expression::Contains {
                needle,
                then,
                otherwise,
                ..
            } => (value.contains(needle), then, otherwise),
            Expression::StartsWith {
                prefix,
                then,
                otherwise,
                ..
            } => (value.starts_with(prefix), then, otherwise),
        };

        let chosen = if matched { then } else { otherwise };
        chosen.to_string()
    }
}

/// Iterate the supported expressions of a template, in order
pub(super) fn expressions(template: &str) -> impl Iterator<Item = Expression<'_>> {
    VARIABLE_PATTERN
        .captures_iter(template)
        .filter_map(|caps| caps.get(1))
        .filter_map(|content| Expression::parse(content.as_str()))
}

/// Render a template string against one record.
///
/// Never fails: unsupported expressions are emitted verbatim. Every match is
/// evaluated against the original template, so substituted values are never
/// scanned again.
pub fn render(template: &str, record: &Record) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }

    VARIABLE_PATTERN
        .replace_all(template, |caps: &Captures| match Expression::parse(&caps[1]) {
            Some(expression) => expression.evaluate(record),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Resolve a field path to its raw value.
///
/// A literal key wins over dotted traversal so flat column names such as
/// `Address.City` from a spreadsheet header still resolve.
pub fn resolve<'r>(record: &'r Record, path: &str) -> Option<&'r Value> {
    if let Some(value) = record.get(path) {
        return Some(value);
    }

    let mut segments = path.split('.');
    let mut current = record.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Resolve a field path and stringify it; missing or null yields `""`
pub fn lookup(record: &Record, path: &str) -> String {
    resolve(record, path).map(stringify).unwrap_or_default()
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => number_to_string(n),
        Value::Bool(b) => b.to_string(),
        // For arrays and objects, use JSON representation
        _ => value.to_string(),
    }
}

/// Largest magnitude at which every whole `f64` is exact (2^53)
const MAX_SAFE_WHOLE_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Whole floats print without a fractional part, so `1.0` reads as `1`
fn number_to_string(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < MAX_SAFE_WHOLE_FLOAT => {
            (f as i64).to_string()
        }
        _ => n.to_string(),
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
    fn test_plain_text_unchanged() {
        let r = record(json!({"Name": "Ada"}));
        assert_eq!(render("Hello there, no variables", &r), "Hello there, no variables");
        assert_eq!(render("", &r), "");
        assert_eq!(render("a { b } c {d}", &r), "a { b } c {d}");
    }

    #[test]
    fn test_substitute_simple() {
        let r = record(json!({"Name": "World"}));
        assert_eq!(render("Hello, {{Name}}!", &r), "Hello, World!");
        assert_eq!(render("Hello, {{ Name }}!", &r), "Hello, World!");
    }

    #[test]
    fn test_substitute_number_and_bool() {
        let r = record(json!({"Count": 42, "Ratio": 1.5, "Active": true}));
        assert_eq!(render("{{Count}} / {{Ratio}} / {{Active}}", &r), "42 / 1.5 / true");
    }

    #[test]
    fn test_whole_float_prints_as_integer() {
        let r = record(json!({"Qty": 1.0, "Neg": -3.0, "Half": 2.5, "Huge": 1.0e300}));
        assert_eq!(render("{{Qty}} {{Neg}} {{Half}}", &r), "1 -3 2.5");
        assert_eq!(render("{{Qty|1|one|many}}", &r), "one");
        assert_eq!(render("{{Huge}}", &r), json!(1.0e300).to_string());
    }

    #[test]
    fn test_missing_and_null_are_empty() {
        let r = record(json!({"Nothing": null}));
        assert_eq!(render("[{{Missing}}]", &r), "[]");
        assert_eq!(render("[{{Nothing}}]", &r), "[]");
    }

    #[test]
    fn test_field_names_case_sensitive() {
        let r = record(json!({"email": "a@example.com"}));
        assert_eq!(render("{{Email}}", &r), "");
        assert_eq!(render("{{email}}", &r), "a@example.com");
    }

    #[test]
    fn test_nested_lookup() {
        let r = record(json!({
            "Address": {"City": "Lisbon", "Geo": {"Zone": "WET"}},
            "Tags": ["vip", "gold"],
            "Plain": "text"
        }));
        assert_eq!(render("{{Address.City}}", &r), "Lisbon");
        assert_eq!(render("{{Address.Geo.Zone}}", &r), "WET");
        assert_eq!(render("{{Tags.1}}", &r), "gold");
        assert_eq!(render("{{Address.Country}}", &r), "");
        assert_eq!(render("{{Plain.Length}}", &r), "");
    }

    #[test]
    fn test_literal_dotted_key_preferred() {
        let r = record(json!({"Address.City": "Porto"}));
        assert_eq!(render("{{Address.City}}", &r), "Porto");
    }

    #[test]
    fn test_equality_conditional() {
        let template = "{{Status|Active|Yes|No}}";
        assert_eq!(render(template, &record(json!({"Status": "Active"}))), "Yes");
        assert_eq!(render(template, &record(json!({"Status": "Inactive"}))), "No");
        assert_eq!(render(template, &Record::new()), "No");
    }

    #[test]
    fn test_equality_without_else() {
        let template = "Dear {{Vip|yes| valued }} customer";
        assert_eq!(render(template, &record(json!({"Vip": "yes"}))), "Dear valued customer");
        assert_eq!(render(template, &record(json!({"Vip": "no"}))), "Dear  customer");
    }

    #[test]
    fn test_equality_on_number() {
        let r = record(json!({"Tier": 2}));
        assert_eq!(render("{{Tier|2|Silver|Other}}", &r), "Silver");
    }

    #[test]
    fn test_includes_conditional() {
        let template = "{{Tags|*|vip|VIP|Standard}}";
        assert_eq!(render(template, &record(json!({"Tags": "vip,gold"}))), "VIP");
        assert_eq!(render(template, &record(json!({"Tags": "gold"}))), "Standard");
    }

    #[test]
    fn test_starts_with_conditional() {
        let template = "{{Code|^|US|Domestic|International}}";
        assert_eq!(render(template, &record(json!({"Code": "US-1234"}))), "Domestic");
        assert_eq!(render(template, &record(json!({"Code": "PT-1234"}))), "International");
    }

    #[test]
    fn test_malformed_passthrough() {
        let r = Record::new();
        assert_eq!(render("{{a|b|c|d|e|f}}", &r), "{{a|b|c|d|e|f}}");
        assert_eq!(render("{{a|b}}", &r), "{{a|b}}");
        assert_eq!(render("{{a|?|b|c|d}}", &r), "{{a|?|b|c|d}}");
        assert_eq!(render("{{}}", &r), "{{}}");
    }

    #[test]
    fn test_values_not_reinterpreted() {
        let r = record(json!({
            "Name": "{{Secret}}",
            "Secret": "leaked"
        }));
        assert_eq!(render("Hi {{Name}}, {{Name}}", &r), "Hi {{Secret}}, {{Secret}}");
    }

    #[test]
    fn test_repeated_variables_replaced_independently() {
        let r = record(json!({"A": "1", "B": "2"}));
        assert_eq!(render("{{A}}{{B}}{{A}}", &r), "121");
    }

    #[test]
    fn test_idempotent_on_rendered_output() {
        let r = record(json!({"Name": "Ada"}));
        let once = render("Hello {{Name}}", &r);
        assert_eq!(render(&once, &r), once);
    }

    #[test]
    fn test_parse_shapes() {
        assert_eq!(Expression::parse(" Name "), Some(Expression::Lookup("Name")));
        assert_eq!(Expression::parse("Tags|*|vip|VIP|Std").map(|e| e.field()), Some("Tags"));
        assert!(matches!(
            Expression::parse("Tags|*|vip|VIP"),
            Some(Expression::Equals { expected: "*", .. })
        ));
        assert_eq!(Expression::parse("a|b"), None);
    }
}
