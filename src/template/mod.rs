//! Mail merge template engine.
//!
//! This module provides:
//! - Template definition with To/Subject/Body slots
//! - Variable substitution with conditional forms
//! - Variable discovery for field pickers
//! - Plain-text export of every personalized message
//!
//! # Variable syntax
//!
//! | Expression | Result |
//! |------------|--------|
//! | `{{Name}}` | value of `Name`, empty when missing |
//! | `{{Address.City}}` | nested lookup |
//! | `{{Status\|Active\|Yes}}` | `Yes` when `Status` equals `Active`, else empty |
//! | `{{Status\|Active\|Yes\|No}}` | equality with an else branch |
//! | `{{Tags\|*\|vip\|VIP\|Standard}}` | `VIP` when `Tags` contains `vip` |
//! | `{{Code\|^\|US\|Domestic\|International}}` | `Domestic` when `Code` starts with `US` |
//!
//! Any other shape is left in the output untouched.
//!
//! # Example
//!
//! ```ignore
//! let template = MergeTemplate::new("{{Email}}", "Hello {{FirstName}}", "<p>Hi {{FirstName}}</p>");
//! let record = json!({"FirstName": "Ada", "Email": "ada@example.com"});
//!
//! let rendered = template.render(record.as_object().unwrap());
//! assert_eq!(rendered.subject, "Hello Ada");
//! ```

mod export;
mod substitution;
mod types;
mod variables;

pub use export::export_messages;
pub use substitution::{lookup, render, resolve, Expression};
pub use types::{MergeTemplate, Record, RenderedMessage};
pub use variables::{extract_variables, missing_fields, referenced_fields};
