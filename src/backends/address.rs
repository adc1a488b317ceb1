//! Destination address parsing for rendered `To` fields.

use serde::Serialize;

use crate::dispatch::DeliveryError;

/// A single parsed destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mailbox {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
}

impl Mailbox {
    fn parse(entry: &str) -> Result<Self, DeliveryError> {
        let (name, email) = match (entry.rfind('<'), entry.rfind('>')) {
            (Some(open), Some(close)) if open < close => {
                let name = entry[..open].trim().trim_matches('"').trim();
                let email = entry[open + 1..close].trim();
                (
                    (!name.is_empty()).then(|| name.to_string()),
                    email.to_string(),
                )
            }
            _ => (None, entry.trim().to_string()),
        };

        if !is_plausible_email(&email) {
            return Err(DeliveryError::InvalidAddress(entry.to_string()));
        }

        Ok(Self { name, email })
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Parse a rendered `To` value into mailboxes.
///
/// Entries are separated by `,` or `;` outside double quotes and may use the
/// `Display Name <user@host>` form. Empty entries are ignored.
pub fn parse_address_list(value: &str) -> Result<Vec<Mailbox>, DeliveryError> {
    let mut mailboxes = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in value.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ',' | ';' if !quoted => {
                push_entry(&mut mailboxes, &current)?;
                current.clear();
            }
            _ => current.push(c),
        }
    }
    push_entry(&mut mailboxes, &current)?;

    if mailboxes.is_empty() {
        return Err(DeliveryError::InvalidAddress(value.to_string()));
    }
    Ok(mailboxes)
}

fn push_entry(mailboxes: &mut Vec<Mailbox>, entry: &str) -> Result<(), DeliveryError> {
    if !entry.trim().is_empty() {
        mailboxes.push(Mailbox::parse(entry)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_address() {
        let list = parse_address_list("ada@example.com").unwrap();
        assert_eq!(
            list,
            vec![Mailbox {
                name: None,
                email: "ada@example.com".to_string()
            }]
        );
    }

    #[test]
    fn test_named_addresses_with_separators() {
        let list =
            parse_address_list("Ada Lovelace <ada@example.com>; \"Babbage, C\" <cb@example.com>, ")
                .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(list[1].name.as_deref(), Some("Babbage, C"));
        assert_eq!(list[1].email, "cb@example.com");
    }

    #[test]
    fn test_invalid_address() {
        assert!(matches!(
            parse_address_list("Ada <>"),
            Err(DeliveryError::InvalidAddress(_))
        ));
        assert!(parse_address_list("not an address").is_err());
        assert!(parse_address_list(" ; ").is_err());
    }
}
