//! Structural validation of decoded queue messages.

use crate::address::is_valid_email;
use crate::attachment::AttachmentReference;
use serde_json::Value;

/// Pass/fail judgment on a message, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationVerdict {
    pub valid: bool,
    pub reason: String,
}

impl ValidationVerdict {
    fn pass() -> Self {
        Self {
            valid: true,
            reason: "validation successful".to_string(),
        }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: reason.into(),
        }
    }
}

/// Checks that a decoded message describes a sendable email.
///
/// Rules run in order and the first failure wins:
///
/// 1. the message is not empty
/// 2. the message is an object
/// 3. `to`, `subject` and `body` are present and not empty
/// 4. every `to` address is well formed
/// 5. `subject` and `body` are strings
/// 6. every `bcc` address is well formed, when `bcc` is given
/// 7. every attachment is a URL or a recognized inline payload, when given
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageValidator;

impl MessageValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, raw: &Value) -> ValidationVerdict {
        if is_empty(raw) {
            return ValidationVerdict::fail("message is empty");
        }

        let Some(message) = raw.as_object() else {
            return ValidationVerdict::fail("message is not an object");
        };

        let field = |name: &str| message.get(name).filter(|v| !is_empty(v));
        let (Some(to), Some(subject), Some(body)) = (field("to"), field("subject"), field("body"))
        else {
            return ValidationVerdict::fail("required fields missing (to, subject, body)");
        };

        if let Err(address) = check_each(to, is_valid_email) {
            return ValidationVerdict::fail(format!("invalid email: {}", address));
        }

        if !subject.is_string() || !body.is_string() {
            return ValidationVerdict::fail("subject or body is not a string");
        }

        if let Some(bcc) = message.get("bcc").filter(|v| !v.is_null())
            && let Err(address) = check_each(bcc, is_valid_email)
        {
            return ValidationVerdict::fail(format!("invalid email: {}", address));
        }

        if let Some(attachments) = message.get("attachments").filter(|v| !v.is_null())
            && let Err(reference) =
                check_each(attachments, |r| AttachmentReference::parse(r).is_ok())
        {
            return ValidationVerdict::fail(format!("invalid attachment: {}", reference));
        }

        ValidationVerdict::pass()
    }
}

// Null, false, zero, "", "0", [] and {} all count as empty.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Apply `check` to a single string or to each element of a list, returning
/// the first offending entry as text.
fn check_each(value: &Value, check: impl Fn(&str) -> bool) -> Result<(), String> {
    let items = match value {
        Value::Array(items) => items.as_slice(),
        single => std::slice::from_ref(single),
    };

    for item in items {
        match item.as_str() {
            Some(text) if check(text) => {}
            Some(text) => return Err(text.to_string()),
            None => return Err(item.to_string()),
        }
    }
    Ok(())
}
