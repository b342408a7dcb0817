//! The email job carried in a queue message.

use crate::Result;
use serde::{Deserialize, Serialize};

/// A field that may hold a single value or an ordered list of values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// Iterate the values in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            OneOrMany::One(value) => std::slice::from_ref(value),
            OneOrMany::Many(values) => values,
        };
        values.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values joined with `", "`, for log lines.
    pub fn joined(&self) -> String {
        self.iter().collect::<Vec<_>>().join(", ")
    }
}

impl From<&str> for OneOrMany {
    fn from(value: &str) -> Self {
        OneOrMany::One(value.to_string())
    }
}

impl From<String> for OneOrMany {
    fn from(value: String) -> Self {
        OneOrMany::One(value)
    }
}

impl From<Vec<&str>> for OneOrMany {
    fn from(values: Vec<&str>) -> Self {
        OneOrMany::Many(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for OneOrMany {
    fn from(values: Vec<String>) -> Self {
        OneOrMany::Many(values)
    }
}

/// One email to send, as decoded from a queue message.
///
/// ```json
/// { "to": "a@example.com", "subject": "Hi", "body": "<p>Hello</p>",
///   "attachments": ["https://files.example.com/report.pdf"], "bcc": ["audit@example.com"] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailJob {
    pub to: OneOrMany,
    pub subject: String,
    /// HTML body
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bcc: Option<OneOrMany>,
}

impl EmailJob {
    pub fn new(to: impl Into<OneOrMany>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            attachments: None,
            bcc: None,
        }
    }

    pub fn with_attachments(mut self, attachments: impl Into<OneOrMany>) -> Self {
        self.attachments = Some(attachments.into());
        self
    }

    pub fn with_bcc(mut self, bcc: impl Into<OneOrMany>) -> Self {
        self.bcc = Some(bcc.into());
        self
    }

    /// Build a job from an already validated message.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        Ok(Self::deserialize(value)?)
    }

    /// `"subject - to - bcc"` line logged when a job is received.
    pub fn summary(&self) -> String {
        format!(
            "{} - {} - {}",
            self.subject,
            self.to.joined(),
            self.bcc.as_ref().map(OneOrMany::joined).unwrap_or_default()
        )
    }
}
