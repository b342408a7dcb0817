//! Attachment references carried in email jobs.
//!
//! A reference is either an http(s) URL to fetch, or an inline payload of the
//! form `data:<media-type>;base64,<payload>`.

use crate::{MailError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::Path;
use url::Url;

/// Inline media types that can be materialized, with the file extension used.
const MEDIA_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("application/pdf", "pdf"),
    ("video/mp4", "mp4"),
    ("audio/mpeg", "mp3"),
    ("text/plain", "txt"),
    ("text/html", "html"),
    ("application/zip", "zip"),
    ("application/x-rar-compressed", "rar"),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xlsx",
    ),
    ("application/vnd.ms-excel", "xls"),
    ("application/vnd.ms-powerpoint", "ppt"),
    ("application/msword", "doc"),
];

/// File extension for a recognized inline media type.
pub fn extension_for(media_type: &str) -> Option<&'static str> {
    MEDIA_TYPES
        .iter()
        .find(|(known, _)| *known == media_type)
        .map(|(_, ext)| *ext)
}

/// A parsed attachment reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentReference {
    /// Content to download.
    Remote(Url),
    /// Content embedded in the job itself.
    Inline {
        media_type: String,
        extension: &'static str,
        data: Vec<u8>,
    },
}

impl AttachmentReference {
    /// Parse and check a reference.
    ///
    /// Inline payloads must use a recognized media type and be canonical
    /// base64: decoding and re-encoding has to give back the exact input.
    pub fn parse(reference: &str) -> Result<Self> {
        if let Some(rest) = reference.strip_prefix("data:") {
            return Self::parse_inline(reference, rest);
        }

        match Url::parse(reference) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
                Ok(AttachmentReference::Remote(url))
            }
            _ => Err(MailError::InvalidAttachment(reference.to_string())),
        }
    }

    fn parse_inline(reference: &str, rest: &str) -> Result<Self> {
        let invalid = || MailError::InvalidAttachment(reference.to_string());

        let (media_type, payload) = rest.split_once(";base64,").ok_or_else(invalid)?;
        if media_type.is_empty()
            || !media_type
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '+'))
        {
            return Err(invalid());
        }

        let extension = extension_for(media_type).ok_or_else(invalid)?;
        let data = STANDARD.decode(payload).map_err(|_| invalid())?;
        if STANDARD.encode(&data) != payload {
            return Err(invalid());
        }

        Ok(AttachmentReference::Inline {
            media_type: media_type.to_string(),
            extension,
            data,
        })
    }

    /// File extension of the remote path, if it has one.
    pub fn remote_extension(url: &Url) -> Option<&str> {
        Path::new(url.path())
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
    }
}
