//! Email address syntax checks.

use crate::{MailError, Result};
use lettre::message::Mailbox;

/// Parse an address, rejecting anything a relay would bounce on syntax alone.
///
/// On top of lettre's RFC 5322 parsing, the domain must be a dotted name with
/// no empty labels (`user@localhost` and `user@example..com` are rejected).
pub fn parse_address(email: &str) -> Result<lettre::Address> {
    if email.is_empty() || email.trim() != email {
        return Err(MailError::InvalidAddress(email.to_string()));
    }

    let address: lettre::Address = email
        .parse()
        .map_err(|_| MailError::InvalidAddress(email.to_string()))?;

    let domain = address.domain();
    if !domain.starts_with('[') && (!domain.contains('.') || domain.split('.').any(str::is_empty)) {
        return Err(MailError::InvalidAddress(email.to_string()));
    }

    Ok(address)
}

/// Check address syntax.
pub fn is_valid_email(email: &str) -> bool {
    parse_address(email).is_ok()
}

/// Build a mailbox with an optional display name.
pub fn mailbox(email: &str, name: Option<&str>) -> Result<Mailbox> {
    Ok(Mailbox::new(name.map(str::to_string), parse_address(email)?))
}
