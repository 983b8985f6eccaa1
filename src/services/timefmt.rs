//! Timestamp parsing for request bodies.
//!
//! Clients send either full RFC 3339 values or the `YYYY-MM-DDTHH:MM` shape a
//! `datetime-local` input produces. The latter carries no offset and is read
//! as UTC.

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// Parse an RFC 3339 or `YYYY-MM-DDTHH:MM[:SS]` timestamp.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(parsed);
    }
    PrimitiveDateTime::parse(raw, format_description!("[year]-[month]-[day]T[hour]:[minute]"))
        .or_else(|_| PrimitiveDateTime::parse(raw, format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]")))
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}
