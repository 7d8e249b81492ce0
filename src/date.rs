//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! Conversions between the wire/XML date representation and the in-memory
//! `(sec, usec)` pair exposed by [`crate::tree::Date`].
//!
//! Both the binary `Date` record and the XML `<date>` element measure time
//! as an offset from the Core Data reference date, 2001-01-01T00:00:00Z,
//! rather than the Unix epoch.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::error::{Error, Result};
use crate::tree::Date;

fn reference_epoch() -> DateTime<Utc> {
    Utc.from_utc_datetime(&NaiveDate::from_ymd(2001, 1, 1).and_hms(0, 0, 0))
}

/// Converts a wire-format `f64` (seconds since the reference epoch, as
/// found in a binary Date record or implied by an XML `<date>` element)
/// into the in-memory `(sec, usec)` pair.
///
/// The conversion is intentionally lossy near the extremes of `i64`/`i32`
/// range, matching the 32-bit `plist_new_date` interface this module
/// replaces; callers needing sub-microsecond or far-future precision are
/// out of scope.
pub fn from_wire_seconds(seconds: f64) -> Result<Date> {
    if !seconds.is_finite() {
        return Err(Error::MalformedInput);
    }
    let sec = seconds.floor() as i64;
    let usec = ((seconds - seconds.floor()) * 1_000_000.0).round() as i32;
    Ok(Date { sec, usec })
}

/// Inverse of [`from_wire_seconds`].
pub fn to_wire_seconds(date: Date) -> f64 {
    date.sec as f64 + (date.usec as f64 / 1_000_000.0)
}

/// Parses an XML `<date>` element's ISO-8601 text (e.g.
/// `2001-01-01T00:00:00Z`) into the in-memory `(sec, usec)` pair.
pub fn from_iso8601(text: &str) -> Result<Date> {
    let parsed = DateTime::parse_from_rfc3339(text).map_err(|_| Error::MalformedInput)?;
    let utc = parsed.with_timezone(&Utc);
    let delta = utc.signed_duration_since(reference_epoch());
    let sec = delta.num_seconds();
    let usec = (delta.num_microseconds().unwrap_or(0) - sec * 1_000_000) as i32;
    Ok(Date { sec, usec })
}

/// Renders `date` as the ISO-8601 text used by the XML `<date>` element.
pub fn to_iso8601(date: Date) -> String {
    let naive = reference_epoch() + chrono::Duration::seconds(date.sec)
        + chrono::Duration::microseconds(date.usec as i64);
    naive.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
