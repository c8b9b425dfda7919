// Request signing for the external API. The service validates the
// Authorization header byte-for-byte, so every piece of the canonical
// string below has to stay exactly as it is.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Days, NaiveDate, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Scheme token that prefixes every Authorization header.
pub const AUTH_SCHEME: &str = "APIAuth";

/// Content type used by requests that carry a JSON body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Build the string that gets signed. Requests without a body pass an
/// empty `content_type`; the second field is reserved and always blank.
pub fn canonical_string(content_type: &str, path_and_query: &str, timestamp: &str) -> String {
    format!("{},,{},{}", content_type, path_and_query, timestamp)
}

/// Produce the Authorization header value: `APIAuth <id>:<base64 hmac-sha1>`.
pub fn build_auth(
    content_type: &str,
    path_and_query: &str,
    timestamp: &str,
    identity_id: u64,
    secret: &str,
) -> String {
    let canonical = canonical_string(content_type, path_and_query, timestamp);
    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(canonical.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());
    format!("{} {}:{}", AUTH_SCHEME, identity_id, signature)
}

/// RFC 1123 timestamp in UTC, e.g. `Tue, 01 Jan 2019 00:00:00 GMT`.
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// The pair of headers that authorize one request. Both values come from
/// the same timestamp, so build this once per outgoing request and send
/// it as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub date: String,
    pub authorization: String,
}

impl SignedHeaders {
    pub fn new(
        content_type: &str,
        path_and_query: &str,
        identity_id: u64,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let date = http_date(now);
        let authorization = build_auth(content_type, path_and_query, &date, identity_id, secret);
        SignedHeaders { date, authorization }
    }
}

/// Calendar range used by digest queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// `[today - days, today]` using UTC calendar fields. Returns `None`
    /// when the lookback falls outside the representable date range.
    pub fn ending_at(now: DateTime<Utc>, days: u32) -> Option<Self> {
        let end = now.date_naive();
        let start = end.checked_sub_days(Days::new(u64::from(days)))?;
        Some(DateWindow { start, end })
    }

    pub fn start_param(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}
