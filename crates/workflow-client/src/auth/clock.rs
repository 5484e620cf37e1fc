/*
[INPUT]:  Server timestamps from HTTP `Date` response headers
[OUTPUT]: Estimated server-minus-client offset and adjusted "now"
[POS]:    Auth layer - clock skew correction for expiry checks
[UPDATE]: When changing timestamp sources or offset policy
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};
use reqwest::header::{DATE, HeaderMap};
use tracing::trace;

/// Process-wide server clock offset in milliseconds.
///
/// Cloning shares the same underlying value. Last observation wins.
#[derive(Debug, Clone, Default)]
pub struct ClockOffset {
    offset_ms: Arc<AtomicI64>,
}

impl ClockOffset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `server_time - local_now` as the current offset
    pub fn observe(&self, server_time: DateTime<Utc>) {
        let offset = (server_time - Utc::now()).num_milliseconds();
        self.offset_ms.store(offset, Ordering::SeqCst);
        trace!(offset_ms = offset, "server clock offset updated");
    }

    /// Observe the `Date` header of a response, ignoring it when absent or malformed
    pub fn observe_headers(&self, headers: &HeaderMap) {
        if let Some(server_time) = server_time_from_headers(headers) {
            self.observe(server_time);
        }
    }

    pub fn offset_ms(&self) -> i64 {
        self.offset_ms.load(Ordering::SeqCst)
    }

    /// Local time shifted onto the server's clock
    pub fn adjusted_now(&self) -> DateTime<Utc> {
        Utc::now() + Duration::milliseconds(self.offset_ms())
    }
}

/// Extract the server timestamp from a `Date` header (IMF-fixdate).
pub fn server_time_from_headers(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let raw = headers.get(DATE)?.to_str().ok()?;
    DateTime::parse_from_rfc2822(raw.trim())
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}
