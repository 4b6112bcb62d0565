use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The record of one delivery attempt chain, returned to the caller on
/// success (failures surface as [`SendError`](crate::SendError)).
///
/// Results are created per call and handed to the caller or the async
/// callback; the engine does not retain them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResult {
    /// The message's stable id, echoed back for correlation.
    pub request_id: String,

    /// Name of the provider that handled the send.
    pub provider_name: String,

    /// Name of the account the selector chose.
    pub account_name: String,

    /// Wall time from pipeline entry to classified response.
    pub elapsed: Duration,

    /// HTTP status code, when the provider spoke HTTP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    /// Leading excerpt of the raw vendor response body.
    #[serde(default)]
    pub response_excerpt: String,
}

impl SendResult {
    /// Maximum excerpt length retained from a vendor response.
    pub const EXCERPT_LIMIT: usize = 256;

    /// Truncate a raw response body to the retained excerpt, respecting
    /// UTF-8 boundaries.
    pub fn excerpt_of(body: &str) -> String {
        if body.len() <= Self::EXCERPT_LIMIT {
            return body.to_owned();
        }
        let mut end = Self::EXCERPT_LIMIT;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body[..end].to_owned()
    }
}
