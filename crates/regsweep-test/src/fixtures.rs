//! Scenario fixtures.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;

/// Fixed reference instant so listings are reproducible across runs.
#[must_use]
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// An instant `hours` before [`epoch`].
#[must_use]
pub fn hours_ago(hours: i64) -> DateTime<Utc> {
    epoch() - Duration::hours(hours)
}

/// A schema 2 manifest body whose content (and therefore digest) is
/// determined by `seed`.
#[must_use]
pub fn manifest_payload(seed: &str) -> Vec<u8> {
    json!({
        "schemaVersion": 2,
        "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
        "config": {
            "mediaType": "application/vnd.docker.container.image.v1+json",
            "size": 1469,
            "digest": format!("sha256:{:0>64}", seed.len()),
        },
        "layers": [],
        "annotations": { "seed": seed },
    })
    .to_string()
    .into_bytes()
}
