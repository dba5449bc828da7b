use chrono::{Duration, Utc};
use tracing::debug;

use crate::models::{Provenance, ResultRecord};

const CHANNEL_NAMES: [&str; 5] = [
    "TechChannel",
    "GamerSpot",
    "TutorialHub",
    "MusicVibes",
    "NewsNetwork",
];

const VIDEO_ID_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
const VIDEO_ID_LEN: usize = 11;

/// Placeholder records for credential-less operation and explicit test mode
///
/// The field set is fixed; ids, channels, dates, view counts and durations
/// are random. Every record is tagged [`Provenance::Synthetic`] and must
/// never be written to the result cache.
pub fn generate_synthetic_results(query: &str, count: usize) -> Vec<ResultRecord> {
    debug!("Generating {} synthetic results for query: '{}'", count, query);

    let now = Utc::now();
    (0..count)
        .map(|i| ResultRecord {
            video_id: random_video_id(),
            title: format!("[SYNTHETIC] {} - Result {}", query, i + 1),
            description: format!(
                "Locally generated placeholder result for the query '{}'.",
                query
            ),
            channel_title: CHANNEL_NAMES[fastrand::usize(..CHANNEL_NAMES.len())].to_string(),
            thumbnail_url: format!(
                "https://via.placeholder.com/{}x{}",
                320 + i * 10,
                180 + i * 5
            ),
            published_at: now - Duration::days(fastrand::i64(1..365)),
            duration: random_duration(),
            view_count: fastrand::u64(100..1_000_000),
            provenance: Provenance::Synthetic,
        })
        .collect()
}

fn random_video_id() -> String {
    (0..VIDEO_ID_LEN)
        .map(|_| VIDEO_ID_ALPHABET[fastrand::usize(..VIDEO_ID_ALPHABET.len())] as char)
        .collect()
}

fn random_duration() -> String {
    format!(
        "{}:{:02}:{:02}",
        fastrand::u8(0..10),
        fastrand::u8(0..60),
        fastrand::u8(0..60)
    )
}
