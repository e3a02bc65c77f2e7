//! Pattern derivation from data-change events.
//!
//! A [`PatternStrategy`] turns an event into the invalidation patterns whose
//! keys may now be stale. [`CrimeDataStrategy`] knows the key conventions
//! of the crime-data routes.

use super::event::{ChangeMetadata, DataChangeEvent, Location, Month};
use crate::registry::Pattern;

/// Maps a data-change event to invalidation pattern strings.
pub trait PatternStrategy: Send + Sync {
    fn derive_patterns(&self, event: &DataChangeEvent) -> Vec<String>;
}

// == Crime Data Strategy ==
/// Spatial buckets are 0.01 degrees wide.
const BUCKETS_PER_DEGREE: f64 = 100.0;

/// Derives patterns from the key conventions of the crime-data routes:
/// `YYYY-MM` month segments, `type:{crimeType}`, `geo:{lat}:{lng}` buckets
/// and `record:{id}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrimeDataStrategy;

impl PatternStrategy for CrimeDataStrategy {
    fn derive_patterns(&self, event: &DataChangeEvent) -> Vec<String> {
        let mut patterns = Vec::new();

        if let Some(metadata) = &event.metadata {
            patterns.extend(period_pattern(metadata));
            if let Some(crime_type) = metadata.crime_type.as_deref().filter(|t| !t.is_empty()) {
                patterns.push(Pattern::literal(&format!("type:{crime_type}")));
            }
            if let Some(location) = metadata.location {
                patterns.extend(location_patterns(location));
            }
        }

        if let Some(document_id) = event.document_id.as_deref().filter(|id| !id.is_empty()) {
            patterns.push(Pattern::literal(&format!("record:{document_id}")));
        }

        if patterns.is_empty() {
            patterns.push(format!("^{}:", regex::escape(&event.collection)));
        }
        patterns
    }
}

/// `YYYY-MM` for a known month, every month of the year for a lone year.
fn period_pattern(metadata: &ChangeMetadata) -> Option<String> {
    let month = match (&metadata.month, metadata.year) {
        (Some(Month::Text(text)), _) if is_year_month(text) => Some(text.clone()),
        (Some(month), Some(year)) => month
            .number()
            .filter(|number| (1..=12).contains(number))
            .map(|number| format!("{year:04}-{number:02}")),
        _ => None,
    };

    match (month, metadata.year) {
        (Some(month), _) => Some(Pattern::literal(&month)),
        (None, Some(year)) => Some(format!(r"{year:04}-\d{{2}}")),
        (None, None) => None,
    }
}

/// Four-digit year, a dash and a month from `01` to `12`.
fn is_year_month(text: &str) -> bool {
    let Some((year, month)) = text.split_once('-') else {
        return false;
    };
    let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    year.len() == 4
        && month.len() == 2
        && digits(year)
        && digits(month)
        && month.parse::<u32>().is_ok_and(|m| (1..=12).contains(&m))
}

/// The bucket containing `location` and its eight neighbours.
fn location_patterns(location: Location) -> Vec<String> {
    let lat_idx = bucket_index(location.lat);
    let lng_idx = bucket_index(location.lng);

    let mut patterns = Vec::with_capacity(9);
    for lat in lat_idx.saturating_sub(1)..=lat_idx.saturating_add(1) {
        for lng in lng_idx.saturating_sub(1)..=lng_idx.saturating_add(1) {
            patterns.push(format!(r"geo:{lat}:{lng}\b"));
        }
    }
    patterns
}

fn bucket_index(degrees: f64) -> i64 {
    (degrees * BUCKETS_PER_DEGREE).floor() as i64
}
