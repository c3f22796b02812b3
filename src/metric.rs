use std::collections::BTreeMap;

/// Label name to label value. Ordered so that column metadata and encoded
/// frames come out the same way every time.
pub type Labels = BTreeMap<String, String>;

pub const METRIC_NAME_LABEL: &str = "__name__";

/// A single sample. `timestamp` is in unix milliseconds; `value` may be
/// NaN or +/-Inf, which are data and not errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: i64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub labels: Labels,
    // Sorted by timestamp, no duplicate timestamps.
    pub samples: Vec<Sample>,
}

impl Series {
    pub fn new(labels: Labels, mut samples: Vec<Sample>) -> Self {
        // Stable sort so the first sample wins when the backend repeats a timestamp.
        samples.sort_by_key(|s| s.timestamp);
        let before = samples.len();
        samples.dedup_by_key(|s| s.timestamp);
        if samples.len() != before {
            log::debug!(
                "dropped {} duplicate samples from series {:?}",
                before - samples.len(),
                labels
            );
        }
        Self { labels, samples }
    }
}
