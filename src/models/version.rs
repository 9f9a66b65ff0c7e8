use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable snapshot of a document, as stored in its history.
///
/// A version has no id of its own. It is addressed by its position in the
/// history sequence at the time of the read.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub content: String,
    #[serde(default)]
    pub edited_by: String,
    pub version_at: DateTime<Utc>,
}

impl Version {
    pub fn new(
        content: impl Into<String>,
        edited_by: impl Into<String>,
        version_at: DateTime<Utc>,
    ) -> Self {
        Self {
            content: content.into(),
            edited_by: edited_by.into(),
            version_at,
        }
    }
}

/// Append `entry` to `history`, dropping the oldest entries beyond `max_history`.
pub fn push_capped<T>(history: &mut Vec<T>, entry: T, max_history: usize) {
    history.push(entry);
    if history.len() > max_history {
        let overflow = history.len() - max_history;
        history.drain(..overflow);
    }
}
