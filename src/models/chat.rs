use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One line of a document's chat log.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "StoredChatLine")]
pub struct ChatLine {
    pub who: String,
    pub msg: String,
    pub at: DateTime<Utc>,
}

impl ChatLine {
    pub fn new(who: impl Into<String>, msg: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            who: who.into(),
            msg: msg.into(),
            at,
        }
    }
}

/// Shape of a chat line as found in the store.
///
/// Older logs hold plain `"who:msg"` strings. They are folded into
/// [`ChatLine`] here so nothing past the store boundary sees them.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredChatLine {
    Line {
        who: String,
        msg: String,
        at: DateTime<Utc>,
    },
    Legacy(String),
}

impl From<StoredChatLine> for ChatLine {
    fn from(stored: StoredChatLine) -> Self {
        match stored {
            StoredChatLine::Line { who, msg, at } => ChatLine { who, msg, at },
            StoredChatLine::Legacy(line) => {
                let (who, msg) = line.split_once(':').unwrap_or((line.as_str(), ""));
                ChatLine::new(who, msg, DateTime::<Utc>::UNIX_EPOCH)
            }
        }
    }
}
