use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PersistError, Result};

pub const DEFAULT_TITLE: &str = "New Conversation";
pub const MAX_TITLE_CHARS: usize = 200;

/// Database-agnostic conversation record
///
/// `id` doubles as the thread identifier addressing the conversation's
/// checkpoints. It is assigned once at creation and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationRecord {
    /// Fresh record with a new identifier; a missing or blank title falls
    /// back to [`DEFAULT_TITLE`]
    pub fn new(owner_id: impl Into<String>, title: Option<&str>) -> Result<Self> {
        let title = match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => normalize_title(t)?,
            None => DEFAULT_TITLE.to_string(),
        };
        let now = Utc::now();

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            title,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }
}

/// Trim and bound a user-supplied title
pub fn normalize_title(raw: &str) -> Result<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(PersistError::InvalidTitle("title cannot be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(PersistError::InvalidTitle(format!(
            "title exceeds {} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(title.to_string())
}
