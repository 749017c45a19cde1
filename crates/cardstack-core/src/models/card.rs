//! Note card model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Category tag for a note card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardCategory {
    Character,
    Setting,
    Plot,
    Conflict,
    Dialogue,
    Theme,
    #[default]
    Other,
}

impl CardCategory {
    /// String form used in persisted rows and the remote store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Setting => "setting",
            Self::Plot => "plot",
            Self::Conflict => "conflict",
            Self::Dialogue => "dialogue",
            Self::Theme => "theme",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for CardCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardCategory {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "character" => Ok(Self::Character),
            "setting" => Ok(Self::Setting),
            "plot" => Ok(Self::Plot),
            "conflict" => Ok(Self::Conflict),
            "dialogue" => Ok(Self::Dialogue),
            "theme" => Ok(Self::Theme),
            "other" => Ok(Self::Other),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown card category: {other}"
            ))),
        }
    }
}

/// A note card inside a deck.
///
/// Invariant: `deck_id` references a deck that exists in the local store.
/// Children are always deleted before their parent, so the engine never
/// intentionally creates an orphan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Unique identifier (opaque string, UUID when generated locally)
    pub id: String,
    /// Parent deck
    pub deck_id: String,
    /// Card title
    pub title: String,
    /// Category tag
    pub category: CardCategory,
    /// Free-text body
    pub content: String,
    /// Owning user
    pub user_id: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms) - the LWW clock
    pub updated_at: i64,
    /// Whether the last local mutation has been acknowledged remotely
    pub synced: bool,
    /// Whether local mutations are still queued for upload
    pub pending_changes: bool,
}

impl Card {
    /// Create a new unsynced card. When `id` is `None` a UUID v7 is generated.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        deck_id: impl Into<String>,
        title: impl Into<String>,
        category: CardCategory,
        content: impl Into<String>,
        id: Option<String>,
    ) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: id.unwrap_or_else(|| Uuid::now_v7().to_string()),
            deck_id: deck_id.into(),
            title: title.into(),
            category,
            content: content.into(),
            user_id: user_id.into(),
            created_at: now,
            updated_at: now,
            synced: false,
            pending_changes: true,
        }
    }
}

/// Partial update for [`Card`] fields a caller may change.
#[derive(Debug, Clone, Default)]
pub struct CardPatch {
    /// New title, if changing
    pub title: Option<String>,
    /// New category, if changing
    pub category: Option<CardCategory>,
    /// New body, if changing
    pub content: Option<String>,
}
