use serde::{Deserialize, Serialize};

/// Who produced a transcript entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerRole {
    User,
    Character,
    System,
}

impl SpeakerRole {
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Character => "character",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for SpeakerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry of the append-only transcript. Owned by the host; the engine
/// only ever reads a length and slices by index. Indices are 0-based,
/// stable, and never reordered — the sequence may only shrink from the tail.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub index: usize,
    pub role: SpeakerRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub text: String,
}

impl TranscriptEntry {
    pub fn new(index: usize, role: SpeakerRole, text: impl Into<String>) -> Self {
        Self {
            index,
            role,
            name: None,
            text: text.into(),
        }
    }

    pub fn named(
        index: usize,
        role: SpeakerRole,
        name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            index,
            role,
            name: Some(name.into()),
            text: text.into(),
        }
    }

    /// Display name for slice rendering: the entry's own name when present,
    /// otherwise the role label.
    pub fn speaker(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.role.label())
    }
}
