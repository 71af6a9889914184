use serde::{Deserialize, Serialize};

/// Role of a generation-request message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One message of the ordered generation request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Injection position understood by the host. Only in-chat placement is
/// produced by the projector.
pub const POSITION_IN_CHAT: &str = "in-chat";

/// The single injectable text block handed to the host. `depth` is the
/// number of transcript entries after the summarized boundary — the
/// trailing turns the host should keep in full alongside the summary.
/// Absence of an injection (the projector returning `None`) instructs the
/// host to remove any prior block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptInjection {
    pub value: String,
    pub position: String,
    pub depth: usize,
    pub role: ChatRole,
}

impl PromptInjection {
    pub fn in_chat(value: impl Into<String>, depth: usize) -> Self {
        Self {
            value: value.into(),
            position: POSITION_IN_CHAT.to_string(),
            depth,
            role: ChatRole::Assistant,
        }
    }
}
