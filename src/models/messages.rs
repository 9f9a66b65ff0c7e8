use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::models::{ChatLine, Color, Version};

// Client -> server payloads.
// Missing `docId` fields decode as empty strings and are dropped by the hub.

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct SetNameMessage {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct JoinDocMessage {
    #[serde(default)]
    pub doc_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TextChangeMessage {
    #[serde(default)]
    pub doc_id: String,
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VersionRequestMessage {
    #[serde(default)]
    pub doc_id: String,
    pub index: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestMessage {
    #[serde(default)]
    pub doc_id: String,
    #[serde(default)]
    pub msg: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TypingRequestMessage {
    #[serde(default)]
    pub doc_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CursorRequestMessage {
    #[serde(default)]
    pub doc_id: String,
    pub position: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ReceivedMessage {
    #[serde(rename = "set-name")]
    SetName(SetNameMessage),
    #[serde(rename = "join-doc")]
    JoinDoc(JoinDocMessage),
    #[serde(rename = "text-change")]
    TextChange(TextChangeMessage),
    #[serde(rename = "view-version")]
    ViewVersion(VersionRequestMessage),
    #[serde(rename = "restore-version")]
    RestoreVersion(VersionRequestMessage),
    #[serde(rename = "chat-message")]
    ChatMessage(ChatRequestMessage),
    #[serde(rename = "typing")]
    Typing(TypingRequestMessage),
    #[serde(rename = "cursor-update")]
    CursorUpdate(CursorRequestMessage),
}

// Server -> client payloads.

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceMessage {
    pub count: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocContentMessage {
    pub doc_id: String,
    pub content: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryMessage {
    pub history: Vec<Version>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VersionViewMessage {
    pub doc_id: String,
    pub index: usize,
    pub version: Option<Version>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VersionRestoredMessage {
    pub content: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryMessage {
    pub messages: Vec<ChatLine>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TypingMessage {
    pub who: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CursorMessage {
    pub connection_id: Uuid,
    pub who: String,
    pub position: u64,
    pub color: Color,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum SendMessage {
    #[serde(rename = "presence-update")]
    PresenceUpdate(PresenceMessage),
    #[serde(rename = "init-doc")]
    InitDoc(DocContentMessage),
    #[serde(rename = "update-text")]
    UpdateText(DocContentMessage),
    #[serde(rename = "history-data")]
    HistoryData(HistoryMessage),
    #[serde(rename = "version-view")]
    VersionView(VersionViewMessage),
    #[serde(rename = "version-restored")]
    VersionRestored(VersionRestoredMessage),
    #[serde(rename = "chat-message")]
    ChatMessage(ChatLine),
    #[serde(rename = "chat-history")]
    ChatHistory(ChatHistoryMessage),
    #[serde(rename = "typing")]
    Typing(TypingMessage),
    #[serde(rename = "cursor-update")]
    CursorUpdate(CursorMessage),
}
