use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{ChatMessageId, Timestamp};

const MAX_CONTENT_LEN: usize = 2000;

/// 消息发送方角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
    Presenter,
    Student,
}

/// 聊天消息，追加写入，绝不修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: ChatMessageId,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_role: SenderRole,
    pub content: String,
    pub sent_at: Timestamp,
}

impl ChatMessage {
    pub fn new(
        id: ChatMessageId,
        sender_id: impl Into<String>,
        sender_name: impl Into<String>,
        sender_role: SenderRole,
        content: impl Into<String>,
        sent_at: Timestamp,
    ) -> Result<Self, DomainError> {
        let sender_id = sender_id.into();
        let sender_name = sender_name.into();
        let content = content.into();

        if sender_id.trim().is_empty() {
            return Err(DomainError::invalid_argument("sender_id", "cannot be empty"));
        }
        if sender_name.trim().is_empty() {
            return Err(DomainError::invalid_argument(
                "sender_name",
                "cannot be empty",
            ));
        }
        if content.trim().is_empty() {
            return Err(DomainError::invalid_argument("content", "cannot be empty"));
        }
        if content.len() > MAX_CONTENT_LEN {
            return Err(DomainError::invalid_argument("content", "too long"));
        }

        Ok(Self {
            id,
            sender_id,
            sender_name,
            sender_role,
            content,
            sent_at,
        })
    }
}
