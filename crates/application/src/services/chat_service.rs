use std::sync::Arc;

use domain::{ChatMessage, ChatMessageId, SenderRole};
use uuid::Uuid;

use crate::{
    clock::Clock,
    error::ApplicationError,
    events::{EventBroadcaster, PollEvent},
    repository::ChatMessageRepository,
};

/// 新连接回放的聊天回溯窗口
pub const DEFAULT_BACKLOG_LIMIT: u32 = 50;

#[derive(Debug, Clone)]
pub struct SendChatRequest {
    pub sender_id: String,
    pub sender_name: String,
    pub sender_role: SenderRole,
    pub content: String,
}

pub struct ChatServiceDependencies {
    pub chat_repository: Arc<dyn ChatMessageRepository>,
    pub clock: Arc<dyn Clock>,
    pub broadcaster: Arc<dyn EventBroadcaster>,
}

pub struct ChatService {
    deps: ChatServiceDependencies,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn send(&self, request: SendChatRequest) -> Result<ChatMessage, ApplicationError> {
        let message = ChatMessage::new(
            ChatMessageId::from(Uuid::new_v4()),
            request.sender_id,
            request.sender_name,
            request.sender_role,
            request.content,
            self.deps.clock.now(),
        )?;

        let stored = self.deps.chat_repository.append(message).await?;
        self.deps
            .broadcaster
            .publish(PollEvent::ChatMessage {
                message: stored.clone(),
            })
            .await?;
        Ok(stored)
    }

    /// 最近的聊天记录，按时间顺序返回。
    pub async fn recent(&self, limit: u32) -> Result<Vec<ChatMessage>, ApplicationError> {
        let mut messages = self.deps.chat_repository.list_recent(limit).await?;
        messages.reverse();
        Ok(messages)
    }
}
