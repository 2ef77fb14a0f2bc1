//! 事件通道抽象。
//!
//! 每个改变状态的核心操作恰好发布一次对应事件，网关订阅后
//! 推送给所有已连接的客户端。投递语义为至少一次，消费方需容忍
//! 重复的 tick。

use async_trait::async_trait;
use domain::{ChatMessage, Participant, PollId, SessionId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dto::PollWithResults;

/// 广播给所有连接方的命名事件。线上格式使用点分事件名。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum PollEvent {
    #[serde(rename = "poll.created")]
    PollCreated { poll: PollWithResults },
    #[serde(rename = "poll.results-updated")]
    ResultsUpdated { poll: PollWithResults },
    #[serde(rename = "poll.ended")]
    PollEnded { poll: PollWithResults },
    #[serde(rename = "timer.tick")]
    TimerTick { poll_id: PollId, remaining_time: i64 },
    #[serde(rename = "roster.updated")]
    RosterUpdated { participants: Vec<Participant> },
    #[serde(rename = "participant.removed")]
    ParticipantRemoved { session_id: SessionId },
    #[serde(rename = "chat.message")]
    ChatMessage { message: ChatMessage },
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcast failed: {0}")]
    Failed(String),
}

impl BroadcastError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[async_trait]
pub trait EventBroadcaster: Send + Sync {
    async fn publish(&self, event: PollEvent) -> Result<(), BroadcastError>;
}
