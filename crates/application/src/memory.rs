//! 内存版存储实现（用于测试和单机简单部署）。
//!
//! 与 PostgreSQL 实现遵守完全相同的契约，包括选票唯一冲突和
//! 条件化的激活状态迁移。

use async_trait::async_trait;
use domain::{
    Ballot, ChatMessage, Participant, Poll, PollId, RepositoryError, SessionId, Timestamp,
};
use tokio::sync::RwLock;

use crate::repository::{
    BallotRepository, ChatMessageRepository, PollRepository, SessionRepository,
};

/// 按创建顺序保存投票。
#[derive(Default)]
pub struct InMemoryPollRepository {
    polls: RwLock<Vec<Poll>>,
}

impl InMemoryPollRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PollRepository for InMemoryPollRepository {
    async fn create(&self, poll: Poll) -> Result<Poll, RepositoryError> {
        let mut polls = self.polls.write().await;
        if polls.iter().any(|existing| existing.id == poll.id) {
            return Err(RepositoryError::Conflict);
        }
        polls.push(poll.clone());
        Ok(poll)
    }

    async fn find_active(&self) -> Result<Option<Poll>, RepositoryError> {
        let polls = self.polls.read().await;
        Ok(polls.iter().find(|poll| poll.is_active).cloned())
    }

    async fn find_by_id(&self, id: PollId) -> Result<Option<Poll>, RepositoryError> {
        let polls = self.polls.read().await;
        Ok(polls.iter().find(|poll| poll.id == id).cloned())
    }

    async fn find_latest(&self) -> Result<Option<Poll>, RepositoryError> {
        let polls = self.polls.read().await;
        Ok(polls.last().cloned())
    }

    async fn update_activation(
        &self,
        id: PollId,
        active: bool,
        ended_at: Option<Timestamp>,
    ) -> Result<Option<Poll>, RepositoryError> {
        let mut polls = self.polls.write().await;
        let Some(poll) = polls.iter_mut().find(|poll| poll.id == id) else {
            return Ok(None);
        };
        // 状态未变化时视为迁移已被并发方完成
        if poll.is_active == active {
            return Ok(None);
        }
        poll.is_active = active;
        if !active && poll.ended_at.is_none() {
            poll.ended_at = ended_at;
        }
        Ok(Some(poll.clone()))
    }

    async fn list_ended(&self, limit: u32) -> Result<Vec<Poll>, RepositoryError> {
        let polls = self.polls.read().await;
        Ok(polls
            .iter()
            .rev()
            .filter(|poll| !poll.is_active)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryBallotRepository {
    ballots: RwLock<Vec<Ballot>>,
}

impl InMemoryBallotRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BallotRepository for InMemoryBallotRepository {
    async fn create(&self, ballot: Ballot) -> Result<Ballot, RepositoryError> {
        // 唯一性检查与插入在同一把写锁内完成
        let mut ballots = self.ballots.write().await;
        let duplicate = ballots.iter().any(|existing| {
            existing.poll_id == ballot.poll_id && existing.session_id == ballot.session_id
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        ballots.push(ballot.clone());
        Ok(ballot)
    }

    async fn find_one(
        &self,
        poll_id: PollId,
        session_id: &SessionId,
    ) -> Result<Option<Ballot>, RepositoryError> {
        let ballots = self.ballots.read().await;
        Ok(ballots
            .iter()
            .find(|ballot| ballot.poll_id == poll_id && &ballot.session_id == session_id)
            .cloned())
    }

    async fn list_for_poll(&self, poll_id: PollId) -> Result<Vec<Ballot>, RepositoryError> {
        let ballots = self.ballots.read().await;
        Ok(ballots
            .iter()
            .filter(|ballot| ballot.poll_id == poll_id)
            .cloned()
            .collect())
    }
}

/// 按加入顺序保存参与者。
#[derive(Default)]
pub struct InMemorySessionRepository {
    participants: RwLock<Vec<Participant>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find(&self, session_id: &SessionId) -> Result<Option<Participant>, RepositoryError> {
        let participants = self.participants.read().await;
        Ok(participants
            .iter()
            .find(|participant| &participant.session_id == session_id)
            .cloned())
    }

    async fn upsert(&self, participant: Participant) -> Result<Participant, RepositoryError> {
        let mut participants = self.participants.write().await;
        match participants
            .iter_mut()
            .find(|existing| existing.session_id == participant.session_id)
        {
            Some(existing) => *existing = participant.clone(),
            None => participants.push(participant.clone()),
        }
        Ok(participant)
    }

    async fn mark_removed(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Participant>, RepositoryError> {
        let mut participants = self.participants.write().await;
        let Some(participant) = participants
            .iter_mut()
            .find(|participant| &participant.session_id == session_id)
        else {
            return Ok(None);
        };
        participant.mark_removed();
        Ok(Some(participant.clone()))
    }

    async fn list_active(&self) -> Result<Vec<Participant>, RepositoryError> {
        let participants = self.participants.read().await;
        Ok(participants
            .iter()
            .filter(|participant| !participant.is_removed)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryChatMessageRepository {
    messages: RwLock<Vec<ChatMessage>>,
}

impl InMemoryChatMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatMessageRepository for InMemoryChatMessageRepository {
    async fn append(&self, message: ChatMessage) -> Result<ChatMessage, RepositoryError> {
        let mut messages = self.messages.write().await;
        messages.push(message.clone());
        Ok(message)
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<ChatMessage>, RepositoryError> {
        let messages = self.messages.read().await;
        Ok(messages
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
