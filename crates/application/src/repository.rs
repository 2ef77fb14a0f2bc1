use async_trait::async_trait;
use domain::{
    Ballot, ChatMessage, Participant, Poll, PollId, RepositoryError, SessionId, Timestamp,
};

#[async_trait]
pub trait PollRepository: Send + Sync {
    async fn create(&self, poll: Poll) -> Result<Poll, RepositoryError>;
    async fn find_active(&self) -> Result<Option<Poll>, RepositoryError>;
    async fn find_by_id(&self, id: PollId) -> Result<Option<Poll>, RepositoryError>;
    async fn find_latest(&self) -> Result<Option<Poll>, RepositoryError>;
    /// 条件化的激活状态迁移：仅当投票存在且状态确实发生变化时返回
    /// 更新后的投票。并发的结束尝试中第一个提交者胜出，其余拿到 None。
    async fn update_activation(
        &self,
        id: PollId,
        active: bool,
        ended_at: Option<Timestamp>,
    ) -> Result<Option<Poll>, RepositoryError>;
    async fn list_ended(&self, limit: u32) -> Result<Vec<Poll>, RepositoryError>;
}

#[async_trait]
pub trait BallotRepository: Send + Sync {
    /// (poll_id, session_id) 已存在时返回 `RepositoryError::Conflict`。
    async fn create(&self, ballot: Ballot) -> Result<Ballot, RepositoryError>;
    async fn find_one(
        &self,
        poll_id: PollId,
        session_id: &SessionId,
    ) -> Result<Option<Ballot>, RepositoryError>;
    async fn list_for_poll(&self, poll_id: PollId) -> Result<Vec<Ballot>, RepositoryError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn find(&self, session_id: &SessionId) -> Result<Option<Participant>, RepositoryError>;
    async fn upsert(&self, participant: Participant) -> Result<Participant, RepositoryError>;
    async fn mark_removed(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Participant>, RepositoryError>;
    async fn list_active(&self) -> Result<Vec<Participant>, RepositoryError>;
}

#[async_trait]
pub trait ChatMessageRepository: Send + Sync {
    async fn append(&self, message: ChatMessage) -> Result<ChatMessage, RepositoryError>;
    /// 最近的消息，时间倒序。
    async fn list_recent(&self, limit: u32) -> Result<Vec<ChatMessage>, RepositoryError>;
}
