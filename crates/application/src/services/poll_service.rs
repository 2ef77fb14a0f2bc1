//! 投票生命周期管理。
//!
//! 状态机：Active → Ended。创建新投票前强制结束当前活跃投票，
//! 保证系统内任意时刻最多一个活跃投票；结束操作幂等，终态事件
//! 只在第一次成功的状态迁移时发布。

use std::sync::Arc;

use domain::{DomainError, OptionId, Poll, PollId, PollOption};
use uuid::Uuid;

use crate::{
    clock::Clock,
    dto::PollWithResults,
    error::ApplicationError,
    events::{EventBroadcaster, PollEvent},
    repository::{BallotRepository, PollRepository},
};

/// 历史查询的默认窗口
pub const DEFAULT_HISTORY_LIMIT: u32 = 20;

#[derive(Debug, Clone)]
pub struct PollOptionInput {
    pub id: String,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone)]
pub struct CreatePollRequest {
    pub question: String,
    pub options: Vec<PollOptionInput>,
    pub duration_secs: i64,
}

pub struct PollServiceDependencies {
    pub poll_repository: Arc<dyn PollRepository>,
    pub ballot_repository: Arc<dyn BallotRepository>,
    pub clock: Arc<dyn Clock>,
    pub broadcaster: Arc<dyn EventBroadcaster>,
}

pub struct PollService {
    deps: PollServiceDependencies,
}

impl PollService {
    pub fn new(deps: PollServiceDependencies) -> Self {
        Self { deps }
    }

    /// 创建并激活新投票。任何仍在活跃的投票会先被强制结束，
    /// 被顶替的投票不再单独发布终态事件。
    pub async fn create_poll(
        &self,
        request: CreatePollRequest,
    ) -> Result<PollWithResults, ApplicationError> {
        let options = request
            .options
            .into_iter()
            .map(|option| {
                Ok(PollOption {
                    id: OptionId::parse(option.id)?,
                    text: option.text,
                    is_correct: option.is_correct,
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        let now = self.deps.clock.now();

        if let Some(active) = self.deps.poll_repository.find_active().await? {
            self.deps
                .poll_repository
                .update_activation(active.id, false, Some(now))
                .await?;
        }

        let poll = Poll::create(
            PollId::from(Uuid::new_v4()),
            request.question,
            options,
            request.duration_secs,
            now,
        )?;
        let stored = self.deps.poll_repository.create(poll).await?;

        tracing::info!(poll_id = %stored.id, duration_secs = stored.duration_secs, "poll created");

        let snapshot = self.snapshot(stored).await?;
        self.deps
            .broadcaster
            .publish(PollEvent::PollCreated {
                poll: snapshot.clone(),
            })
            .await?;
        Ok(snapshot)
    }

    /// 结束投票。幂等：已结束的投票直接返回快照且不发布事件；
    /// 并发的结束尝试（计时器到期 vs 手动结束）以先提交者为准。
    pub async fn end_poll(&self, poll_id: PollId) -> Result<PollWithResults, ApplicationError> {
        let poll = self
            .deps
            .poll_repository
            .find_by_id(poll_id)
            .await?
            .ok_or(DomainError::PollNotFound)?;

        if !poll.is_active {
            return self.snapshot(poll).await;
        }

        let now = self.deps.clock.now();
        match self
            .deps
            .poll_repository
            .update_activation(poll_id, false, Some(now))
            .await?
        {
            Some(ended) => {
                tracing::info!(poll_id = %poll_id, "poll ended");
                let snapshot = self.snapshot(ended).await?;
                self.deps
                    .broadcaster
                    .publish(PollEvent::PollEnded {
                        poll: snapshot.clone(),
                    })
                    .await?;
                Ok(snapshot)
            }
            // 另一个结束操作抢先提交，这里退化为无副作用读取
            None => self.poll_with_results(poll_id).await,
        }
    }

    pub async fn active_poll(&self) -> Result<Option<Poll>, ApplicationError> {
        Ok(self.deps.poll_repository.find_active().await?)
    }

    pub async fn poll_with_results(
        &self,
        poll_id: PollId,
    ) -> Result<PollWithResults, ApplicationError> {
        let poll = self
            .deps
            .poll_repository
            .find_by_id(poll_id)
            .await?
            .ok_or(DomainError::PollNotFound)?;
        self.snapshot(poll).await
    }

    /// 活跃的或最近开始的投票，从未有投票时为 None。
    pub async fn latest_with_results(&self) -> Result<Option<PollWithResults>, ApplicationError> {
        match self.deps.poll_repository.find_latest().await? {
            Some(poll) => Ok(Some(self.snapshot(poll).await?)),
            None => Ok(None),
        }
    }

    /// 最近结束的投票，按开始时间倒序，各自带计票结果。
    pub async fn history(&self, limit: u32) -> Result<Vec<PollWithResults>, ApplicationError> {
        let polls = self.deps.poll_repository.list_ended(limit).await?;
        let mut snapshots = Vec::with_capacity(polls.len());
        for poll in polls {
            snapshots.push(self.snapshot(poll).await?);
        }
        Ok(snapshots)
    }

    async fn snapshot(&self, poll: Poll) -> Result<PollWithResults, ApplicationError> {
        let ballots = self.deps.ballot_repository.list_for_poll(poll.id).await?;
        Ok(PollWithResults::from_parts(
            poll,
            &ballots,
            self.deps.clock.now(),
        ))
    }
}
