//! 投票准入控制。
//!
//! 单一操作 `submit_vote`：校验后提交一张选票。进程内准入锁提供
//! 快速拒绝；持久层唯一约束是正确性的最终权威，即使进程内锁
//! 完全失效（进程重启、锁表被清），系统依然正确。

use std::sync::Arc;

use domain::{
    Ballot, BallotId, DomainError, OptionId, ParticipantName, PollId, RepositoryError, SessionId,
};
use uuid::Uuid;

use crate::{
    admission::AdmissionGate,
    clock::Clock,
    error::ApplicationError,
    events::{EventBroadcaster, PollEvent},
    repository::BallotRepository,
    services::poll_service::PollService,
};

#[derive(Debug, Clone)]
pub struct SubmitVoteRequest {
    pub poll_id: Uuid,
    pub option_id: String,
    pub participant_id: String,
    pub participant_name: String,
}

pub struct VoteServiceDependencies {
    pub poll_service: Arc<PollService>,
    pub ballot_repository: Arc<dyn BallotRepository>,
    pub clock: Arc<dyn Clock>,
    pub broadcaster: Arc<dyn EventBroadcaster>,
}

pub struct VoteService {
    deps: VoteServiceDependencies,
    admission: AdmissionGate,
}

impl VoteService {
    pub fn new(deps: VoteServiceDependencies) -> Self {
        Self {
            deps,
            admission: AdmissionGate::new(),
        }
    }

    pub async fn submit_vote(
        &self,
        request: SubmitVoteRequest,
    ) -> Result<Ballot, ApplicationError> {
        let session_id = SessionId::parse(request.participant_id)
            .map_err(|_| DomainError::InvalidParticipant)?;
        let participant_name = ParticipantName::parse(request.participant_name)
            .map_err(|_| DomainError::InvalidParticipant)?;
        let poll_id = PollId::from(request.poll_id);

        // 同一 (poll, participant) 的并发提交立即失败，不排队。
        // 许可在本函数所有退出路径上随 Drop 释放。
        let permit = self
            .admission
            .try_acquire(poll_id, session_id.clone())
            .ok_or(DomainError::SubmissionInProgress)?;

        let active = self
            .deps
            .poll_service
            .active_poll()
            .await?
            .ok_or(DomainError::NoActivePoll)?;
        if active.id != poll_id {
            // 主持人已开始另一个投票
            return Err(DomainError::PollNotActive.into());
        }

        let now = self.deps.clock.now();
        if active.is_expired(now) {
            return Err(DomainError::PollExpired.into());
        }

        let option_id =
            OptionId::parse(request.option_id).map_err(|_| DomainError::InvalidOption)?;
        if !active.has_option(&option_id) {
            return Err(DomainError::InvalidOption.into());
        }

        if self
            .deps
            .ballot_repository
            .find_one(poll_id, &session_id)
            .await?
            .is_some()
        {
            return Err(DomainError::AlreadyVoted.into());
        }

        let ballot = Ballot::new(
            BallotId::from(Uuid::new_v4()),
            poll_id,
            option_id,
            session_id,
            participant_name,
            now,
        );

        // 漏过进程内锁的竞争（例如重启后）在唯一约束这里兜底，
        // 冲突一律译为 AlreadyVoted，不向外透传存储错误。
        let stored = match self.deps.ballot_repository.create(ballot).await {
            Ok(ballot) => ballot,
            Err(RepositoryError::Conflict) => return Err(DomainError::AlreadyVoted.into()),
            Err(err) => return Err(err.into()),
        };
        // 选票已落盘，后续的计票广播不再需要准入互斥
        drop(permit);

        tracing::info!(
            poll_id = %poll_id,
            session_id = %stored.session_id,
            option_id = %stored.option_id,
            "vote accepted"
        );

        let snapshot = self.deps.poll_service.poll_with_results(poll_id).await?;
        self.deps
            .broadcaster
            .publish(PollEvent::ResultsUpdated { poll: snapshot })
            .await?;

        Ok(stored)
    }

    pub async fn has_voted(
        &self,
        poll_id: PollId,
        session_id: &SessionId,
    ) -> Result<bool, ApplicationError> {
        Ok(self
            .deps
            .ballot_repository
            .find_one(poll_id, session_id)
            .await?
            .is_some())
    }
}
