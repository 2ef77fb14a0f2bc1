//! 测试共用的夹具：手动时钟与服务装配。

use std::sync::{Arc, Mutex};

use chrono::{Duration as ChronoDuration, Utc};
use domain::{DomainError, Poll, PollId, PollOption, Timestamp};
use uuid::Uuid;

use crate::{
    clock::Clock,
    dto::PollWithResults,
    error::ApplicationError,
    local_broadcast::LocalEventBroadcaster,
    memory::{
        InMemoryBallotRepository, InMemoryChatMessageRepository, InMemoryPollRepository,
        InMemorySessionRepository,
    },
    repository::{BallotRepository, PollRepository},
    services::{
        chat_service::{ChatService, ChatServiceDependencies},
        poll_service::{CreatePollRequest, PollOptionInput, PollService, PollServiceDependencies},
        session_service::{SessionService, SessionServiceDependencies},
        vote_service::{SubmitVoteRequest, VoteService, VoteServiceDependencies},
    },
    timer::TimerAuthority,
};

/// 手动推进的时钟，用于确定性的过期与倒计时测试。
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn starting_now() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Utc::now()),
        })
    }

    pub fn advance(&self, delta: ChronoDuration) {
        let mut now = self.now.lock().unwrap();
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap()
    }
}

pub fn fixture_options() -> Vec<PollOptionInput> {
    vec![
        PollOptionInput {
            id: "a".to_string(),
            text: "Option A".to_string(),
            is_correct: true,
        },
        PollOptionInput {
            id: "b".to_string(),
            text: "Option B".to_string(),
            is_correct: false,
        },
    ]
}

pub struct TestContext {
    pub clock: Arc<ManualClock>,
    pub broadcaster: Arc<LocalEventBroadcaster>,
    pub poll_repository: Arc<InMemoryPollRepository>,
    pub ballot_repository: Arc<dyn BallotRepository>,
    pub poll_service: Arc<PollService>,
    pub vote_service: Arc<VoteService>,
    pub session_service: Arc<SessionService>,
    pub chat_service: Arc<ChatService>,
    pub timer: Arc<TimerAuthority>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_ballot_repository(Arc::new(InMemoryBallotRepository::new()))
    }

    /// 允许注入选票存储的测试替身（例如模拟漏过预检查的并发冲突）。
    pub fn with_ballot_repository(ballot_repository: Arc<dyn BallotRepository>) -> Self {
        let clock = ManualClock::starting_now();
        let broadcaster = Arc::new(LocalEventBroadcaster::default());
        let poll_repository = Arc::new(InMemoryPollRepository::new());
        let session_repository = Arc::new(InMemorySessionRepository::new());
        let chat_repository = Arc::new(InMemoryChatMessageRepository::new());

        let poll_service = Arc::new(PollService::new(PollServiceDependencies {
            poll_repository: poll_repository.clone(),
            ballot_repository: ballot_repository.clone(),
            clock: clock.clone(),
            broadcaster: broadcaster.clone(),
        }));

        let vote_service = Arc::new(VoteService::new(VoteServiceDependencies {
            poll_service: poll_service.clone(),
            ballot_repository: ballot_repository.clone(),
            clock: clock.clone(),
            broadcaster: broadcaster.clone(),
        }));

        let session_service = Arc::new(SessionService::new(SessionServiceDependencies {
            session_repository,
            clock: clock.clone(),
            broadcaster: broadcaster.clone(),
        }));

        let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
            chat_repository,
            clock: clock.clone(),
            broadcaster: broadcaster.clone(),
        }));

        let timer = Arc::new(TimerAuthority::new(
            poll_service.clone(),
            broadcaster.clone(),
            clock.clone(),
        ));

        Self {
            clock,
            broadcaster,
            poll_repository,
            ballot_repository,
            poll_service,
            vote_service,
            session_service,
            chat_service,
            timer,
        }
    }

    pub async fn create_poll(
        &self,
        options: Vec<PollOptionInput>,
        duration_secs: i64,
    ) -> PollWithResults {
        self.poll_service
            .create_poll(CreatePollRequest {
                question: "What is the answer?".to_string(),
                options,
                duration_secs,
            })
            .await
            .expect("create poll")
    }

    /// 直接向存储写入一个开始于过去某刻的活跃投票，
    /// 模拟进程重启后留下的持久化状态。
    pub async fn seed_active_poll(
        &self,
        options: Vec<PollOptionInput>,
        duration_secs: i64,
        started_ago: ChronoDuration,
    ) -> PollId {
        let options = options
            .into_iter()
            .map(|option| {
                Ok(PollOption {
                    id: domain::OptionId::parse(option.id)?,
                    text: option.text,
                    is_correct: option.is_correct,
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()
            .expect("options");

        let poll = Poll::create(
            PollId::from(Uuid::new_v4()),
            "Seeded question",
            options,
            duration_secs,
            self.clock.now() - started_ago,
        )
        .expect("poll");
        let stored = self.poll_repository.create(poll).await.expect("store poll");
        stored.id
    }

    pub async fn vote(
        &self,
        poll_id: PollId,
        option_id: &str,
        participant_id: &str,
    ) -> Result<domain::Ballot, ApplicationError> {
        self.vote_service
            .submit_vote(SubmitVoteRequest {
                poll_id: poll_id.into(),
                option_id: option_id.to_string(),
                participant_id: participant_id.to_string(),
                participant_name: format!("participant {}", participant_id),
            })
            .await
    }
}
