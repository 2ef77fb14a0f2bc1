use std::sync::Arc;

use application::{
    ChatService, ChatServiceDependencies, InMemoryBallotRepository, InMemoryChatMessageRepository,
    InMemoryPollRepository, InMemorySessionRepository, LocalEventBroadcaster, PollService,
    PollServiceDependencies, SessionService, SessionServiceDependencies, SystemClock,
    TimerAuthority, VoteService, VoteServiceDependencies,
};
use axum::Router;
use web_api::{router, AppState};

/// 用内存存储装配完整的应用，端到端测试不依赖外部数据库。
pub fn build_router() -> Router {
    let clock: Arc<dyn application::Clock> = Arc::new(SystemClock);
    let broadcaster = Arc::new(LocalEventBroadcaster::default());

    let poll_repository = Arc::new(InMemoryPollRepository::new());
    let ballot_repository = Arc::new(InMemoryBallotRepository::new());
    let session_repository = Arc::new(InMemorySessionRepository::new());
    let chat_repository = Arc::new(InMemoryChatMessageRepository::new());

    let poll_service = Arc::new(PollService::new(PollServiceDependencies {
        poll_repository,
        ballot_repository: ballot_repository.clone(),
        clock: clock.clone(),
        broadcaster: broadcaster.clone(),
    }));

    let vote_service = Arc::new(VoteService::new(VoteServiceDependencies {
        poll_service: poll_service.clone(),
        ballot_repository,
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
        clock,
    ));

    let state = AppState::new(
        poll_service,
        vote_service,
        session_service,
        chat_service,
        timer,
        broadcaster,
    );

    router(state)
}
