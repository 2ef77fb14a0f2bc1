use std::sync::Arc;

use application::{
    ChatService, LocalEventBroadcaster, PollService, SessionService, TimerAuthority, VoteService,
};

#[derive(Clone)]
pub struct AppState {
    pub poll_service: Arc<PollService>,
    pub vote_service: Arc<VoteService>,
    pub session_service: Arc<SessionService>,
    pub chat_service: Arc<ChatService>,
    pub timer: Arc<TimerAuthority>,
    pub broadcaster: Arc<LocalEventBroadcaster>,
}

impl AppState {
    pub fn new(
        poll_service: Arc<PollService>,
        vote_service: Arc<VoteService>,
        session_service: Arc<SessionService>,
        chat_service: Arc<ChatService>,
        timer: Arc<TimerAuthority>,
        broadcaster: Arc<LocalEventBroadcaster>,
    ) -> Self {
        Self {
            poll_service,
            vote_service,
            session_service,
            chat_service,
            timer,
            broadcaster,
        }
    }
}
