pub mod chat_service;
pub mod poll_service;
pub mod session_service;
pub mod vote_service;

pub use chat_service::{
    ChatService, ChatServiceDependencies, SendChatRequest, DEFAULT_BACKLOG_LIMIT,
};
pub use poll_service::{
    CreatePollRequest, PollOptionInput, PollService, PollServiceDependencies,
    DEFAULT_HISTORY_LIMIT,
};
pub use session_service::{RegisterRequest, SessionService, SessionServiceDependencies};
pub use vote_service::{SubmitVoteRequest, VoteService, VoteServiceDependencies};

#[cfg(test)]
mod vote_service_tests;
