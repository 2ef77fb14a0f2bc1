//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务：投票生命周期、投票准入、
//! 会话名册、聊天转发，以及计时器权威和事件广播抽象。

pub mod admission;
pub mod clock;
pub mod dto;
pub mod error;
pub mod events;
pub mod local_broadcast;
pub mod memory;
pub mod repository;
pub mod services;
pub mod timer;

#[cfg(test)]
mod test_support;

pub use admission::{AdmissionGate, AdmissionPermit};
pub use clock::{Clock, SystemClock};
pub use dto::PollWithResults;
pub use error::ApplicationError;
pub use events::{BroadcastError, EventBroadcaster, PollEvent};
pub use local_broadcast::LocalEventBroadcaster;
pub use memory::{
    InMemoryBallotRepository, InMemoryChatMessageRepository, InMemoryPollRepository,
    InMemorySessionRepository,
};
pub use repository::{
    BallotRepository, ChatMessageRepository, PollRepository, SessionRepository,
};
pub use services::{
    ChatService, ChatServiceDependencies, PollService, PollServiceDependencies, SessionService,
    SessionServiceDependencies, VoteService, VoteServiceDependencies,
};
pub use timer::TimerAuthority;
