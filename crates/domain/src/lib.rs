//! 投票系统核心领域模型
//!
//! 包含投票、选票、参与者、聊天消息等核心实体，以及相关的业务规则。

pub mod ballot;
pub mod chat;
pub mod errors;
pub mod participant;
pub mod poll;
pub mod tally;
pub mod value_objects;

// 重新导出常用类型
pub use ballot::Ballot;
pub use chat::{ChatMessage, SenderRole};
pub use errors::{DomainError, RepositoryError};
pub use participant::Participant;
pub use poll::{Poll, PollOption};
pub use tally::{OptionTally, Tally};
pub use value_objects::{
    BallotId, ChatMessageId, OptionId, ParticipantName, PollId, SessionId, Timestamp,
};
