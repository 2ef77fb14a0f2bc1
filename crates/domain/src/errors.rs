//! 领域错误定义
//!
//! 所有投票准入和生命周期的拒绝原因都以错误值的形式返回给调用方，
//! 网关层将其渲染为带稳定错误码的失败响应，绝不向外抛出。

use thiserror::Error;

/// 领域错误类型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    /// 投票请求缺少参与者标识
    #[error("participant identification required")]
    InvalidParticipant,

    #[error("poll not found")]
    PollNotFound,

    #[error("no active poll found")]
    NoActivePoll,

    /// 请求投的票已不是当前活跃投票
    #[error("poll is no longer active")]
    PollNotActive,

    #[error("poll has expired")]
    PollExpired,

    #[error("invalid option")]
    InvalidOption,

    #[error("already voted on this poll")]
    AlreadyVoted,

    /// 同一参与者对同一投票的另一次提交正在进行中
    #[error("vote submission in progress")]
    SubmissionInProgress,

    /// 被移除的会话不允许再次注册
    #[error("removed from the session")]
    ParticipantRemoved,

    #[error("participant not found")]
    ParticipantNotFound,
}

impl DomainError {
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 存储层错误。Conflict 对应持久层唯一约束冲突。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict,
    #[error("storage error: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}
