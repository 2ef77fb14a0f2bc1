//! 基础设施层：PostgreSQL 存储实现。

pub mod repository;

pub use repository::{
    create_pg_pool, PgBallotRepository, PgChatMessageRepository, PgPollRepository,
    PgSessionRepository,
};
