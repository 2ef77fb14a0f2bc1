use serde::{Deserialize, Serialize};

use crate::value_objects::{BallotId, OptionId, ParticipantName, PollId, SessionId, Timestamp};

/// 一名参与者对一个投票的唯一选择。创建后不可变，永不更新。
///
/// (poll_id, session_id) 的唯一性由两层保障：进程内准入锁（快速路径）
/// 与持久层唯一约束（最终权威）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub id: BallotId,
    pub poll_id: PollId,
    pub option_id: OptionId,
    pub session_id: SessionId,
    pub participant_name: ParticipantName,
    pub cast_at: Timestamp,
}

impl Ballot {
    pub fn new(
        id: BallotId,
        poll_id: PollId,
        option_id: OptionId,
        session_id: SessionId,
        participant_name: ParticipantName,
        cast_at: Timestamp,
    ) -> Self {
        Self {
            id,
            poll_id,
            option_id,
            session_id,
            participant_name,
            cast_at,
        }
    }
}
