use domain::{Ballot, OptionTally, Poll, PollId, PollOption, Tally, Timestamp};
use serde::{Deserialize, Serialize};

/// 投票快照：实体字段加上按需计算的计票与剩余时间。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollWithResults {
    pub id: PollId,
    pub question: String,
    pub options: Vec<PollOption>,
    pub duration_secs: i64,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub is_active: bool,
    pub results: Vec<OptionTally>,
    pub total_votes: u64,
    pub remaining_time: i64,
}

impl PollWithResults {
    pub fn from_parts(poll: Poll, ballots: &[Ballot], now: Timestamp) -> Self {
        let Tally {
            results,
            total_votes,
        } = Tally::compute(&poll, ballots);
        let remaining_time = poll.remaining_time(now);

        Self {
            id: poll.id,
            question: poll.question,
            options: poll.options,
            duration_secs: poll.duration_secs,
            started_at: poll.started_at,
            ended_at: poll.ended_at,
            is_active: poll.is_active,
            results,
            total_votes,
            remaining_time,
        }
    }
}
