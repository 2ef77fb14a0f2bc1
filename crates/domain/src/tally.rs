//! 计票。派生数据，从选票集合按需重算，从不落盘缓存。

use serde::{Deserialize, Serialize};

use crate::ballot::Ballot;
use crate::poll::Poll;
use crate::value_objects::OptionId;

/// 单个选项的计票结果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionTally {
    pub option_id: OptionId,
    pub text: String,
    pub votes: u64,
    /// 四舍五入到整数百分比；各选项独立取整，不保证合计恰为 100
    pub percentage: u32,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub results: Vec<OptionTally>,
    pub total_votes: u64,
}

impl Tally {
    /// 按投票的选项顺序统计选票。不属于任何选项的选票不会出现
    /// （准入控制保证不会产生这样的选票）。
    pub fn compute(poll: &Poll, ballots: &[Ballot]) -> Self {
        let total_votes = ballots.len() as u64;

        let results = poll
            .options
            .iter()
            .map(|option| {
                let votes = ballots
                    .iter()
                    .filter(|ballot| ballot.option_id == option.id)
                    .count() as u64;
                let percentage = if total_votes > 0 {
                    ((votes as f64 / total_votes as f64) * 100.0).round() as u32
                } else {
                    0
                };
                OptionTally {
                    option_id: option.id.clone(),
                    text: option.text.clone(),
                    votes,
                    percentage,
                    is_correct: option.is_correct,
                }
            })
            .collect();

        Self {
            results,
            total_votes,
        }
    }
}
