use std::collections::HashSet;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{OptionId, PollId, Timestamp};

/// 投票选项，创建后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: OptionId,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// 投票实体。系统级不变量：任意时刻最多只有一个 `is_active` 的投票。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub question: String,
    pub options: Vec<PollOption>,
    /// 投票窗口时长（秒）
    pub duration_secs: i64,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub is_active: bool,
}

impl Poll {
    /// 创建新投票并校验输入。生命周期管理器负责在调用前关闭旧投票。
    pub fn create(
        id: PollId,
        question: impl Into<String>,
        options: Vec<PollOption>,
        duration_secs: i64,
        started_at: Timestamp,
    ) -> Result<Self, DomainError> {
        let question = question.into().trim().to_owned();
        if question.is_empty() {
            return Err(DomainError::invalid_argument("question", "cannot be empty"));
        }
        if options.is_empty() {
            return Err(DomainError::invalid_argument(
                "options",
                "at least one option is required",
            ));
        }
        let mut seen = HashSet::new();
        for option in &options {
            if option.text.trim().is_empty() {
                return Err(DomainError::invalid_argument(
                    "options",
                    "option text cannot be empty",
                ));
            }
            if !seen.insert(option.id.clone()) {
                return Err(DomainError::invalid_argument(
                    "options",
                    format!("duplicate option id: {}", option.id),
                ));
            }
        }
        if duration_secs <= 0 {
            return Err(DomainError::invalid_argument(
                "duration",
                "must be positive",
            ));
        }

        Ok(Self {
            id,
            question,
            options,
            duration_secs,
            started_at,
            ended_at: None,
            is_active: true,
        })
    }

    /// 投票窗口的绝对截止时间。
    pub fn expires_at(&self) -> Timestamp {
        self.started_at + Duration::seconds(self.duration_secs)
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at()
    }

    /// 剩余秒数，向下取整并截断到 0。
    pub fn remaining_time(&self, now: Timestamp) -> i64 {
        (self.expires_at() - now).num_seconds().max(0)
    }

    pub fn has_option(&self, option_id: &OptionId) -> bool {
        self.options.iter().any(|option| &option.id == option_id)
    }

    /// 结束投票。幂等：已结束的投票保持原有结束时间。
    pub fn end(&mut self, now: Timestamp) {
        if self.is_active {
            self.is_active = false;
        }
        if self.ended_at.is_none() {
            self.ended_at = Some(now);
        }
    }
}
