//! 投票准入互斥。
//!
//! 按 (poll, participant) 键的互斥集合：同一参与者对同一投票的并发
//! 提交只允许一个在途，其余立即失败，不排队、不阻塞。许可通过
//! RAII 在任何退出路径上释放。持久层唯一约束才是正确性的最终
//! 权威，这里只负责亚毫秒级拒绝误触的重复提交。

use std::collections::HashSet;
use std::sync::Mutex;

use domain::{PollId, SessionId};

type AdmissionKey = (PollId, SessionId);

#[derive(Default)]
pub struct AdmissionGate {
    in_flight: Mutex<HashSet<AdmissionKey>>,
}

impl AdmissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// 尝试获取准入许可。键已被占用时返回 None。
    pub fn try_acquire(
        &self,
        poll_id: PollId,
        session_id: SessionId,
    ) -> Option<AdmissionPermit<'_>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !in_flight.insert((poll_id, session_id.clone())) {
            return None;
        }
        Some(AdmissionPermit {
            gate: self,
            key: (poll_id, session_id),
        })
    }

    fn release(&self, key: &AdmissionKey) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        in_flight.remove(key);
    }
}

/// 持有期间独占 (poll, participant) 键，Drop 时释放。
pub struct AdmissionPermit<'a> {
    gate: &'a AdmissionGate,
    key: AdmissionKey,
}

impl Drop for AdmissionPermit<'_> {
    fn drop(&mut self) {
        self.gate.release(&self.key);
    }
}
